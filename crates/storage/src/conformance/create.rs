use std::future::Future;

use super::{course_fields, Check, LOCALE};
use crate::{ContentStore, StoreError};

pub(super) async fn run_create_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut checks = Vec::new();

    checks.push(Check::new(
        "create",
        "create_returns_draft_with_fields",
        create_returns_draft_with_fields(factory).await,
    ));
    checks.push(Check::new(
        "create",
        "create_assigns_unique_ids",
        create_assigns_unique_ids(factory).await,
    ));
    checks.push(Check::new(
        "create",
        "created_entry_readable_via_get_entry",
        created_entry_readable_via_get_entry(factory).await,
    ));
    checks.push(Check::new(
        "create",
        "create_with_id_uses_given_id",
        create_with_id_uses_given_id(factory).await,
    ));
    checks.push(Check::new(
        "create",
        "create_with_taken_id_returns_already_exists",
        create_with_taken_id_returns_already_exists(factory).await,
    ));

    checks
}

/// A new entry is a draft of the requested type carrying the given fields.
async fn create_returns_draft_with_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entry = s
        .create_entry("pageCourse", course_fields("universal_credit"))
        .await
        .map_err(|e| e.to_string())?;

    if entry.content_type() != "pageCourse" {
        return Err(format!(
            "expected content type pageCourse, got {}",
            entry.content_type()
        ));
    }
    if !entry.is_draft() {
        return Err("new entry must be a draft".to_string());
    }
    match entry.text("slug", LOCALE) {
        Some("universal_credit") => Ok(()),
        other => Err(format!("expected slug universal_credit, got {:?}", other)),
    }
}

async fn create_assigns_unique_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s
        .create_entry("pageCourse", course_fields("a"))
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .create_entry("pageCourse", course_fields("b"))
        .await
        .map_err(|e| e.to_string())?;
    if a.id() == b.id() {
        return Err(format!("two creates returned the same id {}", a.id()));
    }
    Ok(())
}

async fn created_entry_readable_via_get_entry<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create_entry("dataCourse", course_fields("welfare"))
        .await
        .map_err(|e| e.to_string())?;
    let read = s.get_entry(created.id()).await.map_err(|e| e.to_string())?;
    if read.fields != created.fields {
        return Err(format!(
            "fields differ after read: {:?} vs {:?}",
            read.fields, created.fields
        ));
    }
    if read.sys.version != created.sys.version {
        return Err(format!(
            "version differs after read: {} vs {}",
            read.sys.version, created.sys.version
        ));
    }
    Ok(())
}

async fn create_with_id_uses_given_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entry = s
        .create_entry_with_id("heroBanner", "hero-home", course_fields("home"))
        .await
        .map_err(|e| e.to_string())?;
    if entry.id() != "hero-home" {
        return Err(format!("expected id hero-home, got {}", entry.id()));
    }
    s.get_entry("hero-home").await.map_err(|e| e.to_string())?;
    Ok(())
}

async fn create_with_taken_id_returns_already_exists<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create_entry_with_id("heroBanner", "hero-1", course_fields("x"))
        .await
        .map_err(|e| e.to_string())?;
    match s
        .create_entry_with_id("heroBanner", "hero-1", course_fields("y"))
        .await
    {
        Err(StoreError::AlreadyExists { id }) if id == "hero-1" => Ok(()),
        other => Err(format!("expected AlreadyExists(hero-1), got {:?}", other)),
    }
}
