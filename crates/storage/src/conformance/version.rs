use std::future::Future;

use serde_json::json;

use super::{course_fields, Check, LOCALE};
use crate::{entry_link, ContentStore, StoreError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut checks = Vec::new();

    checks.push(Check::new(
        "version",
        "update_bumps_version_and_persists_fields",
        update_bumps_version_and_persists_fields(factory).await,
    ));
    checks.push(Check::new(
        "version",
        "stale_update_returns_version_mismatch",
        stale_update_returns_version_mismatch(factory).await,
    ));
    checks.push(Check::new(
        "version",
        "stale_update_writes_nothing",
        stale_update_writes_nothing(factory).await,
    ));
    checks.push(Check::new(
        "version",
        "publish_marks_entry_published",
        publish_marks_entry_published(factory).await,
    ));
    checks.push(Check::new(
        "version",
        "publish_with_stale_version_rejected",
        publish_with_stale_version_rejected(factory).await,
    ));

    checks
}

async fn update_bumps_version_and_persists_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut entry = s
        .create_entry("pageCourse", course_fields("uc"))
        .await
        .map_err(|e| e.to_string())?;
    let before = entry.sys.version;
    entry.set_field("course", LOCALE, entry_link("d1"));

    let updated = s.update_entry(&entry).await.map_err(|e| e.to_string())?;
    if updated.sys.version <= before {
        return Err(format!(
            "version did not increase: {} -> {}",
            before, updated.sys.version
        ));
    }
    let read = s.get_entry(entry.id()).await.map_err(|e| e.to_string())?;
    if read.field("course", LOCALE).is_none() {
        return Err("updated field not persisted".to_string());
    }
    Ok(())
}

async fn stale_update_returns_version_mismatch<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let stale = s
        .create_entry("pageCourse", course_fields("uc"))
        .await
        .map_err(|e| e.to_string())?;
    s.update_entry(&stale).await.map_err(|e| e.to_string())?;

    match s.update_entry(&stale).await {
        Err(StoreError::VersionMismatch { id, expected }) => {
            if id != stale.id() {
                return Err(format!("expected id {}, got {}", stale.id(), id));
            }
            if expected != stale.sys.version {
                return Err(format!(
                    "expected version {}, got {}",
                    stale.sys.version, expected
                ));
            }
            Ok(())
        }
        other => Err(format!("expected VersionMismatch, got {:?}", other)),
    }
}

async fn stale_update_writes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut stale = s
        .create_entry("pageCourse", course_fields("uc"))
        .await
        .map_err(|e| e.to_string())?;
    s.update_entry(&stale).await.map_err(|e| e.to_string())?;

    stale.set_field("title", LOCALE, json!("overwritten"));
    let _ = s.update_entry(&stale).await;

    let read = s.get_entry(stale.id()).await.map_err(|e| e.to_string())?;
    if read.text("title", LOCALE) == Some("overwritten") {
        return Err("stale update leaked into the store".to_string());
    }
    Ok(())
}

async fn publish_marks_entry_published<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entry = s
        .create_entry("dataCourse", course_fields("uc"))
        .await
        .map_err(|e| e.to_string())?;
    let published = s.publish_entry(&entry).await.map_err(|e| e.to_string())?;
    if !published.is_published() {
        return Err("publish_entry returned an unpublished entry".to_string());
    }
    let read = s.get_entry(entry.id()).await.map_err(|e| e.to_string())?;
    if !read.is_published() {
        return Err("entry not published after publish_entry".to_string());
    }
    Ok(())
}

async fn publish_with_stale_version_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let stale = s
        .create_entry("dataCourse", course_fields("uc"))
        .await
        .map_err(|e| e.to_string())?;
    s.update_entry(&stale).await.map_err(|e| e.to_string())?;
    match s.publish_entry(&stale).await {
        Err(StoreError::VersionMismatch { .. }) => Ok(()),
        other => Err(format!("expected VersionMismatch, got {:?}", other)),
    }
}
