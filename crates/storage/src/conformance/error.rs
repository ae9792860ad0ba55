use std::future::Future;

use super::{course_fields, Check};
use crate::{ContentStore, StoreError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut checks = Vec::new();

    checks.push(Check::new(
        "error",
        "get_entry_nonexistent",
        get_entry_nonexistent(factory).await,
    ));
    checks.push(Check::new(
        "error",
        "get_entry_not_found_has_correct_id",
        get_entry_not_found_has_correct_id(factory).await,
    ));
    checks.push(Check::new(
        "error",
        "update_entry_nonexistent",
        update_entry_nonexistent(factory).await,
    ));
    checks.push(Check::new(
        "error",
        "delete_entry_nonexistent",
        delete_entry_nonexistent(factory).await,
    ));

    checks
}

// ── 1. get_entry on empty store returns NotFound ──────────────────────────────

async fn get_entry_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_entry("missing-999").await {
        Err(e) if e.is_not_found() => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 2. NotFound carries the requested id ─────────────────────────────────────

async fn get_entry_not_found_has_correct_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_entry("QzIoZ6rZeuhI9y9QbTijt").await {
        Err(StoreError::NotFound { id }) => {
            if id != "QzIoZ6rZeuhI9y9QbTijt" {
                return Err(format!(
                    "expected id \"QzIoZ6rZeuhI9y9QbTijt\", got \"{}\"",
                    id
                ));
            }
            Ok(())
        }
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 3. update of an entry deleted in the meantime returns NotFound ───────────

async fn update_entry_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entry = s
        .create_entry("pageCourse", course_fields("short-lived"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_entry(entry.id()).await.map_err(|e| e.to_string())?;
    match s.update_entry(&entry).await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 4. delete of unknown id returns NotFound ─────────────────────────────────

async fn delete_entry_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.delete_entry("missing-1").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}
