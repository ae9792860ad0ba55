use std::future::Future;

use super::{course_fields, Check};
use crate::{ContentStore, StoreError};

pub(super) async fn run_delete_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut checks = Vec::new();

    checks.push(Check::new(
        "delete",
        "delete_removes_draft",
        delete_removes_draft(factory).await,
    ));
    checks.push(Check::new(
        "delete",
        "delete_leaves_other_entries",
        delete_leaves_other_entries(factory).await,
    ));
    checks.push(Check::new(
        "delete",
        "delete_published_rejected",
        delete_published_rejected(factory).await,
    ));

    checks
}

async fn delete_removes_draft<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entry = s
        .create_entry("pageCourse", course_fields("gone"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_entry(entry.id()).await.map_err(|e| e.to_string())?;
    match s.get_entry(entry.id()).await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound after delete, got {:?}", other)),
    }
}

async fn delete_leaves_other_entries<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doomed = s
        .create_entry("pageCourse", course_fields("a"))
        .await
        .map_err(|e| e.to_string())?;
    let kept = s
        .create_entry("pageCourse", course_fields("b"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_entry(doomed.id()).await.map_err(|e| e.to_string())?;
    s.get_entry(kept.id())
        .await
        .map(|_| ())
        .map_err(|e| format!("sibling entry lost: {e}"))
}

/// Published entries must be unpublished before deletion; the store refuses.
async fn delete_published_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entry = s
        .create_entry("pageCourse", course_fields("live"))
        .await
        .map_err(|e| e.to_string())?;
    s.publish_entry(&entry).await.map_err(|e| e.to_string())?;
    match s.delete_entry(entry.id()).await {
        Err(StoreError::Validation(_)) => {}
        other => return Err(format!("expected Validation, got {:?}", other)),
    }
    s.get_entry(entry.id())
        .await
        .map(|_| ())
        .map_err(|e| format!("published entry lost: {e}"))
}
