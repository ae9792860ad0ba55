//! Conformance test suite for `ContentStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `ContentStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Create**: store-assigned ids, explicit ids, initial draft state
//! - **Query**: exhaustive pagination, totals, field / draft filters
//! - **Version**: optimistic versioning on update and publish
//! - **Delete**: drafts removed, published entries protected
//! - **Error handling**: correct error variants for missing entries
//! - **Assets**: ids, versioning and the publish guard for unprocessed files
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use cmsload_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sandbox_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_sandbox_environment().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod asset;
mod create;
mod delete;
mod error;
mod query;
mod version;

use std::fmt;
use std::future::Future;

use serde_json::json;

use crate::record::{fields_in, Fields};
use crate::ContentStore;

/// Locale used by every conformance fixture.
const LOCALE: &str = "en-GB";

/// Outcome of one conformance check.
#[derive(Debug, Clone)]
pub struct Check {
    pub category: &'static str,
    pub name: &'static str,
    /// Why the check failed; `None` when it passed.
    pub failure: Option<String>,
}

impl Check {
    fn new(category: &'static str, name: &'static str, result: Result<(), String>) -> Self {
        Self {
            category,
            name,
            failure: result.err(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Every check of one suite run. Prints the failures.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub checks: Vec<Check>,
    pub failed: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.checks.len();
        writeln!(
            f,
            "{} of {} conformance checks passed",
            total - self.failed,
            total
        )?;
        for check in &self.checks {
            if let Some(failure) = &check.failure {
                writeln!(f, "  {}/{}: {}", check.category, check.name, failure)?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ContentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut checks = Vec::new();
    checks.extend(create::run_create_tests(&factory).await);
    checks.extend(query::run_query_tests(&factory).await);
    checks.extend(version::run_version_tests(&factory).await);
    checks.extend(delete::run_delete_tests(&factory).await);
    checks.extend(error::run_error_tests(&factory).await);
    checks.extend(asset::run_asset_tests(&factory).await);

    let failed = checks.iter().filter(|c| !c.passed()).count();
    ConformanceReport { checks, failed }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn course_fields(slug: &str) -> Fields {
    fields_in(
        LOCALE,
        &[("title", json!(format!("Course {slug}"))), ("slug", json!(slug))],
    )
}

/// Create `n` entries of `content_type` with slugs `<prefix>-0 .. <prefix>-(n-1)`.
async fn create_many<S: ContentStore>(
    store: &S,
    content_type: &str,
    prefix: &str,
    n: usize,
) -> Result<(), String> {
    for i in 0..n {
        store
            .create_entry(content_type, course_fields(&format!("{prefix}-{i}")))
            .await
            .map_err(|e| format!("create #{i} failed: {e}"))?;
    }
    Ok(())
}
