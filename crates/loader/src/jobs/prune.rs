//! Prune drafts: delete never-published entries of the given content types.

use std::collections::BTreeMap;

use cmsload_storage::{ContentStore, EntryQuery, StoreError};
use serde::Serialize;
use tracing::{info, warn};

use crate::guard::{refuse_production, GuardError};
use crate::ratelimit::RateLimiter;
use crate::runlog::RunLog;

#[derive(Debug, thiserror::Error)]
pub enum PruneError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("could not list draft {content_type} entries: {source}")]
    List {
        content_type: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Deleted entries per content type.
    pub deleted: BTreeMap<String, usize>,
    /// Entries that could not be deleted, per content type.
    pub failed: BTreeMap<String, usize>,
}

impl PruneReport {
    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }
}

/// Where and how to prune.
#[derive(Debug, Clone)]
pub struct PruneTarget<'a> {
    pub environment: &'a str,
    pub production_environment: &'a str,
    pub page_size: usize,
}

/// Delete every draft of each content type in `content_types`.
///
/// Refuses outright in the production environment, before any store call.
/// Each listing restarts at `skip = failures so far`: deleted drafts vanish
/// from the result set, so only the undeletable ones need skipping. The
/// limiter pauses after every delete attempt.
pub async fn prune_drafts<S>(
    store: &S,
    content_types: &[String],
    target: &PruneTarget<'_>,
    limiter: &dyn RateLimiter,
    log: &mut RunLog,
) -> Result<PruneReport, PruneError>
where
    S: ContentStore + ?Sized,
{
    refuse_production(
        "delete draft entries",
        target.environment,
        target.production_environment,
    )?;

    let mut report = PruneReport::default();
    for content_type in content_types {
        let mut deleted = 0;
        let mut failures = 0;
        loop {
            let query = EntryQuery::for_type(content_type)
                .drafts_only()
                .page(failures, target.page_size);
            let page = store
                .list_entries(&query)
                .await
                .map_err(|source| PruneError::List {
                    content_type: content_type.clone(),
                    source,
                })?;
            if page.items.is_empty() {
                break;
            }

            for entry in &page.items {
                let line = match store.delete_entry(entry.id()).await {
                    Ok(()) => {
                        deleted += 1;
                        format!("deleted draft {} {}", content_type, entry.id())
                    }
                    Err(e) => {
                        failures += 1;
                        warn!("could not delete {} {}: {}", content_type, entry.id(), e);
                        format!("failed {} {}: {}", content_type, entry.id(), e)
                    }
                };
                if let Err(e) = log.append(&line) {
                    warn!("could not write run log {}: {}", log.path().display(), e);
                }
                limiter.pause().await;
            }
        }
        info!("deleted {} draft {} entries", deleted, content_type);
        report.deleted.insert(content_type.clone(), deleted);
        if failures > 0 {
            report.failed.insert(content_type.clone(), failures);
        }
    }
    Ok(report)
}
