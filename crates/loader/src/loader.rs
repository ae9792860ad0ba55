//! The configurable loader: index once, then batch, sync and log each record.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cmsload_storage::ContentStore;
use serde::Serialize;
use tracing::{info, warn};

use crate::batch::{BatchConfig, BatchDriver};
use crate::index::{ExistingIndex, IndexError, IndexOptions};
use crate::ratelimit::{FixedDelay, RateLimiter};
use crate::runlog::RunLog;
use crate::schema::ContentTypeSchema;
use crate::sync::{EntrySynchronizer, LoadPlan, RecordOutcome};

/// Fatal errors that stop a load before any record is processed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub batch: BatchConfig,
    /// Pause between batches.
    pub delay: Duration,
    pub index: IndexOptions,
    pub publish: bool,
    pub log_dir: PathBuf,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            delay: Duration::from_millis(2000),
            index: IndexOptions::default(),
            publish: false,
            log_dir: PathBuf::from("./logs"),
        }
    }
}

/// Counts for one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub synced: usize,
    pub failed: usize,
    pub created_entries: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[RecordOutcome]) -> Self {
        let mut summary = Self {
            processed: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome {
                RecordOutcome::Skipped { .. } => summary.skipped += 1,
                RecordOutcome::Synced { created, .. } => {
                    summary.synced += 1;
                    summary.created_entries += created.len();
                }
                RecordOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    /// Sum of two summaries, for jobs that run several plans.
    pub fn merge(&mut self, other: &RunSummary) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.synced += other.synced;
        self.failed += other.failed;
        self.created_entries += other.created_entries;
    }
}

/// Runs one [`LoadPlan`] over a record list.
pub struct Loader<'a, S: ?Sized, P> {
    store: &'a S,
    plan: &'a P,
    options: LoadOptions,
    limiter: Arc<dyn RateLimiter>,
}

impl<'a, S, P> Loader<'a, S, P>
where
    S: ContentStore + ?Sized,
    P: LoadPlan,
{
    pub fn new(store: &'a S, plan: &'a P, options: LoadOptions) -> Self {
        let limiter = Arc::new(FixedDelay(options.delay));
        Self {
            store,
            plan,
            options,
            limiter,
        }
    }

    /// Replace the default fixed inter-batch delay.
    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    fn schemas(&self) -> Vec<&'static ContentTypeSchema> {
        let mut schemas = vec![self.plan.primary()];
        schemas.extend(self.plan.secondaries().iter().map(|s| s.schema));
        schemas
    }

    /// Load `records`, logging to a fresh run log under the configured dir.
    pub async fn run(&self, records: &[P::Record]) -> Result<RunSummary, LoadError> {
        let mut log = RunLog::new(&self.options.log_dir);
        self.run_into(records, &mut log).await
    }

    /// Load `records`, appending outcomes to `log`.
    pub async fn run_into(
        &self,
        records: &[P::Record],
        log: &mut RunLog,
    ) -> Result<RunSummary, LoadError> {
        let schemas = self.schemas();
        let mut index = ExistingIndex::build(self.store, &schemas, &self.options.index).await?;
        if self.plan.has_attachments() {
            index.index_assets(self.store, &self.options.index).await?;
        }
        for anomaly in index.anomalies() {
            warn!("ignoring malformed entry: {}", anomaly);
        }

        let sync = EntrySynchronizer::new(self.store, self.plan, &index, &self.options.index.locale)
            .publishing(self.options.publish);
        let sync = &sync;
        let driver = BatchDriver::new(self.options.batch, self.limiter.clone());

        info!(
            "loading {} {} records in batches of {}",
            records.len(),
            self.plan.primary().id,
            self.options.batch.batch_size
        );
        let outcomes = driver
            .run(records, move |_, record| sync.sync(record), log)
            .await;

        let summary = RunSummary::from_outcomes(&outcomes);
        info!(
            "{}: {} processed, {} skipped, {} synced, {} failed, {} entries created",
            self.plan.primary().id,
            summary.processed,
            summary.skipped,
            summary.synced,
            summary.failed,
            summary.created_entries
        );
        Ok(summary)
    }
}
