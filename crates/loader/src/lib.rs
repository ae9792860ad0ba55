//! Idempotent bulk entry loading for headless CMS environments.
//!
//! A load reads the natural keys already present in the target environment
//! into an [`ExistingIndex`], then walks the source records in rate-limited
//! batches. Each record is handed to the [`EntrySynchronizer`], which
//! creates only what is missing, links new entries to their parent and
//! appends one line per record to the [`RunLog`]. Re-running a load against
//! an unchanged source performs no writes.
//!
//! What a record turns into is described by a [`LoadPlan`]; the plans for
//! the course and council feeds live in [`plans`]. The remaining
//! environment chores (align, prune, mirror, export, migrations) live in
//! [`jobs`].

pub mod batch;
pub mod guard;
pub mod index;
pub mod jobs;
pub mod loader;
pub mod plans;
pub mod ratelimit;
pub mod richtext;
pub mod runlog;
pub mod schema;
pub mod settings;
pub mod source;
pub mod sync;

pub use batch::{chunk_ranges, BatchConfig, BatchDriver};
pub use guard::{refuse_production, GuardError};
pub use index::{fetch_all, fetch_all_assets, ExistingIndex, IndexError, IndexOptions, ASSET_KEYS};
pub use loader::{LoadError, LoadOptions, Loader, RunSummary};
pub use ratelimit::{FixedDelay, NoDelay, RateLimiter, TokenBucket};
pub use richtext::markdown_to_rich_text;
pub use runlog::RunLog;
pub use schema::{ContentTypeSchema, SchemaError};
pub use settings::{RateLimit, Settings, SettingsError};
pub use source::{SourceError, StaticSource};
pub use sync::{
    Attachment, EntrySynchronizer, LinkGraph, LoadPlan, RecordOutcome, SecondarySpec, SyncError,
};

#[cfg(feature = "graphql")]
pub use source::GraphqlSource;
