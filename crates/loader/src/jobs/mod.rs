//! Operational jobs built on the store: besides loading, the day-to-day
//! chores of keeping several CMS environments and their content model in
//! step.

pub mod align;
pub mod councils;
pub mod export;
pub mod migrations;
pub mod mirror;
pub mod prune;

pub use align::{align, AlignConfig, AlignConfigError, AlignPair, AlignReport, PairStatus};
pub use councils::{load_councils, CouncilDatasets, CouncilReport};
pub use export::{export_entries, write_export, ExportDocument, ExportError};
pub use migrations::{generate_migrations, render_migration, MigrationError, MigrationReport};
pub use mirror::{
    collect_assets, collect_tagged, mirror, MirrorCounts, MirrorOptions, MirrorReport,
};
pub use prune::{prune_drafts, PruneError, PruneReport, PruneTarget};
