//! One module per subcommand. Each `cmd_*` function reports fatal errors
//! through [`RunContext::fail`](crate::context::RunContext::fail) and
//! prints its summary through `emit`.

pub mod align;
pub mod councils;
pub mod courses;
pub mod export;
pub mod migrations;
pub mod mirror;
pub mod prune;

use cmsload_loader::RunSummary;

pub(crate) fn print_summary(name: &str, summary: &RunSummary) {
    println!(
        "{}: {} processed, {} skipped, {} synced, {} failed, {} entries created",
        name,
        summary.processed,
        summary.skipped,
        summary.synced,
        summary.failed,
        summary.created_entries
    );
}
