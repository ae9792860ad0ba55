//! `cmsload prune-drafts`: delete never-published entries. Never in production,
//! and never without confirmation.

use cmsload_loader::jobs::prune::{prune_drafts, PruneTarget};
use cmsload_loader::refuse_production;

use crate::context::RunContext;

pub fn cmd_prune_drafts(ctx: &RunContext, content_types: &[String]) {
    let settings = &ctx.settings;
    // Refused before a store handle exists; --yes does not bypass this.
    if let Err(e) = refuse_production(
        "delete draft entries",
        &settings.environment,
        &settings.production_environment,
    ) {
        ctx.fail(&e.to_string());
    }
    ctx.confirm_delete(
        &format!("every draft {} entry", content_types.join(", ")),
        &settings.environment,
    );

    let target = PruneTarget {
        environment: &settings.environment,
        production_environment: &settings.production_environment,
        page_size: settings.page_size,
    };
    let store = ctx.store(&settings.environment);
    let limiter = settings.limiter();
    let mut log = ctx.run_log();
    let rt = ctx.runtime();
    let report = match rt.block_on(prune_drafts(
        &store,
        content_types,
        &target,
        limiter.as_ref(),
        &mut log,
    )) {
        Ok(report) => report,
        Err(e) => ctx.fail(&e.to_string()),
    };

    ctx.emit(&report, |report| {
        for (content_type, deleted) in &report.deleted {
            let failed = report.failed.get(content_type).copied().unwrap_or(0);
            println!("  {}: {} deleted, {} failed", content_type, deleted, failed);
        }
        println!("prune-drafts: {} drafts deleted", report.total_deleted());
    });
}
