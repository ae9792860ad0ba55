//! `cmsload mirror`: copy tagged entries and their assets from another
//! environment.

use cmsload_loader::jobs::mirror::{mirror, MirrorOptions};

use crate::context::RunContext;

pub fn cmd_mirror(
    ctx: &RunContext,
    from: &str,
    tag: &str,
    asset_tag: Option<String>,
    max_depth: usize,
) {
    let to = ctx.settings.environment.clone();
    if from == to {
        ctx.fail(&format!("source and target are both '{}'", to));
    }
    ctx.confirm_write(&format!("mirror '{}' content from '{}'", tag, from), &to);

    let options = MirrorOptions {
        tag: tag.to_string(),
        asset_tag,
        max_depth,
        page_size: ctx.settings.page_size,
    };
    let source = ctx.store(from);
    let target = ctx.store(&to);
    let mut log = ctx.run_log();
    let rt = ctx.runtime();
    let report = match rt.block_on(mirror(&source, &target, &options, &mut log)) {
        Ok(report) => report,
        Err(e) => ctx.fail(&format!("error collecting '{}' entries from '{}': {}", tag, from, e)),
    };

    ctx.emit(&report, |report| {
        for (kind, counts) in [("assets", &report.assets), ("entries", &report.entries)] {
            println!(
                "mirror {} {} -> {}: {} collected, {} created, {} updated, {} unchanged, {} failed",
                kind,
                from,
                to,
                counts.collected,
                counts.created,
                counts.updated,
                counts.unchanged,
                counts.failed
            );
        }
        if log.lines_written() > 0 {
            println!("run log: {}", log.path().display());
        }
    });
}
