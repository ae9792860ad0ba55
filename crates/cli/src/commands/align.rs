//! `cmsload align`: copy fields of paired entries between spaces.

use std::path::Path;

use cmsload_loader::jobs::align::{align, AlignConfig, PairStatus};

use crate::context::RunContext;

pub fn cmd_align(ctx: &RunContext, config_path: &Path, publish: bool) {
    let config = match AlignConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => ctx.fail(&format!("error reading '{}': {}", config_path.display(), e)),
    };
    ctx.confirm_write("align entries", &config.target.environment);

    let source = ctx.store_in(&config.source.space, &config.source.environment);
    let target = ctx.store_in(&config.target.space, &config.target.environment);
    let mut log = ctx.run_log();
    let rt = ctx.runtime();
    let report = rt.block_on(align(&source, &target, &config.pairs, publish, &mut log));

    ctx.emit(&report, |report| {
        for pair in &report.pairs {
            let status = match &pair.status {
                PairStatus::Aligned { published: true } => "aligned and published".to_string(),
                PairStatus::Aligned { published: false } => "aligned".to_string(),
                PairStatus::SourceMissing => format!("source entry {} not found", pair.source),
                PairStatus::TargetMissing => format!("target entry {} not found", pair.target),
                PairStatus::Failed { message } => format!("failed: {}", message),
            };
            println!("  {}: {}", pair.label, status);
        }
        println!("align: {} aligned, {} failed", report.aligned, report.failed);
    });
}
