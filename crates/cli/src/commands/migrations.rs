//! `cmsload generate-migrations`: one migration script per content type.

use std::path::Path;

use cmsload_loader::jobs::migrations::generate_migrations;

use crate::context::RunContext;

pub fn cmd_generate_migrations(ctx: &RunContext, out_dir: &Path) {
    let settings = &ctx.settings;
    let store = ctx.store(&settings.environment);
    let limiter = settings.limiter();
    let mut log = ctx.run_log();
    let rt = ctx.runtime();
    let report = match rt.block_on(generate_migrations(
        &store,
        out_dir,
        limiter.as_ref(),
        &mut log,
    )) {
        Ok(report) => report,
        Err(e) => ctx.fail(&format!("migration error: {}", e)),
    };

    ctx.emit(&report, |report| {
        for path in &report.written {
            println!("  {}", path.display());
        }
        println!(
            "generate-migrations: {} scripts written to {}",
            report.written.len(),
            out_dir.display()
        );
    });
}
