//! `cmsload councils`: local authorities, then each service's contact points.

use std::path::Path;

use cmsload_loader::jobs::councils::{load_councils, CouncilDatasets};
use cmsload_loader::plans::council::Service;

use crate::commands::print_summary;
use crate::context::RunContext;

/// `--only` values, or every service when empty.
pub(crate) fn parse_services(only: &[String]) -> Result<Vec<Service>, String> {
    if only.is_empty() {
        return Ok(Service::ALL.to_vec());
    }
    let mut services = only
        .iter()
        .map(|s| s.parse::<Service>())
        .collect::<Result<Vec<_>, _>>()?;
    services.sort();
    services.dedup();
    Ok(services)
}

pub fn cmd_councils(
    ctx: &RunContext,
    data_dir: &Path,
    only: &[String],
    downloads_url: Option<String>,
    publish: bool,
) {
    let services = match parse_services(only) {
        Ok(services) => services,
        Err(e) => ctx.fail(&e),
    };
    let data = match CouncilDatasets::read(data_dir, &services) {
        Ok(data) => data.with_downloads_url(downloads_url),
        Err(e) => ctx.fail(&format!("error reading council datasets: {}", e)),
    };

    let environment = ctx.settings.environment.clone();
    ctx.confirm_write("load council entries", &environment);

    let rt = ctx.runtime();
    let store = ctx.store(&environment);
    let mut log = ctx.run_log();
    let options = ctx.load_options(publish);
    let limiter = ctx.settings.limiter();
    let report = match rt.block_on(load_councils(&store, &data, &options, limiter, &mut log)) {
        Ok(report) => report,
        Err(e) => ctx.fail(&format!("load error: {}", e)),
    };

    ctx.emit(&report, |report| {
        print_summary("local authorities", &report.authorities);
        for (service, summary) in &report.services {
            print_summary(service, summary);
        }
        if log.lines_written() > 0 {
            println!("run log: {}", log.path().display());
        }
    });
}
