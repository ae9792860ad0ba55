//! `cmsload courses`: course pages from the course-template feed.

use cmsload_loader::plans::course::{CoursePlan, CourseRecord, COURSE_FIELDS};
use cmsload_loader::{GraphqlSource, Loader};
use serde_json::json;
use tracing::info;

use crate::commands::print_summary;
use crate::context::RunContext;

pub fn cmd_courses(ctx: &RunContext, feed: &str, collection: &str, publish: bool) {
    let environment = ctx.settings.environment.clone();
    ctx.confirm_write("load course entries", &environment);

    let rt = ctx.runtime();
    let source = GraphqlSource::new(feed, collection, COURSE_FIELDS);
    let records: Vec<CourseRecord> = match rt.block_on(source.fetch()) {
        Ok(records) => records,
        Err(e) => ctx.fail(&format!("error reading course feed: {}", e)),
    };
    info!("{} course templates in {}", records.len(), collection);

    let store = ctx.store(&environment);
    let mut log = ctx.run_log();
    let loader = Loader::new(&store, &CoursePlan, ctx.load_options(publish))
        .with_limiter(ctx.settings.limiter());
    let summary = match rt.block_on(loader.run_into(&records, &mut log)) {
        Ok(summary) => summary,
        Err(e) => ctx.fail(&format!("load error: {}", e)),
    };

    let report = json!({
        "environment": environment,
        "log": log.path(),
        "summary": summary,
    });
    ctx.emit(&report, |_| {
        print_summary("courses", &summary);
        if log.lines_written() > 0 {
            println!("run log: {}", log.path().display());
        }
    });
}
