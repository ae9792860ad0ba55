//! `cmsload export`: dump entries of some content types to a JSON file.

use std::path::Path;

use cmsload_loader::jobs::export::{export_entries, write_export};
use serde_json::json;

use crate::context::RunContext;

pub fn cmd_export(ctx: &RunContext, content_types: &[String], out: &Path) {
    let settings = &ctx.settings;
    let store = ctx.store(&settings.environment);
    let rt = ctx.runtime();
    let document = match rt.block_on(export_entries(
        &store,
        &settings.space_id,
        &settings.environment,
        content_types,
        settings.page_size,
    )) {
        Ok(document) => document,
        Err(e) => ctx.fail(&format!("export error: {}", e)),
    };
    if let Err(e) = write_export(&document, out) {
        ctx.fail(&e.to_string());
    }

    let counts: std::collections::BTreeMap<&str, usize> = document
        .entries
        .iter()
        .map(|(content_type, entries)| (content_type.as_str(), entries.len()))
        .collect();
    let report = json!({ "out": out, "entries": counts });
    ctx.emit(&report, |_| {
        for (content_type, n) in &counts {
            println!("  {}: {}", content_type, n);
        }
        println!(
            "export: {} entries written to {}",
            document.entry_count(),
            out.display()
        );
    });
}
