//! Migrations: one content-model migration script per content type.
//!
//! Each script recreates its content type with the migration DSL, so an
//! empty environment can be brought to the same model by running them.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use cmsload_storage::{ContentStore, ContentTypeDef, FieldDef, StoreError};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::ratelimit::RateLimiter;
use crate::runlog::RunLog;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("could not list content types: {0}")]
    Store(#[from] StoreError),

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub written: Vec<PathBuf>,
}

/// JavaScript string literal for `s`.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Identifier usable as a JavaScript variable name.
fn js_ident(id: &str) -> String {
    let mut ident: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

/// `<id>.js`, with anything unsafe in a file name replaced.
pub fn migration_file_name(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("{stem}.js")
}

fn render_field(out: &mut String, var: &str, field: &FieldDef) {
    // Writing to a String cannot fail.
    let _ = write!(
        out,
        "\n  {var}\n    .createField({})\n    .name({})\n    .type({})",
        js_string(&field.id),
        js_string(&field.name),
        js_string(&field.field_type),
    );
    if let Some(link_type) = &field.link_type {
        let _ = write!(out, "\n    .linkType({})", js_string(link_type));
    }
    if let Some(items) = &field.items {
        let _ = write!(out, "\n    .items({})", items);
    }
    let validations = Value::Array(field.validations.clone());
    let _ = write!(
        out,
        "\n    .localized({})\n    .required({})\n    .validations({})\n    .disabled({})\n    .omitted({});\n",
        field.localized, field.required, validations, field.disabled, field.omitted,
    );
}

/// Migration script that creates `def` and every one of its fields.
pub fn render_migration(def: &ContentTypeDef) -> String {
    let var = js_ident(&def.id);
    let mut out = String::from("module.exports = function (migration) {\n");
    let _ = write!(
        out,
        "  const {var} = migration\n    .createContentType({})\n    .name({})",
        js_string(&def.id),
        js_string(&def.name),
    );
    if let Some(description) = &def.description {
        let _ = write!(out, "\n    .description({})", js_string(description));
    }
    if let Some(display_field) = &def.display_field {
        let _ = write!(out, "\n    .displayField({})", js_string(display_field));
    }
    out.push_str(";\n");
    for field in &def.fields {
        render_field(&mut out, &var, field);
    }
    out.push_str("};\n");
    out
}

/// Write one migration script per content type of `store` into `out_dir`.
///
/// `limiter` paces the content types; there is no pause after the last.
pub async fn generate_migrations<S>(
    store: &S,
    out_dir: &Path,
    limiter: &dyn RateLimiter,
    log: &mut RunLog,
) -> Result<MigrationReport, MigrationError>
where
    S: ContentStore + ?Sized,
{
    let defs = store.list_content_types().await?;
    fs::create_dir_all(out_dir).map_err(|source| MigrationError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut report = MigrationReport::default();
    for (n, def) in defs.iter().enumerate() {
        if n > 0 {
            limiter.pause().await;
        }
        let path = out_dir.join(migration_file_name(&def.id));
        fs::write(&path, render_migration(def)).map_err(|source| MigrationError::Io {
            path: path.clone(),
            source,
        })?;
        info!("wrote migration for {} to {}", def.id, path.display());
        if let Err(e) = log.append(&format!("wrote {} migration {}", def.id, path.display())) {
            warn!("could not write run log {}: {}", log.path().display(), e);
        }
        report.written.push(path);
    }
    Ok(report)
}
