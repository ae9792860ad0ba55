//! Export: dump every entry of some content types to a JSON file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use cmsload_storage::{ContentStore, Entry, EntryQuery, StoreError};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

use crate::index::fetch_all;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("could not list {content_type} entries: {source}")]
    Store {
        content_type: String,
        #[source]
        source: StoreError,
    },

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize export: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub space: String,
    pub environment: String,
    pub exported_at: String,
    /// Content type id -> entries.
    pub entries: BTreeMap<String, Vec<Entry>>,
}

impl ExportDocument {
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Read every entry of each of `content_types`.
pub async fn export_entries<S>(
    store: &S,
    space: &str,
    environment: &str,
    content_types: &[String],
    page_size: usize,
) -> Result<ExportDocument, ExportError>
where
    S: ContentStore + ?Sized,
{
    let mut entries = BTreeMap::new();
    for content_type in content_types {
        let found = fetch_all(store, &EntryQuery::for_type(content_type), page_size)
            .await
            .map_err(|source| ExportError::Store {
                content_type: content_type.clone(),
                source,
            })?;
        info!("exported {} {} entries", found.len(), content_type);
        entries.insert(content_type.clone(), found);
    }
    let exported_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());
    Ok(ExportDocument {
        space: space.to_string(),
        environment: environment.to_string(),
        exported_at,
        entries,
    })
}

/// Write `document` as pretty-printed JSON, creating parent directories.
pub fn write_export(document: &ExportDocument, path: &Path) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    Ok(())
}
