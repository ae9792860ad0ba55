//! Align: copy the fields of source entries onto paired target entries.
//!
//! Used to keep tables such as cookie listings identical across regional
//! spaces. Pairs come from a TOML mapping file:
//!
//! ```toml
//! [source]
//! space = "england"
//! environment = "master"
//!
//! [target]
//! space = "scotland"
//!
//! [[pair]]
//! source = "QzIoZ6rZeuhI9y9QbTijt"
//! target = "50xK0jghf7OjwK8B0miVVt"
//! label = "necessary cookies"
//! ```

use std::path::{Path, PathBuf};

use cmsload_storage::{ContentStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::runlog::RunLog;
use crate::settings::DEFAULT_ENVIRONMENT;

#[derive(Debug, thiserror::Error)]
pub enum AlignConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid align config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("align config lists no [[pair]] entries")]
    NoPairs,
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

/// A space and environment on one side of the alignment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpaceRef {
    pub space: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AlignPair {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl AlignPair {
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlignConfig {
    pub source: SpaceRef,
    pub target: SpaceRef,
    #[serde(rename = "pair", default)]
    pub pairs: Vec<AlignPair>,
}

impl AlignConfig {
    pub fn parse(text: &str) -> Result<Self, AlignConfigError> {
        let config: AlignConfig = toml::from_str(text)?;
        if config.pairs.is_empty() {
            return Err(AlignConfigError::NoPairs);
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AlignConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| AlignConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairStatus {
    Aligned { published: bool },
    SourceMissing,
    TargetMissing,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairReport {
    pub label: String,
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub status: PairStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlignReport {
    pub aligned: usize,
    pub failed: usize,
    pub pairs: Vec<PairReport>,
}

async fn align_pair<S, T>(
    source: &S,
    target: &T,
    pair: &AlignPair,
    publish: bool,
) -> PairStatus
where
    S: ContentStore + ?Sized,
    T: ContentStore + ?Sized,
{
    let from = match source.get_entry(&pair.source).await {
        Ok(entry) => entry,
        Err(e) if e.is_not_found() => return PairStatus::SourceMissing,
        Err(e) => return failed(e),
    };
    let mut to = match target.get_entry(&pair.target).await {
        Ok(entry) => entry,
        Err(e) if e.is_not_found() => return PairStatus::TargetMissing,
        Err(e) => return failed(e),
    };

    to.fields = from.fields;
    let updated = match target.update_entry(&to).await {
        Ok(entry) => entry,
        Err(e) => return failed(e),
    };
    if publish {
        if let Err(e) = target.publish_entry(&updated).await {
            return failed(e);
        }
    }
    PairStatus::Aligned { published: publish }
}

fn failed(e: StoreError) -> PairStatus {
    PairStatus::Failed {
        message: e.to_string(),
    }
}

/// Overwrite each target entry's fields with its source entry's fields.
///
/// Pairs are independent: one failing never stops the rest.
pub async fn align<S, T>(
    source: &S,
    target: &T,
    pairs: &[AlignPair],
    publish: bool,
    log: &mut RunLog,
) -> AlignReport
where
    S: ContentStore + ?Sized,
    T: ContentStore + ?Sized,
{
    let mut report = AlignReport::default();
    for pair in pairs {
        let status = align_pair(source, target, pair, publish).await;
        let line = match &status {
            PairStatus::Aligned { .. } => {
                report.aligned += 1;
                info!("aligned {} ({} -> {})", pair.name(), pair.source, pair.target);
                format!("aligned {} ({} -> {})", pair.name(), pair.source, pair.target)
            }
            PairStatus::SourceMissing => {
                report.failed += 1;
                format!("failed {}: source entry {} not found", pair.name(), pair.source)
            }
            PairStatus::TargetMissing => {
                report.failed += 1;
                format!("failed {}: target entry {} not found", pair.name(), pair.target)
            }
            PairStatus::Failed { message } => {
                report.failed += 1;
                format!("failed {}: {}", pair.name(), message)
            }
        };
        if !matches!(status, PairStatus::Aligned { .. }) {
            warn!("{}", line);
        }
        if let Err(e) = log.append(&line) {
            warn!("could not write run log {}: {}", log.path().display(), e);
        }
        report.pairs.push(PairReport {
            label: pair.name().to_string(),
            source: pair.source.clone(),
            target: pair.target.clone(),
            status,
        });
    }
    report
}
