//! Run settings from the process environment.
//!
//! `.env` loading happens in the binary; this module only reads variables,
//! through a lookup function so tests never touch the real environment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::BatchConfig;
use crate::index::IndexOptions;
use crate::ratelimit::{FixedDelay, RateLimiter, TokenBucket};

pub const DEFAULT_API_URL: &str = "https://api.contentful.com";
pub const DEFAULT_ENVIRONMENT: &str = "master";
pub const DEFAULT_LOCALE: &str = "en-GB";

/// Missing or malformed configuration. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} must be a whole number, got '{value}'")]
    NotANumber { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{name} must be one of {expected}, got '{value}'")]
    NotAChoice {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// How work units are spaced out, from `LOADER_RATE_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    /// Sleep the batch delay every time (`fixed`, the default).
    Fixed,
    /// Let `burst` units through back to back, then one per batch delay
    /// (`token-bucket`).
    TokenBucket { burst: u32 },
}

/// Credentials and knobs for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub management_token: String,
    pub space_id: String,
    pub environment: String,
    /// Environment id that destructive jobs refuse and writes confirm.
    pub production_environment: String,
    pub api_url: String,
    pub locale: String,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub rate_limit: RateLimit,
    pub concurrency: usize,
    pub page_size: usize,
    pub log_dir: PathBuf,
}

// The token stays out of debug output.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("space_id", &self.space_id)
            .field("environment", &self.environment)
            .field("production_environment", &self.production_environment)
            .field("api_url", &self.api_url)
            .field("locale", &self.locale)
            .field("batch_size", &self.batch_size)
            .field("batch_delay", &self.batch_delay)
            .field("rate_limit", &self.rate_limit)
            .field("concurrency", &self.concurrency)
            .field("page_size", &self.page_size)
            .field("log_dir", &self.log_dir)
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(SettingsError::Missing(name));
        let number = |name: &'static str, default: u64| -> Result<u64, SettingsError> {
            match get(name) {
                None => Ok(default),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| SettingsError::NotANumber { name, value }),
            }
        };
        let positive = |name: &'static str, default: u64| -> Result<usize, SettingsError> {
            match number(name, default)? {
                0 => Err(SettingsError::Zero(name)),
                n => Ok(n as usize),
            }
        };

        let rate_limit = match get("LOADER_RATE_LIMIT").as_deref().map(str::trim) {
            None | Some("fixed") => RateLimit::Fixed,
            Some("token-bucket") => RateLimit::TokenBucket {
                burst: positive("LOADER_RATE_BURST", 5)? as u32,
            },
            Some(other) => {
                return Err(SettingsError::NotAChoice {
                    name: "LOADER_RATE_LIMIT",
                    value: other.to_string(),
                    expected: "fixed, token-bucket",
                })
            }
        };

        Ok(Self {
            management_token: required("CONTENTFUL_MANAGEMENT_TOKEN")?,
            space_id: required("CONTENTFUL_SPACE_ID")?,
            environment: get("CONTENTFUL_ENVIRONMENT")
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            production_environment: get("CONTENTFUL_PRODUCTION_ENVIRONMENT")
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            api_url: get("CONTENTFUL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            locale: get("CONTENTFUL_LOCALE").unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            batch_size: positive("LOADER_BATCH_SIZE", 10)?,
            batch_delay: Duration::from_millis(number("LOADER_BATCH_DELAY_MS", 2000)?),
            rate_limit,
            concurrency: positive("LOADER_CONCURRENCY", 1)?,
            page_size: positive("LOADER_PAGE_SIZE", 100)?,
            log_dir: get("LOADER_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs")),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == self.production_environment
    }

    pub fn batch(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
        }
    }

    /// Limiter spacing batches (and deletes) by the configured delay.
    pub fn limiter(&self) -> Arc<dyn RateLimiter> {
        match self.rate_limit {
            RateLimit::Fixed => Arc::new(FixedDelay(self.batch_delay)),
            RateLimit::TokenBucket { burst } => {
                Arc::new(TokenBucket::new(burst, self.batch_delay))
            }
        }
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            page_size: self.page_size,
            locale: self.locale.clone(),
        }
    }
}
