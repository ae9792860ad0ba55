//! Per-invocation settings, store construction and output helpers shared by
//! every subcommand.

use std::io::BufRead;
use std::process;
use std::time::Duration;

use cmsload_contentful::ContentfulStore;
use cmsload_loader::{LoadOptions, RunLog, Settings, SettingsError};
use serde::Serialize;

use crate::{report_error, OutputFormat};

/// Command-line values that win over the environment.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub environment: Option<String>,
    pub batch_size: Option<usize>,
    pub delay_ms: Option<u64>,
}

impl Overrides {
    fn apply(self, mut settings: Settings) -> Result<Settings, SettingsError> {
        if let Some(environment) = self.environment {
            settings.environment = environment;
        }
        if let Some(size) = self.batch_size {
            if size == 0 {
                return Err(SettingsError::Zero("--batch-size"));
            }
            settings.batch_size = size;
        }
        if let Some(ms) = self.delay_ms {
            settings.batch_delay = Duration::from_millis(ms);
        }
        Ok(settings)
    }
}

pub(crate) struct RunContext {
    pub settings: Settings,
    pub output: OutputFormat,
    pub quiet: bool,
    yes: bool,
}

impl RunContext {
    pub fn load(
        overrides: Overrides,
        output: OutputFormat,
        quiet: bool,
        yes: bool,
    ) -> Result<Self, SettingsError> {
        let settings = overrides.apply(Settings::from_env()?)?;
        tracing::debug!("{:?}", settings);
        Ok(Self {
            settings,
            output,
            quiet,
            yes,
        })
    }

    /// Report `msg` and exit 1.
    pub fn fail(&self, msg: &str) -> ! {
        report_error(msg, self.output, self.quiet);
        process::exit(1);
    }

    pub fn runtime(&self) -> tokio::runtime::Runtime {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => self.fail(&format!("failed to create tokio runtime: {}", e)),
        }
    }

    /// Store for `environment` of the configured space.
    pub fn store(&self, environment: &str) -> ContentfulStore {
        self.store_in(&self.settings.space_id, environment)
    }

    pub fn store_in(&self, space_id: &str, environment: &str) -> ContentfulStore {
        ContentfulStore::new(
            &self.settings.api_url,
            space_id,
            environment,
            &self.settings.management_token,
        )
    }

    pub fn run_log(&self) -> RunLog {
        RunLog::new(&self.settings.log_dir)
    }

    pub fn load_options(&self, publish: bool) -> LoadOptions {
        LoadOptions {
            batch: self.settings.batch(),
            delay: self.settings.batch_delay,
            index: self.settings.index_options(),
            publish,
            log_dir: self.settings.log_dir.clone(),
        }
    }

    /// Ask before writing to the production environment unless `--yes`.
    /// Anything but `yes` on stdin exits 1.
    pub fn confirm_write(&self, action: &str, environment: &str) {
        if environment != self.settings.production_environment {
            return;
        }
        self.confirm(
            &format!(
                "About to {} in the production environment '{}'.",
                action, environment
            ),
            "aborted: production run not confirmed",
        );
    }

    /// Ask before deleting anything, in any environment, unless `--yes`.
    pub fn confirm_delete(&self, what: &str, environment: &str) {
        self.confirm(
            &format!("About to delete {} in the environment '{}'.", what, environment),
            "aborted: deletion not confirmed",
        );
    }

    fn confirm(&self, notice: &str, abort: &str) {
        if self.yes {
            return;
        }
        eprintln!("{}", notice);
        eprintln!("Type 'yes' to continue:");
        let mut input = String::new();
        let read = std::io::stdin().lock().read_line(&mut input);
        if read.is_err() || !confirmed(&input) {
            self.fail(abort);
        }
    }

    /// Print `value` as JSON, or call `text` for the human summary.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) {
        match self.output {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(value)
                    .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
                println!("{}", json);
            }
            OutputFormat::Text => {
                if !self.quiet {
                    text(value);
                }
            }
        }
    }
}

fn confirmed(input: &str) -> bool {
    input.trim() == "yes"
}
