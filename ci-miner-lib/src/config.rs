use crate::Result;
use crate::ci::{EventCategory, FetchPolicy};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../default_config.toml");

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "ci-miner.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Trailing window, in days, of commits to analyze
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Upper bound on pages of CI runs fetched per event category
    #[serde(default = "default_page_cap")]
    pub page_cap: u32,

    /// Event categories scanned for runs
    #[serde(default = "default_event_categories")]
    pub event_categories: Vec<EventCategory>,

    /// Optional branch filter applied to run listing
    #[serde(default)]
    pub branch: Option<String>,

    /// Traverse every ref instead of only the default branch
    #[serde(default)]
    pub include_all_branches: bool,

    /// Base URL of the CI provider's REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bounded wait used by progress readers before checking for completion
    #[serde(default = "default_progress_wait_ms")]
    pub progress_wait_ms: u64,

    #[serde(default)]
    pub fetch: FetchConfig,

    /// Storage bucket used to publish reports
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub preemptive_quota_threshold: u64,

    #[serde(default = "default_max_rate_limit_wait_secs")]
    pub max_rate_limit_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub base_url: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,
}

const fn default_window_days() -> u32 {
    365
}

const fn default_page_cap() -> u32 {
    100
}

fn default_event_categories() -> Vec<EventCategory> {
    vec![EventCategory::Push, EventCategory::PullRequest]
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

const fn default_progress_wait_ms() -> u64 {
    500
}

const fn default_max_retries() -> u32 {
    4
}

const fn default_base_backoff_ms() -> u64 {
    2000
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_rate_limit_wait_secs() -> u64 {
    3600
}

fn default_bucket() -> String {
    "commit-data".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            preemptive_quota_threshold: 0,
            max_rate_limit_wait_secs: default_max_rate_limit_wait_secs(),
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub const fn policy(&self) -> FetchPolicy {
        FetchPolicy {
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            preemptive_quota_threshold: self.preemptive_quota_threshold,
            max_rate_limit_wait: Duration::from_secs(self.max_rate_limit_wait_secs),
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading ci-miner configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("no configuration file at '{path}', using defaults");
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading ci-miner configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.window_days == 0 {
            return Err(app_err!("window_days must be at least 1"));
        }

        if self.page_cap == 0 {
            return Err(app_err!("page_cap must be at least 1"));
        }

        if self.fetch.max_retries == 0 {
            return Err(app_err!("fetch.max_retries must be at least 1"));
        }

        if self.event_categories.is_empty() {
            return Err(app_err!("event_categories must name at least one event category"));
        }

        if let Some(storage) = &self.storage
            && storage.base_url.trim().is_empty()
        {
            return Err(app_err!("storage.base_url must not be empty"));
        }

        Ok(())
    }

    #[must_use]
    pub const fn progress_wait(&self) -> Duration {
        Duration::from_millis(self.progress_wait_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}
