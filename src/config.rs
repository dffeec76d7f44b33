use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CiStreamError, Result};

/// Configuration file structure for cistream.
///
/// Allows users to save connection and crawl tuning settings and reuse them
/// across runs. Loaded from an explicit path, or from
/// `~/.config/cistream/config.toml` when that file exists; otherwise every
/// field falls back to its default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// CircleCI connection settings
    #[serde(default)]
    pub circleci: CircleCiConfig,

    /// Crawl tuning parameters
    #[serde(default)]
    pub crawl: CrawlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CircleCiConfig {
    /// CircleCI v2 API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// CircleCI v1.1 API base URL (per-job build details)
    #[serde(default = "default_api_v1_base_url")]
    pub api_v1_base_url: String,

    /// VCS provider slug used in project routes (e.g. 'github')
    #[serde(default = "default_vcs")]
    pub vcs: String,

    /// CircleCI API token
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Maximum number of pipelines to crawl (0 = unbounded)
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Total attempts per HTTP request before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between retry attempts, in milliseconds (linear backoff)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Maximum concurrent expansions per crawl stage
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Capacity of the channels between crawl stages
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://circleci.com/api/v2".to_string()
}

fn default_api_v1_base_url() -> String {
    "https://circleci.com/api/v1.1".to_string()
}

fn default_vcs() -> String {
    "github".to_string()
}

fn default_limit() -> usize {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    4
}

fn default_channel_capacity() -> usize {
    32
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CircleCiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_v1_base_url: default_api_v1_base_url(),
            vcs: default_vcs(),
            token: None,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            concurrency: default_concurrency(),
            channel_capacity: default_channel_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl CrawlConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicitly given path must exist and parse; the default path is
    /// optional and silently skipped when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CiStreamError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&contents).map_err(|e| {
            CiStreamError::Config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cistream").join("config.toml"))
    }
}
