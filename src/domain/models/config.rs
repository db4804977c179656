//! Configuration model for the shared-data layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::key::SourceId;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Cache validity windows and failure handling.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MySQL connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_name")]
    pub database: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_host() -> String {
    "localhost".to_string()
}

const fn default_db_port() -> u16 {
    3306
}

fn default_db_name() -> String {
    "EEdb".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            database: default_db_name(),
            user: String::new(),
            password: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

/// Validity windows per source and derivation, plus failure handling.
///
/// The upstream views change on the order of days, so the default windows
/// are deliberately generous. All durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// How long an EGS snapshot stays fresh.
    #[serde(default = "default_raw_ttl_secs")]
    pub egs_ttl_secs: u64,

    /// How long a PJM snapshot stays fresh.
    #[serde(default = "default_raw_ttl_secs")]
    pub pjm_ttl_secs: u64,

    /// How long a PTC snapshot stays fresh.
    #[serde(default = "default_raw_ttl_secs")]
    pub ptc_ttl_secs: u64,

    /// How long a derived view stays fresh. May differ from its source's
    /// window; the view is also dropped whenever its source is invalidated.
    #[serde(default = "default_derived_ttl_secs")]
    pub derived_ttl_secs: u64,

    /// How long a failed fetch blocks duplicate retries.
    #[serde(default = "default_failure_cooldown_secs")]
    pub failure_cooldown_secs: u64,

    /// Serve the superseded value when a refresh fails, instead of the
    /// error. Off by default; callers opt in explicitly.
    #[serde(default)]
    pub serve_stale_on_error: bool,

    /// Earliest year of data to fetch from the upstream views.
    #[serde(default = "default_min_year")]
    pub min_year: i32,
}

const fn default_raw_ttl_secs() -> u64 {
    600
}

const fn default_derived_ttl_secs() -> u64 {
    600
}

const fn default_failure_cooldown_secs() -> u64 {
    30
}

const fn default_min_year() -> i32 {
    2010
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            egs_ttl_secs: default_raw_ttl_secs(),
            pjm_ttl_secs: default_raw_ttl_secs(),
            ptc_ttl_secs: default_raw_ttl_secs(),
            derived_ttl_secs: default_derived_ttl_secs(),
            failure_cooldown_secs: default_failure_cooldown_secs(),
            serve_stale_on_error: false,
            min_year: default_min_year(),
        }
    }
}

impl CacheConfig {
    /// Validity window for a raw snapshot of the given source.
    pub fn raw_ttl(&self, source: SourceId) -> Duration {
        let secs = match source {
            SourceId::Egs => self.egs_ttl_secs,
            SourceId::Pjm => self.pjm_ttl_secs,
            SourceId::Ptc => self.ptc_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// Validity window for derived views.
    pub fn derived_ttl(&self) -> Duration {
        Duration::from_secs(self.derived_ttl_secs)
    }

    /// Cooldown applied after a failed fetch.
    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for daily-rotated log files. Stdout only when unset.
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
