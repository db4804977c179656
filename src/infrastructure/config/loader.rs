//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database host cannot be empty")]
    EmptyDatabaseHost,

    #[error("Database name cannot be empty")]
    EmptyDatabaseName,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid TTL for {0}: must be positive")]
    InvalidTtl(&'static str),

    #[error(
        "Invalid failure cooldown: {cooldown_secs}s must be shorter than the smallest TTL ({ttl_secs}s)"
    )]
    InvalidCooldown { cooldown_secs: u64, ttl_secs: u64 },

    #[error("Invalid min_year: {0}. Must be a plausible calendar year")]
    InvalidMinYear(i32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. eres.yaml (project config)
    /// 3. Environment variables (`ERES_*` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("eres.yaml"))
            .merge(Env::prefixed("ERES_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.host.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseHost);
        }
        if config.database.database.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseName);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(0));
        }

        let cache = &config.cache;
        for (name, secs) in [
            ("egs_ttl_secs", cache.egs_ttl_secs),
            ("pjm_ttl_secs", cache.pjm_ttl_secs),
            ("ptc_ttl_secs", cache.ptc_ttl_secs),
            ("derived_ttl_secs", cache.derived_ttl_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidTtl(name));
            }
        }

        let min_ttl = cache
            .egs_ttl_secs
            .min(cache.pjm_ttl_secs)
            .min(cache.ptc_ttl_secs)
            .min(cache.derived_ttl_secs);
        if cache.failure_cooldown_secs >= min_ttl {
            return Err(ConfigError::InvalidCooldown {
                cooldown_secs: cache.failure_cooldown_secs,
                ttl_secs: min_ttl,
            });
        }

        if !(1990..=2100).contains(&cache.min_year) {
            return Err(ConfigError::InvalidMinYear(cache.min_year));
        }

        match config.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        match config.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let config = Config {
            cache: crate::domain::models::CacheConfig {
                pjm_ttl_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTtl("pjm_ttl_secs"))
        ));
    }

    #[test]
    fn cooldown_must_undershoot_ttls() {
        let config = Config {
            cache: crate::domain::models::CacheConfig {
                failure_cooldown_secs: 600,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidCooldown { .. })
        ));
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "cache:\n  egs_ttl_secs: 120\ndatabase:\n  host: db.internal"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.cache.egs_ttl_secs, 120);
        assert_eq!(config.database.host, "db.internal");
        // Untouched fields keep their defaults.
        assert_eq!(config.cache.pjm_ttl_secs, 600);
    }

    #[test]
    fn env_overrides_take_priority() {
        temp_env::with_vars(
            [
                ("ERES_CACHE__DERIVED_TTL_SECS", Some("300")),
                ("ERES_DATABASE__HOST", Some("env-host")),
            ],
            || {
                let config = ConfigLoader::load().unwrap();
                assert_eq!(config.cache.derived_ttl_secs, 300);
                assert_eq!(config.database.host, "env-host");
            },
        );
    }
}
