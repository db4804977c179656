//! Logging initialization using tracing.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

use crate::domain::models::LoggingConfig;

/// Initialize the global subscriber from config.
///
/// Returns a worker guard when file output is configured; the guard must be
/// held for the lifetime of the process or buffered log lines are lost.
/// File output is always JSON; stdout honors the configured format.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(log_dir) = &config.log_dir {
        let file_appender = rolling::daily(log_dir, "eres-data.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .try_init()
            .map_err(|e| anyhow!("failed to initialize logging: {e}"))?;
        return Ok(Some(guard));
    }

    if config.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .try_init()
            .map_err(|e| anyhow!("failed to initialize logging: {e}"))?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init()
            .map_err(|e| anyhow!("failed to initialize logging: {e}"))?;
    }
    Ok(None)
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(anyhow!("invalid log level: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_log_level("INFO").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert!(parse_log_level("verbose").is_err());
    }
}
