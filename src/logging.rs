//! Tracing subscriber setup
//!
//! The library itself only emits `tracing` events. Embedding applications
//! that want them rendered call [`init`] once at startup.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the env filter; `RUST_LOG` wins over the configured level
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(format!("roster={},warn", config.level))
        .with_context(|| format!("Invalid log level: {}", config.level))
}

/// Install the global subscriber (text or json)
///
/// Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = env_filter(config)?;

    match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_from_config() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: String::from("debug"),
            format: String::from("json"),
        };
        let filter = env_filter(&config).unwrap();
        assert!(filter.to_string().contains("roster=debug"));
    }

    #[test]
    #[serial]
    fn test_init_twice_fails() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig::default();
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
