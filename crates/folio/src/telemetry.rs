//! Logging setup for the `folio` binary.
//!
//! Library code logs through `tracing` (issuance, queue, delivery) and `log`
//! (database layer). [`init_logging`] installs one `tracing-subscriber`
//! registry for both: an `EnvFilter` seeded from the configured level
//! (`RUST_LOG` wins when set), a `fmt` layer in text or JSON, and the
//! `tracing-log` bridge for `log` records.

use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::ConfigError;

/// Builds the filter: `RUST_LOG` if present and valid, else the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::Logging(format!("invalid level '{}': {}", config.level, e))),
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        tracing::subscriber::set_global_default(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            ),
        )
    } else {
        tracing::subscriber::set_global_default(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .with_thread_ids(true)
                    .with_target(false),
            ),
        )
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))?;

    LogTracer::init().map_err(|e| ConfigError::Logging(e.to_string()))?;
    Ok(())
}
