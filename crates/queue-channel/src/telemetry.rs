//! Logging initialisation for applications embedding the channel.
//!
//! The library itself only emits `tracing` events. Binaries and test harnesses
//! call [`init_logging`] once to install a subscriber.

use crate::config::LoggingConfig;
use crate::error::ConfigurationError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if the filter is
/// malformed or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigurationError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| ConfigurationError::Invalid {
        message: format!("cannot install tracing subscriber: {}", e),
    })
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigurationError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| ConfigurationError::Invalid {
            message: format!("invalid log level '{}': {}", config.level, e),
        }),
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
