//! Configuration for channels, providers and logging.
//!
//! Sources are applied in order, later ones overriding earlier ones:
//!  1. Built-in defaults (every field carries a serde default)
//!  2. An optional file (TOML, YAML or JSON, chosen by extension)
//!  3. Environment variables prefixed `QUEUE_CHANNEL` with a `__` separator,
//!     e.g. `QUEUE_CHANNEL__CHANNEL__BATCH_SIZE=5` sets `channel.batch_size`

use crate::error::{ConfigurationError, QueueError};
use crate::message::QueueUrl;
use crate::provider::{ServiceLimits, SqsConfig};
use crate::timeout::TimeoutPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "QUEUE_CHANNEL";

/// Complete configuration of a queue channel deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub channel: ChannelConfig,
    pub sqs: SqsConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let settings: Self = config
            .try_deserialize()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        settings.validate(&ServiceLimits::SQS)?;
        Ok(settings)
    }

    /// Check values against the limits of the target service
    pub fn validate(&self, limits: &ServiceLimits) -> Result<(), ConfigurationError> {
        self.channel.validate(limits)
    }
}

/// Per-channel configuration surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Queue the channel talks to; operations fail until one is supplied
    pub queue_url: Option<String>,

    /// Budget of each blocking receive operation
    pub timeout: TimeoutPolicy,

    /// Messages requested per poll round and entries per batch call
    pub batch_size: u32,

    /// Pause after a poll round that returned nothing, in milliseconds
    pub poll_pause_ms: u64,

    /// Upper bound for the server-side wait of one poll round
    pub max_wait_time_seconds: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            queue_url: None,
            timeout: TimeoutPolicy::Infinite,
            batch_size: ServiceLimits::SQS.max_batch_size,
            poll_pause_ms: 1000,
            max_wait_time_seconds: ServiceLimits::SQS.max_wait_seconds,
        }
    }
}

impl ChannelConfig {
    /// Check values against the limits of the target service
    pub fn validate(&self, limits: &ServiceLimits) -> Result<(), ConfigurationError> {
        if self.batch_size == 0 || self.batch_size > limits.max_batch_size {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "batch_size must be between 1 and {}, got {}",
                    limits.max_batch_size, self.batch_size
                ),
            });
        }

        if self.max_wait_time_seconds > limits.max_wait_seconds {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "max_wait_time_seconds must not exceed {}, got {}",
                    limits.max_wait_seconds, self.max_wait_time_seconds
                ),
            });
        }

        if let Some(url) = &self.queue_url {
            QueueUrl::new(url.clone()).map_err(|e| ConfigurationError::Invalid {
                message: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Configured queue URL, validated
    pub fn queue_url(&self) -> Result<Option<QueueUrl>, QueueError> {
        self.queue_url
            .as_ref()
            .map(|url| QueueUrl::new(url.clone()).map_err(QueueError::from))
            .transpose()
    }

    /// Pause between empty poll rounds
    pub fn poll_pause(&self) -> Duration {
        Duration::from_millis(self.poll_pause_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
