//! Error types for queue channel operations.
//!
//! [`QueueError`] is the domain taxonomy every public operation returns.
//! [`ServiceError`] is the raw, backend-specific failure signal produced by a
//! [`QueueService`](crate::service::QueueService); it only becomes a
//! [`QueueError`] after passing through [`classify`](crate::classify).

use crate::provider::ProviderType;
use std::time::Duration;
use thiserror::Error;

/// Comprehensive error type for all queue channel operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue not found: {queue_url}")]
    QueueNotFound { queue_url: String },

    #[error("No queue URL configured for this channel")]
    QueueNotConfigured,

    #[error("Message not found or receipt expired: {receipt}")]
    MessageNotFound { receipt: String },

    /// `size` is `None` when the service refused the body without reporting its length.
    #[error("Message too large: {} (max: {max_size})", describe_size(.size))]
    MessageTooLarge {
        size: Option<usize>,
        max_size: usize,
    },

    #[error("No message received from {queue_url} within {elapsed:?}")]
    ReceiveTimeout { queue_url: String, elapsed: Duration },

    /// Backend failure the classifier does not recognise, passed through as-is.
    #[error(transparent)]
    Unclassified(ServiceError),

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl QueueError {
    /// Check if error is transient and a caller-side retry makes sense
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueNotFound { .. } => false,
            Self::QueueNotConfigured => false,
            Self::MessageNotFound { .. } => false,
            Self::MessageTooLarge { .. } => false,
            Self::ReceiveTimeout { .. } => true,
            Self::Unclassified(error) => error.is_transient(),
            Self::SerializationError(_) => false,
            Self::ConfigurationError(_) => false,
            Self::ValidationError(_) => false,
        }
    }

    /// Check if error should be retried
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }
}

fn describe_size(size: &Option<usize>) -> String {
    match size {
        Some(size) => format!("{} bytes", size),
        None => "size not reported by the service".to_string(),
    }
}

/// Raw failure reported by a queue backend before classification
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The service answered with an error document
    #[error("{provider} error {code} (HTTP {status}): {message}")]
    Api {
        provider: ProviderType,
        code: String,
        message: String,
        status: u16,
    },

    /// The request never produced a service answer
    #[error("{provider} transport failure: {message}")]
    Transport {
        provider: ProviderType,
        message: String,
    },

    /// The service answered with something that could not be read
    #[error("{provider} returned an unreadable response: {message}")]
    Protocol {
        provider: ProviderType,
        message: String,
    },
}

/// Error codes that signal throttling or a temporarily unavailable service.
const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "RequestThrottled",
    "ServiceUnavailable",
    "InternalFailure",
    "KmsThrottled",
];

impl ServiceError {
    /// Build an API error from a service error code
    pub fn api(
        provider: ProviderType,
        code: impl Into<String>,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::Api {
            provider,
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    /// Error code reported by the service, if the service answered at all
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Human readable message attached to the failure
    pub fn message(&self) -> &str {
        match self {
            Self::Api { message, .. } => message,
            Self::Transport { message, .. } => message,
            Self::Protocol { message, .. } => message,
        }
    }

    /// Backend that produced the failure
    pub fn provider(&self) -> ProviderType {
        match self {
            Self::Api { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Protocol { provider, .. } => *provider,
        }
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { code, status, .. } => {
                *status >= 500 || TRANSIENT_CODES.contains(&code.as_str())
            }
            Self::Transport { .. } => true,
            Self::Protocol { .. } => false,
        }
    }
}

/// Errors raised by a codec while converting between values and wire bodies
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cannot parse '{input}' as {type_name}: {message}")]
    Parse {
        type_name: &'static str,
        input: String,
        message: String,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },

    #[error("Duplicate value '{value}' for {field}")]
    Duplicate { field: String, value: String },
}

/// Failure of a scoped acknowledgement
///
/// The wrapped work and the acknowledgement are reported separately so the
/// caller can tell "my work failed (and the message is gone anyway)" apart
/// from "my work succeeded but the message could not be deleted".
#[derive(Debug, Error)]
pub enum ScopedAckError<E> {
    #[error("Work on the message failed: {0}")]
    Work(E),

    #[error("Acknowledgement failed: {0}")]
    Acknowledge(QueueError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
