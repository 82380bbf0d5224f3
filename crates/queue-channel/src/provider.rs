//! Provider types, service limits and provider configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    AwsSqs,
    InMemory,
}

impl ProviderType {
    /// Get the hard limits the provider enforces
    pub fn limits(&self) -> ServiceLimits {
        match self {
            Self::AwsSqs => ServiceLimits::SQS,
            // The emulator mirrors SQS so behaviour observed locally holds in production
            Self::InMemory => ServiceLimits::SQS,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwsSqs => write!(f, "AwsSqs"),
            Self::InMemory => write!(f, "InMemory"),
        }
    }
}

/// Per-call limits imposed by a queue service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLimits {
    /// Maximum number of entries in one batch call, and of messages per poll
    pub max_batch_size: u32,
    /// Maximum server-side long-poll wait for a single call
    pub max_wait_seconds: u32,
    /// Maximum size in bytes of one message body, and of a whole batch
    pub max_message_size: usize,
}

impl ServiceLimits {
    /// Limits of Amazon SQS
    pub const SQS: Self = Self {
        max_batch_size: 10,
        max_wait_seconds: 20,
        max_message_size: 262_144,
    };

    /// Largest usable batch size, never below one even if `max_batch_size` is zero
    pub fn batch_ceiling(&self) -> u32 {
        self.max_batch_size.max(1)
    }
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self::SQS
    }
}

/// AWS SQS configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqsConfig {
    pub region: String,
    /// Overrides the regional endpoint (LocalStack, test servers)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Timeout of a single HTTP round-trip in seconds; must exceed the long-poll wait
    pub request_timeout_seconds: u64,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            request_timeout_seconds: 30,
        }
    }
}

impl fmt::Debug for SqsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsConfig")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// How long a delivered message stays hidden before it is redelivered
    pub visibility_timeout: Duration,
    pub limits: ServiceLimits,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            limits: ServiceLimits::SQS,
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
