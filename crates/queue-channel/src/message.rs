//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Opaque address of a queue (an SQS queue URL, `memory://name`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueUrl(String);

impl QueueUrl {
    /// Create new queue URL with validation
    pub fn new(url: String) -> Result<Self, ValidationError> {
        if url.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "queue_url".to_string(),
            });
        }

        if url.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidFormat {
                field: "queue_url".to_string(),
                message: "whitespace is not allowed".to_string(),
            });
        }

        Ok(Self(url))
    }

    /// Get queue URL as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueUrl {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Service-issued identifier of an enqueued message
///
/// Stable across redeliveries, but it cannot be used to delete the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Per-delivery deletion token
///
/// A redelivered message carries a different handle. Once used for a
/// successful delete, or once the visibility window of its delivery has
/// passed, the handle is no longer recognised by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    /// Wrap a handle string issued by the service
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get handle string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dt = s.parse::<DateTime<Utc>>()?;
        Ok(Self::from_datetime(dt))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A typed message delivered by a [`Receiver`](crate::Receiver)
#[derive(Debug, Clone, PartialEq)]
pub struct Message<V> {
    pub value: V,
    pub receipt_handle: ReceiptHandle,
    pub message_id: Option<MessageId>,
    /// Approximate number of times the service delivered this message
    pub receive_count: u32,
}

impl<V> Message<V> {
    /// Create a message descriptor for a value and the handle of its delivery
    pub fn new(value: V, receipt_handle: ReceiptHandle) -> Self {
        Self {
            value,
            receipt_handle,
            message_id: None,
            receive_count: 1,
        }
    }

    /// Attach the service message id
    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Set the approximate receive count
    pub fn with_receive_count(mut self, receive_count: u32) -> Self {
        self.receive_count = receive_count;
        self
    }

    /// Check if the service reports this message as delivered before
    pub fn is_redelivery(&self) -> bool {
        self.receive_count > 1
    }

    /// Consume the descriptor, keeping only the value
    pub fn into_value(self) -> V {
        self.value
    }
}

/// A typed message accepted by the service through a [`Sender`](crate::Sender)
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage<V> {
    pub value: V,
    pub message_id: MessageId,
}

/// A wire-level message as returned by one poll round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub body: String,
    pub receipt_handle: ReceiptHandle,
    pub message_id: Option<MessageId>,
    pub receive_count: u32,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
