//! The call shape every queue backend must provide.
//!
//! [`QueueService`] covers submit, batch submit, long-poll,
//! delete and batch delete against an opaque [`QueueUrl`]. Backends report raw
//! [`ServiceError`]s; turning those into domain errors is the job of
//! [`classify`](crate::classify), not of the backend.

use crate::error::ServiceError;
use crate::message::{MessageId, QueueUrl, RawMessage, ReceiptHandle};
use crate::provider::{ProviderType, ServiceLimits};
use async_trait::async_trait;

/// Result of one long-poll round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The service returned at least one message
    Delivered(Vec<RawMessage>),
    /// The wait elapsed without any message becoming available
    Empty,
}

impl PollOutcome {
    /// Build an outcome from a possibly empty list of messages
    pub fn from_messages(messages: Vec<RawMessage>) -> Self {
        if messages.is_empty() {
            Self::Empty
        } else {
            Self::Delivered(messages)
        }
    }
}

/// One item of a batch send request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Identifier unique within the batch, echoed back in the results
    pub id: String,
    pub body: String,
}

/// One item of a batch delete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEntry {
    /// Identifier unique within the batch, echoed back in the results
    pub id: String,
    pub receipt_handle: ReceiptHandle,
}

/// Per-entry result of a batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEntryOutcome {
    Succeeded {
        id: String,
        /// Present for batch sends
        message_id: Option<MessageId>,
    },
    Failed {
        id: String,
        code: String,
        message: String,
        /// Whether the service blames the request rather than itself
        sender_fault: bool,
    },
}

impl BatchEntryOutcome {
    /// Batch-local id the outcome refers to
    pub fn id(&self) -> &str {
        match self {
            Self::Succeeded { id, .. } => id,
            Self::Failed { id, .. } => id,
        }
    }
}

/// Interface implemented by specific queue backends (SQS, in-memory, ...)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Enqueue one message body
    async fn submit(&self, queue: &QueueUrl, body: &str) -> Result<MessageId, ServiceError>;

    /// Enqueue up to `max_batch_size` bodies in one call
    async fn submit_batch(
        &self,
        queue: &QueueUrl,
        entries: &[BatchEntry],
    ) -> Result<Vec<BatchEntryOutcome>, ServiceError>;

    /// Wait up to `wait_seconds` for at most `max_messages` messages
    async fn poll(
        &self,
        queue: &QueueUrl,
        max_messages: u32,
        wait_seconds: u32,
    ) -> Result<PollOutcome, ServiceError>;

    /// Delete a delivered message by its receipt handle
    async fn delete(&self, queue: &QueueUrl, receipt: &ReceiptHandle) -> Result<(), ServiceError>;

    /// Delete up to `max_batch_size` delivered messages in one call
    async fn delete_batch(
        &self,
        queue: &QueueUrl,
        entries: &[DeleteEntry],
    ) -> Result<Vec<BatchEntryOutcome>, ServiceError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Get the per-call limits of the service
    fn limits(&self) -> ServiceLimits {
        self.provider_type().limits()
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
