//! Maps backend failure signals onto the domain error taxonomy.
//!
//! Classification is a pure function of the failing call and the raw
//! [`ServiceError`]. Only error codes listed here are reclassified; anything
//! else is passed through untouched as [`QueueError::Unclassified`].

use crate::error::{QueueError, ServiceError};
use crate::message::{QueueUrl, ReceiptHandle};
use crate::provider::ProviderType;

/// Queue operation during which a backend failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Send,
    SendBatch,
    Receive,
    Acknowledge,
    AcknowledgeBatch,
}

impl Operation {
    fn is_send(self) -> bool {
        matches!(self, Self::Send | Self::SendBatch)
    }

    fn is_acknowledge(self) -> bool {
        matches!(self, Self::Acknowledge | Self::AcknowledgeBatch)
    }
}

/// What the failing call was doing, and to what
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub operation: Operation,
    pub queue: &'a QueueUrl,
    pub max_message_size: usize,
    pub receipt: Option<&'a ReceiptHandle>,
}

impl<'a> CallContext<'a> {
    pub fn new(operation: Operation, queue: &'a QueueUrl, max_message_size: usize) -> Self {
        Self {
            operation,
            queue,
            max_message_size,
            receipt: None,
        }
    }

    /// Attach the receipt handle an acknowledgement was using
    pub fn with_receipt(mut self, receipt: &'a ReceiptHandle) -> Self {
        self.receipt = Some(receipt);
        self
    }
}

const QUEUE_MISSING_CODES: &[&str] = &[
    "AWS.SimpleQueueService.NonExistentQueue",
    "QueueDoesNotExist",
    "NonExistentQueue",
];

const INVALID_RECEIPT_CODES: &[&str] = &[
    "ReceiptHandleIsInvalid",
    "InvalidReceiptHandle",
    "AWS.SimpleQueueService.ReceiptHandleIsInvalid",
];

const BATCH_TOO_LONG_CODES: &[&str] = &[
    "AWS.SimpleQueueService.BatchRequestTooLong",
    "BatchRequestTooLong",
];

/// Service message fragment used when a single body exceeds the size limit
const BODY_TOO_LONG_MARKER: &str = "must be shorter than";

/// Classify a failed call
pub fn classify(context: CallContext<'_>, error: ServiceError) -> QueueError {
    let classified = error
        .code()
        .and_then(|code| classify_code(&context, code, error.message()));

    classified.unwrap_or(QueueError::Unclassified(error))
}

/// Classify the failure of one entry inside a batch response
pub fn classify_entry(
    context: CallContext<'_>,
    provider: ProviderType,
    code: &str,
    message: &str,
    sender_fault: bool,
) -> QueueError {
    classify_code(&context, code, message).unwrap_or_else(|| {
        let status = if sender_fault { 400 } else { 500 };
        QueueError::Unclassified(ServiceError::api(provider, code, message, status))
    })
}

fn classify_code(context: &CallContext<'_>, code: &str, message: &str) -> Option<QueueError> {
    if QUEUE_MISSING_CODES.contains(&code) {
        return Some(QueueError::QueueNotFound {
            queue_url: context.queue.to_string(),
        });
    }

    if context.operation.is_acknowledge() && INVALID_RECEIPT_CODES.contains(&code) {
        let receipt = context
            .receipt
            .map(|r| r.to_string())
            .unwrap_or_else(|| message.to_string());
        return Some(QueueError::MessageNotFound { receipt });
    }

    if context.operation.is_send() {
        let body_too_long =
            code == "InvalidParameterValue" && message.contains(BODY_TOO_LONG_MARKER);
        if body_too_long || BATCH_TOO_LONG_CODES.contains(&code) {
            // The service does not echo the offending size back
            return Some(QueueError::MessageTooLarge {
                size: None,
                max_size: context.max_message_size,
            });
        }
    }

    None
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
