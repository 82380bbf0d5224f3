//! Typed producer side of a queue channel.
//!
//! A [`Sender`] encodes values with its [`Codec`] and submits them to the
//! queue, either one at a time or in batches sized to the service limits.
//! Size limits and batch id uniqueness are checked locally before anything is
//! sent, so an oversized payload is rejected rather than truncated.

use crate::classify::{classify, classify_entry, CallContext, Operation};
use crate::codec::Codec;
use crate::config::ChannelConfig;
use crate::connection::QueueConnection;
use crate::error::{QueueError, ServiceError, ValidationError};
use crate::message::{QueueUrl, SentMessage};
use crate::service::{BatchEntry, BatchEntryOutcome, QueueService};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;

/// Produces batch-local entry ids for [`Sender::send_many`]
pub type EntryIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Sends typed values to one queue
pub struct Sender<C: Codec> {
    connection: QueueConnection,
    codec: C,
    batch_size: u32,
    entry_ids: EntryIdGenerator,
}

impl<C: Codec> Sender<C> {
    /// Create a sender using the service's maximum batch size
    pub fn new(connection: QueueConnection, codec: C) -> Self {
        let batch_size = connection.limits().batch_ceiling();
        Self {
            connection,
            codec,
            batch_size,
            entry_ids: Arc::new(|| uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Create a sender from the channel configuration surface
    pub fn from_config(
        service: Arc<dyn QueueService>,
        config: &ChannelConfig,
        codec: C,
    ) -> Result<Self, QueueError> {
        config.validate(&service.limits())?;

        let connection = match config.queue_url()? {
            Some(url) => QueueConnection::new(service, url),
            None => QueueConnection::unconfigured(service),
        };

        Ok(Self::new(connection, codec).with_batch_size(config.batch_size))
    }

    /// Entries per batch call, clamped to `1..=max_batch_size` of the service
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.clamp(1, self.connection.limits().batch_ceiling());
        self
    }

    /// Replace the generator of batch-local entry ids (UUID v4 by default)
    pub fn with_entry_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.entry_ids = Arc::new(generator);
        self
    }

    /// Entries sent per batch call
    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Service handle and queue URL this sender writes to
    pub fn connection(&self) -> &QueueConnection {
        &self.connection
    }

    /// Encode and enqueue one value
    ///
    /// # Errors
    ///
    /// - [`QueueError::QueueNotConfigured`] if the sender has no queue URL
    /// - [`QueueError::MessageTooLarge`] if the encoded body exceeds the service limit
    /// - [`QueueError::QueueNotFound`] if the queue does not exist
    /// - the codec's error, unchanged, if encoding fails
    pub async fn send(&self, value: C::Value) -> Result<SentMessage<C::Value>, QueueError> {
        let queue = self.connection.queue_url()?;
        let body = self.codec.encode(&value)?;

        let max_size = self.connection.limits().max_message_size;
        check_size(body.len(), max_size)?;

        debug!(queue_url = %queue, size = body.len(), "Sending message");

        let message_id = self
            .connection
            .service()
            .submit(queue, &body)
            .await
            .map_err(|e| classify(CallContext::new(Operation::Send, queue, max_size), e))?;

        Ok(SentMessage { value, message_id })
    }

    /// Encode and enqueue many values in batch calls
    ///
    /// Values are split into chunks of [`Sender::batch_size`], each submitted as
    /// one batch call. Every chunk is validated before the first call: a body or
    /// a whole chunk above the size limit fails the operation with
    /// [`QueueError::MessageTooLarge`], and repeated entry ids within a chunk
    /// fail it with [`ValidationError::Duplicate`]. Entries the service rejects
    /// individually are listed in [`SendManyReport::failed`]; a failure of a
    /// whole call aborts the operation, leaving earlier chunks sent.
    ///
    /// An empty input performs no service calls.
    pub async fn send_many<I>(&self, values: I) -> Result<SendManyReport<C::Value>, QueueError>
    where
        I: IntoIterator<Item = C::Value>,
    {
        let queue = self.connection.queue_url()?;
        let max_size = self.connection.limits().max_message_size;

        let mut chunks: Vec<Vec<PendingEntry<C::Value>>> = Vec::new();
        for value in values {
            let body = self.codec.encode(&value)?;
            check_size(body.len(), max_size)?;

            let entry = PendingEntry {
                id: (self.entry_ids)(),
                body,
                value,
            };
            match chunks.last_mut() {
                Some(chunk) if chunk.len() < self.batch_size as usize => chunk.push(entry),
                _ => chunks.push(vec![entry]),
            }
        }

        for chunk in &chunks {
            check_chunk(chunk, max_size)?;
        }

        let mut report = SendManyReport::default();
        let chunk_count = chunks.len();
        for (index, chunk) in chunks.into_iter().enumerate() {
            debug!(
                queue_url = %queue,
                chunk = index + 1,
                chunk_count,
                entries = chunk.len(),
                "Sending message batch"
            );
            self.send_chunk(queue, max_size, chunk, &mut report).await?;
        }

        if chunk_count > 0 {
            info!(
                queue_url = %queue,
                sent = report.sent.len(),
                failed = report.failed.len(),
                "Batch send completed"
            );
        }

        Ok(report)
    }

    async fn send_chunk(
        &self,
        queue: &QueueUrl,
        max_size: usize,
        chunk: Vec<PendingEntry<C::Value>>,
        report: &mut SendManyReport<C::Value>,
    ) -> Result<(), QueueError> {
        let context = CallContext::new(Operation::SendBatch, queue, max_size);
        let service = self.connection.service();

        let entries: Vec<BatchEntry> = chunk
            .iter()
            .map(|entry| BatchEntry {
                id: entry.id.clone(),
                body: entry.body.clone(),
            })
            .collect();

        let outcomes = service
            .submit_batch(queue, &entries)
            .await
            .map_err(|e| classify(context, e))?;

        let mut outcomes: HashMap<String, BatchEntryOutcome> = outcomes
            .into_iter()
            .map(|outcome| (outcome.id().to_string(), outcome))
            .collect();

        for entry in chunk {
            let result = match outcomes.remove(&entry.id) {
                Some(BatchEntryOutcome::Succeeded {
                    message_id: Some(message_id),
                    ..
                }) => Ok(message_id),
                Some(BatchEntryOutcome::Succeeded {
                    message_id: None, ..
                }) => Err(QueueError::Unclassified(ServiceError::Protocol {
                    provider: service.provider_type(),
                    message: format!("no message id reported for batch entry {}", entry.id),
                })),
                Some(BatchEntryOutcome::Failed {
                    code,
                    message,
                    sender_fault,
                    ..
                }) => Err(classify_entry(
                    context,
                    service.provider_type(),
                    &code,
                    &message,
                    sender_fault,
                )),
                None => Err(QueueError::Unclassified(ServiceError::Protocol {
                    provider: service.provider_type(),
                    message: format!("no result reported for batch entry {}", entry.id),
                })),
            };

            match result {
                Ok(message_id) => report.sent.push(SentMessage {
                    value: entry.value,
                    message_id,
                }),
                Err(error) => {
                    warn!(
                        queue_url = %queue,
                        entry_id = %entry.id,
                        error = %error,
                        "Batch entry was not sent"
                    );
                    report.failed.push(FailedEntry {
                        value: entry.value,
                        error,
                    });
                }
            }
        }

        Ok(())
    }
}

impl<C: Codec> fmt::Debug for Sender<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("connection", &self.connection)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// Outcome of [`Sender::send_many`]
#[derive(Debug)]
pub struct SendManyReport<V> {
    /// Accepted values, in input order
    pub sent: Vec<SentMessage<V>>,
    /// Values the service rejected individually, in input order
    pub failed: Vec<FailedEntry<V>>,
}

impl<V> SendManyReport<V> {
    /// Check if every value was accepted
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<V> Default for SendManyReport<V> {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// A value the service refused inside a batch call
#[derive(Debug)]
pub struct FailedEntry<V> {
    pub value: V,
    pub error: QueueError,
}

struct PendingEntry<V> {
    id: String,
    body: String,
    value: V,
}

fn check_size(size: usize, max_size: usize) -> Result<(), QueueError> {
    if size > max_size {
        return Err(QueueError::MessageTooLarge {
            size: Some(size),
            max_size,
        });
    }
    Ok(())
}

fn check_chunk<V>(chunk: &[PendingEntry<V>], max_size: usize) -> Result<(), QueueError> {
    let total: usize = chunk.iter().map(|entry| entry.body.len()).sum();
    check_size(total, max_size)?;

    let mut seen = HashSet::new();
    for entry in chunk {
        if !seen.insert(entry.id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "batch entry id".to_string(),
                value: entry.id.clone(),
            }
            .into());
        }
    }

    Ok(())
}
