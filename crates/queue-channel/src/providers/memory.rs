//! In-memory queue service for testing and development.
//!
//! This module provides an SQS-compatible emulator that:
//! - Hands out a fresh receipt handle for every delivery
//! - Hides delivered messages for a visibility timeout and redelivers them
//!   when they are not deleted in time
//! - Long-polls: a waiting `poll` wakes up as soon as a message is sent
//! - Enforces SQS size and batch limits and reports SQS error codes
//!
//! Queues must be created with [`InMemoryService::create_queue`]; any other
//! URL is reported as a non-existent queue.

use crate::error::{ServiceError, ValidationError};
use crate::message::{MessageId, QueueUrl, RawMessage, ReceiptHandle};
use crate::provider::{InMemoryConfig, ProviderType, ServiceLimits};
use crate::service::{BatchEntry, BatchEntryOutcome, DeleteEntry, PollOutcome, QueueService};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// URL scheme of queues hosted by the in-memory service
pub const MEMORY_SCHEME: &str = "memory://";

const NON_EXISTENT_QUEUE: &str = "AWS.SimpleQueueService.NonExistentQueue";
const RECEIPT_HANDLE_IS_INVALID: &str = "ReceiptHandleIsInvalid";
const INVALID_PARAMETER_VALUE: &str = "InvalidParameterValue";
const EMPTY_BATCH_REQUEST: &str = "AWS.SimpleQueueService.EmptyBatchRequest";
const TOO_MANY_ENTRIES: &str = "AWS.SimpleQueueService.TooManyEntriesInBatchRequest";
const BATCH_ENTRY_IDS_NOT_DISTINCT: &str = "AWS.SimpleQueueService.BatchEntryIdsNotDistinct";
const BATCH_REQUEST_TOO_LONG: &str = "AWS.SimpleQueueService.BatchRequestTooLong";

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// All queues hosted by one service instance
struct QueueStorage {
    queues: HashMap<QueueUrl, InMemoryQueue>,
    next_sequence: u64,
}

/// Internal queue state for a single queue
#[derive(Default)]
struct InMemoryQueue {
    /// Visible messages in send order
    messages: VecDeque<StoredMessage>,
    /// Delivered messages keyed by their current receipt handle
    in_flight: HashMap<String, InFlightMessage>,
}

impl InMemoryQueue {
    /// Return messages whose visibility window has passed to the visible set
    fn release_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, in_flight)| in_flight.visible_again_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        if expired.is_empty() {
            return;
        }

        for handle in expired {
            if let Some(in_flight) = self.in_flight.remove(&handle) {
                self.messages.push_back(in_flight.message);
            }
        }

        // Redelivered messages keep their original position
        self.messages
            .make_contiguous()
            .sort_by_key(|message| message.sequence);
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: String,
    sequence: u64,
    receive_count: u32,
}

/// A message currently hidden from receivers
struct InFlightMessage {
    message: StoredMessage,
    visible_again_at: Instant,
}

// ============================================================================
// InMemoryService
// ============================================================================

/// In-memory queue service implementation
#[derive(Clone)]
pub struct InMemoryService {
    storage: Arc<Mutex<QueueStorage>>,
    arrivals: Arc<Notify>,
    config: InMemoryConfig,
}

impl InMemoryService {
    /// Create new in-memory service with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(QueueStorage {
                queues: HashMap::new(),
                next_sequence: 0,
            })),
            arrivals: Arc::new(Notify::new()),
            config,
        }
    }

    /// Create a queue, returning its URL; creating an existing queue is a no-op
    pub fn create_queue(&self, name: &str) -> Result<QueueUrl, ValidationError> {
        let url = QueueUrl::new(format!("{}{}", MEMORY_SCHEME, name))?;
        self.lock().queues.entry(url.clone()).or_default();
        Ok(url)
    }

    /// Remove a queue and everything in it
    pub fn delete_queue(&self, queue: &QueueUrl) -> bool {
        self.lock().queues.remove(queue).is_some()
    }

    /// Number of messages in the queue, visible and in flight
    pub fn approximate_len(&self, queue: &QueueUrl) -> Option<usize> {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.messages.len() + q.in_flight.len())
    }

    fn lock(&self) -> MutexGuard<'_, QueueStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn api_error(code: &str, message: impl Into<String>) -> ServiceError {
        ServiceError::api(ProviderType::InMemory, code, message, 400)
    }

    fn queue_missing(queue: &QueueUrl) -> ServiceError {
        Self::api_error(
            NON_EXISTENT_QUEUE,
            format!("The specified queue {} does not exist.", queue),
        )
    }

    fn check_body(&self, body: &str) -> Result<(), ServiceError> {
        let max = self.config.limits.max_message_size;
        if body.len() > max {
            return Err(Self::api_error(
                INVALID_PARAMETER_VALUE,
                format!(
                    "One or more parameters are invalid. Reason: Message must be shorter than {} bytes.",
                    max
                ),
            ));
        }
        Ok(())
    }

    fn check_batch<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Result<(), ServiceError> {
        let mut seen = HashSet::new();
        let mut count = 0u32;
        for id in ids {
            count += 1;
            if !seen.insert(id) {
                return Err(Self::api_error(
                    BATCH_ENTRY_IDS_NOT_DISTINCT,
                    format!("Id {} repeated.", id),
                ));
            }
        }

        if count == 0 {
            return Err(Self::api_error(
                EMPTY_BATCH_REQUEST,
                "There should be at least one entry in the request.",
            ));
        }

        if count > self.config.limits.max_batch_size {
            return Err(Self::api_error(
                TOO_MANY_ENTRIES,
                format!(
                    "Maximum number of entries per request are {}. You have sent {}.",
                    self.config.limits.max_batch_size, count
                ),
            ));
        }

        Ok(())
    }

    /// Take up to `max_messages` visible messages, marking them in flight
    fn take_visible(
        &self,
        queue: &QueueUrl,
        max_messages: u32,
    ) -> Result<Vec<RawMessage>, ServiceError> {
        let mut storage = self.lock();
        let queue_state = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| Self::queue_missing(queue))?;

        let now = Instant::now();
        queue_state.release_expired(now);

        let mut delivered = Vec::new();
        while delivered.len() < max_messages as usize {
            let Some(mut message) = queue_state.messages.pop_front() else {
                break;
            };

            message.receive_count += 1;
            let handle = uuid::Uuid::new_v4().to_string();

            delivered.push(RawMessage {
                body: message.body.clone(),
                receipt_handle: ReceiptHandle::new(handle.clone()),
                message_id: Some(message.message_id.clone()),
                receive_count: message.receive_count,
            });

            queue_state.in_flight.insert(
                handle,
                InFlightMessage {
                    message,
                    visible_again_at: now + self.config.visibility_timeout,
                },
            );
        }

        Ok(delivered)
    }

    fn enqueue(&self, queue: &QueueUrl, bodies: &[&str]) -> Result<Vec<MessageId>, ServiceError> {
        let mut storage = self.lock();
        let mut sequence = storage.next_sequence;
        let queue_state = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| Self::queue_missing(queue))?;

        let mut ids = Vec::with_capacity(bodies.len());
        for body in bodies {
            let message_id = MessageId::new();
            queue_state.messages.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: (*body).to_string(),
                sequence,
                receive_count: 0,
            });
            sequence += 1;
            ids.push(message_id);
        }
        storage.next_sequence = sequence;
        drop(storage);

        self.arrivals.notify_waiters();
        Ok(ids)
    }

    fn remove_in_flight(&self, queue: &QueueUrl, receipt: &str) -> Result<(), ServiceError> {
        let mut storage = self.lock();
        let queue_state = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| Self::queue_missing(queue))?;

        queue_state.release_expired(Instant::now());

        match queue_state.in_flight.remove(receipt) {
            Some(_) => Ok(()),
            None => Err(Self::api_error(
                RECEIPT_HANDLE_IS_INVALID,
                format!("The input receipt handle \"{}\" is not a valid receipt handle.", receipt),
            )),
        }
    }
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl QueueService for InMemoryService {
    async fn submit(&self, queue: &QueueUrl, body: &str) -> Result<MessageId, ServiceError> {
        self.check_body(body)?;
        let mut ids = self.enqueue(queue, &[body])?;
        ids.pop()
            .ok_or_else(|| Self::api_error("InternalError", "message was not stored"))
    }

    async fn submit_batch(
        &self,
        queue: &QueueUrl,
        entries: &[BatchEntry],
    ) -> Result<Vec<BatchEntryOutcome>, ServiceError> {
        if !self.lock().queues.contains_key(queue) {
            return Err(Self::queue_missing(queue));
        }
        self.check_batch(entries.iter().map(|e| e.id.as_str()))?;

        let total: usize = entries.iter().map(|e| e.body.len()).sum();
        let max = self.config.limits.max_message_size;
        if total > max {
            return Err(Self::api_error(
                BATCH_REQUEST_TOO_LONG,
                format!("Batch requests cannot be longer than {} bytes. You have sent {} bytes.", max, total),
            ));
        }

        let bodies: Vec<&str> = entries.iter().map(|e| e.body.as_str()).collect();
        let ids = self.enqueue(queue, &bodies)?;

        Ok(entries
            .iter()
            .zip(ids)
            .map(|(entry, message_id)| BatchEntryOutcome::Succeeded {
                id: entry.id.clone(),
                message_id: Some(message_id),
            })
            .collect())
    }

    async fn poll(
        &self,
        queue: &QueueUrl,
        max_messages: u32,
        wait_seconds: u32,
    ) -> Result<PollOutcome, ServiceError> {
        let max_messages = max_messages.clamp(1, self.config.limits.batch_ceiling());
        let wait = wait_seconds.min(self.config.limits.max_wait_seconds);
        let deadline = Instant::now() + Duration::from_secs(u64::from(wait));

        loop {
            // Register interest before looking, so a send in between is not missed
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let delivered = self.take_visible(queue, max_messages)?;
            if !delivered.is_empty() {
                return Ok(PollOutcome::Delivered(delivered));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(PollOutcome::Empty);
            }

            // In-flight messages may become visible again before anything is sent
            let wake_at = self.next_redelivery(queue).map_or(deadline, |at| at.min(deadline));

            tokio::select! {
                _ = &mut arrival => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, queue: &QueueUrl, receipt: &ReceiptHandle) -> Result<(), ServiceError> {
        self.remove_in_flight(queue, receipt.as_str())
    }

    async fn delete_batch(
        &self,
        queue: &QueueUrl,
        entries: &[DeleteEntry],
    ) -> Result<Vec<BatchEntryOutcome>, ServiceError> {
        if !self.lock().queues.contains_key(queue) {
            return Err(Self::queue_missing(queue));
        }
        self.check_batch(entries.iter().map(|e| e.id.as_str()))?;

        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            let outcome = match self.remove_in_flight(queue, entry.receipt_handle.as_str()) {
                Ok(()) => BatchEntryOutcome::Succeeded {
                    id: entry.id.clone(),
                    message_id: None,
                },
                Err(error) => BatchEntryOutcome::Failed {
                    id: entry.id.clone(),
                    code: error.code().unwrap_or(RECEIPT_HANDLE_IS_INVALID).to_string(),
                    message: error.message().to_string(),
                    sender_fault: true,
                },
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }

    fn limits(&self) -> ServiceLimits {
        self.config.limits
    }
}

impl InMemoryService {
    /// Earliest instant at which an in-flight message becomes visible again
    fn next_redelivery(&self, queue: &QueueUrl) -> Option<Instant> {
        self.lock()
            .queues
            .get(queue)
            .and_then(|q| q.in_flight.values().map(|m| m.visible_again_at).min())
    }
}
