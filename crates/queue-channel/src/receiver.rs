//! Typed consumer side of a queue channel.
//!
//! A [`Receiver`] composes one long-lived operation ("receive within T") out of
//! many bounded long-poll rounds. Before every round it asks its [`Timer`] how
//! much budget is left and requests a server-side wait of
//! `min(max_wait_time_seconds, remaining)`, so no single round overshoots the
//! caller's timeout. A round that returns nothing is followed by a short pause
//! and another round, until a message arrives or the timer expires.
//!
//! Expiry is reported differently depending on how the receiver is used:
//!
//! - [`Receiver::receive`] fails with [`QueueError::ReceiveTimeout`]
//! - [`Receiver::messages`] simply ends the stream
//!
//! ## Acknowledgement
//!
//! Messages stay in the queue until acknowledged. An unacknowledged message is
//! redelivered by the service once its visibility window passes, carrying a new
//! receipt handle. Acknowledging a handle the service no longer recognises
//! (already deleted, or expired) fails with [`QueueError::MessageNotFound`].
//!
//! [`Receiver::with_acknowledgement`] acknowledges the message on **every** exit
//! path of the wrapped work, including failure and panic. A message whose
//! processing failed is therefore gone and will not be redelivered. Callers that
//! rely on redelivery to retry failed work must call [`Receiver::acknowledge`]
//! themselves after the work succeeded.

use crate::classify::{classify, classify_entry, CallContext, Operation};
use crate::codec::Codec;
use crate::config::ChannelConfig;
use crate::connection::QueueConnection;
use crate::error::{QueueError, ScopedAckError, ServiceError};
use crate::message::{Message, QueueUrl, RawMessage, ReceiptHandle};
use crate::service::{BatchEntryOutcome, DeleteEntry, PollOutcome, QueueService};
use crate::timeout::{long_poll_wait_seconds, Timer, TimeoutPolicy};
use futures::{FutureExt, Stream};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[cfg(test)]
#[path = "receiver_tests.rs"]
mod tests;

/// Default pause after a poll round that returned no messages
pub const DEFAULT_POLL_PAUSE: Duration = Duration::from_secs(1);

/// Receives typed values from one queue
pub struct Receiver<C: Codec> {
    connection: QueueConnection,
    codec: C,
    timeout: TimeoutPolicy,
    batch_size: u32,
    poll_pause: Duration,
    max_wait_time_seconds: u32,
}

impl<C: Codec> Receiver<C> {
    /// Create a receiver with an infinite timeout and the service's limits
    pub fn new(connection: QueueConnection, codec: C) -> Self {
        let limits = connection.limits();
        Self {
            connection,
            codec,
            timeout: TimeoutPolicy::Infinite,
            batch_size: limits.batch_ceiling(),
            poll_pause: DEFAULT_POLL_PAUSE,
            max_wait_time_seconds: limits.max_wait_seconds,
        }
    }

    /// Create a receiver from the channel configuration surface
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

        Ok(Self::new(connection, codec)
            .with_timeout(config.timeout.clone())
            .with_batch_size(config.batch_size)
            .with_poll_pause(config.poll_pause())
            .with_max_wait_time_seconds(config.max_wait_time_seconds))
    }

    /// Budget of every blocking operation on this receiver
    pub fn with_timeout(mut self, timeout: impl Into<TimeoutPolicy>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Messages requested per iteration round, clamped to `1..=max_batch_size`
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.clamp(1, self.connection.limits().batch_ceiling());
        self
    }

    /// Pause after a round that returned no messages
    pub fn with_poll_pause(mut self, poll_pause: Duration) -> Self {
        self.poll_pause = poll_pause;
        self
    }

    /// Server-side wait cap per round, clamped to the service maximum
    pub fn with_max_wait_time_seconds(mut self, seconds: u32) -> Self {
        self.max_wait_time_seconds = seconds.min(self.connection.limits().max_wait_seconds);
        self
    }

    /// Timeout policy applied to receive and iteration
    pub fn timeout(&self) -> &TimeoutPolicy {
        &self.timeout
    }

    /// Messages requested per iteration round
    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Pause after an empty poll round
    pub fn poll_pause(&self) -> Duration {
        self.poll_pause
    }

    /// Server-side wait cap per poll round
    pub fn max_wait_time_seconds(&self) -> u32 {
        self.max_wait_time_seconds
    }

    /// Service handle and queue URL this receiver reads from
    pub fn connection(&self) -> &QueueConnection {
        &self.connection
    }

    /// Wait for exactly one message within the receiver's timeout
    ///
    /// # Errors
    ///
    /// - [`QueueError::ReceiveTimeout`] if the timeout expires first
    /// - [`QueueError::QueueNotFound`] if the queue does not exist
    /// - the codec's error if the body cannot be decoded; the message is then
    ///   left unacknowledged and will be redelivered
    pub async fn receive(&self) -> Result<Message<C::Value>, QueueError> {
        self.receive_within(&self.timeout).await
    }

    /// Like [`Receiver::receive`], with a one-off timeout for this call only
    pub async fn receive_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Message<C::Value>, QueueError> {
        self.receive_within(&TimeoutPolicy::constant(timeout)).await
    }

    async fn receive_within(&self, policy: &TimeoutPolicy) -> Result<Message<C::Value>, QueueError> {
        let queue = self.connection.queue_url()?;
        let timer = policy.new_timer();

        let delivered = self.poll_until_delivered(queue, &timer, 1).await?;
        match delivered.and_then(|messages| messages.into_iter().next()) {
            Some(raw) => self.decode(raw),
            None => {
                debug!(queue_url = %queue, elapsed = ?timer.elapsed(), "Receive timed out");
                Err(QueueError::ReceiveTimeout {
                    queue_url: queue.to_string(),
                    elapsed: timer.elapsed(),
                })
            }
        }
    }

    /// Lazily receive messages until the timeout passes without a delivery
    ///
    /// Each round requests up to [`Receiver::batch_size`] messages and yields
    /// them in the order the service returned them. The timer is restarted
    /// before the first round after every delivery, so under a constant
    /// timeout the stream ends once the queue has been idle for that long. It
    /// never ends under an infinite timeout.
    ///
    /// A body the codec rejects is yielded as an `Err` item and iteration
    /// continues. A failed service call is yielded as an `Err` item and ends
    /// the stream.
    pub fn messages(&self) -> impl Stream<Item = Result<Message<C::Value>, QueueError>> + '_ {
        let state = IterationState {
            timer: None,
            pending: VecDeque::new(),
            finished: false,
        };

        futures::stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(raw) = state.pending.pop_front() {
                    let item = self.decode(raw);
                    return Some((item, state));
                }

                if state.finished {
                    return None;
                }

                let queue = match self.connection.queue_url() {
                    Ok(queue) => queue,
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                };

                let timer = state.timer.get_or_insert_with(|| self.timeout.new_timer());
                match self.poll_until_delivered(queue, timer, self.batch_size).await {
                    Ok(Some(messages)) => {
                        state.pending.extend(messages);
                        state.timer = None;
                    }
                    Ok(None) => {
                        debug!(queue_url = %queue, "Iteration budget used up, stopping");
                        return None;
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }
        })
    }

    /// Run poll rounds until one delivers messages or the timer expires
    ///
    /// Always performs at least one round. Returns `None` on expiry.
    async fn poll_until_delivered(
        &self,
        queue: &QueueUrl,
        timer: &Timer,
        max_messages: u32,
    ) -> Result<Option<Vec<RawMessage>>, QueueError> {
        let context = CallContext::new(
            Operation::Receive,
            queue,
            self.connection.limits().max_message_size,
        );

        loop {
            let wait_seconds = long_poll_wait_seconds(self.max_wait_time_seconds, timer.remaining());
            debug!(queue_url = %queue, wait_seconds, max_messages, "Polling queue");

            let outcome = self
                .connection
                .service()
                .poll(queue, max_messages, wait_seconds)
                .await
                .map_err(|e| classify(context, e))?;

            if let PollOutcome::Delivered(messages) = outcome {
                if !messages.is_empty() {
                    debug!(queue_url = %queue, count = messages.len(), "Received messages");
                    return Ok(Some(messages));
                }
            }

            if timer.is_expired() {
                return Ok(None);
            }

            // Never sleep past the end of the budget
            let pause = self.poll_pause.min(timer.remaining());
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            if timer.is_expired() {
                return Ok(None);
            }
        }
    }

    fn decode(&self, raw: RawMessage) -> Result<Message<C::Value>, QueueError> {
        let value = self.codec.decode(&raw.body).map_err(|e| {
            warn!(
                receipt_handle = %raw.receipt_handle,
                error = %e,
                "Received message could not be decoded"
            );
            e
        })?;

        let mut message =
            Message::new(value, raw.receipt_handle).with_receive_count(raw.receive_count);
        if let Some(message_id) = raw.message_id {
            message = message.with_message_id(message_id);
        }

        Ok(message)
    }

    /// Delete a delivered message from the queue
    ///
    /// Returns the same message for chaining.
    ///
    /// # Errors
    ///
    /// - [`QueueError::MessageNotFound`] if the service no longer recognises the
    ///   receipt handle. This includes a second acknowledgement of a message that
    ///   was already deleted.
    /// - any other service failure, unchanged
    pub async fn acknowledge(
        &self,
        message: Message<C::Value>,
    ) -> Result<Message<C::Value>, QueueError> {
        let queue = self.connection.queue_url()?;
        self.delete_receipt(queue, &message.receipt_handle).await?;
        Ok(message)
    }

    async fn delete_receipt(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        debug!(queue_url = %queue, receipt_handle = %receipt, "Acknowledging message");

        let context = CallContext::new(
            Operation::Acknowledge,
            queue,
            self.connection.limits().max_message_size,
        )
        .with_receipt(receipt);

        self.connection
            .service()
            .delete(queue, receipt)
            .await
            .map_err(|e| classify(context, e))
    }

    /// Acknowledge many messages through batch delete calls
    ///
    /// Messages are deleted in chunks of the service's maximum batch size.
    /// Handles the service rejects are listed in
    /// [`AcknowledgeReport::failed`]; a failure of a whole call aborts the
    /// operation, leaving earlier chunks deleted. An empty input performs no
    /// service calls.
    pub async fn acknowledge_many<I>(
        &self,
        messages: I,
    ) -> Result<AcknowledgeReport<C::Value>, QueueError>
    where
        I: IntoIterator<Item = Message<C::Value>>,
    {
        let queue = self.connection.queue_url()?;
        let limits = self.connection.limits();
        let chunk_size = limits.batch_ceiling() as usize;

        let mut report = AcknowledgeReport::default();
        let mut chunk = Vec::with_capacity(chunk_size);
        let mut chunk_count = 0usize;

        for message in messages {
            chunk.push(message);
            if chunk.len() == chunk_size {
                chunk_count += 1;
                let full = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size));
                self.acknowledge_chunk(queue, full, &mut report).await?;
            }
        }

        if !chunk.is_empty() {
            chunk_count += 1;
            self.acknowledge_chunk(queue, chunk, &mut report).await?;
        }

        if chunk_count > 0 {
            info!(
                queue_url = %queue,
                acknowledged = report.acknowledged.len(),
                failed = report.failed.len(),
                "Batch acknowledgement completed"
            );
        }

        Ok(report)
    }

    async fn acknowledge_chunk(
        &self,
        queue: &QueueUrl,
        chunk: Vec<Message<C::Value>>,
        report: &mut AcknowledgeReport<C::Value>,
    ) -> Result<(), QueueError> {
        let service = self.connection.service();
        let max_size = self.connection.limits().max_message_size;

        // Positions are unique within a chunk, which is all the service requires
        let entries: Vec<DeleteEntry> = chunk
            .iter()
            .enumerate()
            .map(|(index, message)| DeleteEntry {
                id: index.to_string(),
                receipt_handle: message.receipt_handle.clone(),
            })
            .collect();

        debug!(queue_url = %queue, entries = entries.len(), "Acknowledging message batch");

        let outcomes = service
            .delete_batch(queue, &entries)
            .await
            .map_err(|e| {
                classify(
                    CallContext::new(Operation::AcknowledgeBatch, queue, max_size),
                    e,
                )
            })?;

        let mut outcomes: HashMap<String, BatchEntryOutcome> = outcomes
            .into_iter()
            .map(|outcome| (outcome.id().to_string(), outcome))
            .collect();

        for (index, message) in chunk.into_iter().enumerate() {
            let context = CallContext::new(Operation::AcknowledgeBatch, queue, max_size)
                .with_receipt(&message.receipt_handle);

            let error = match outcomes.remove(&index.to_string()) {
                Some(BatchEntryOutcome::Succeeded { .. }) => None,
                Some(BatchEntryOutcome::Failed {
                    code,
                    message: text,
                    sender_fault,
                    ..
                }) => Some(classify_entry(
                    context,
                    service.provider_type(),
                    &code,
                    &text,
                    sender_fault,
                )),
                None => Some(QueueError::Unclassified(ServiceError::Protocol {
                    provider: service.provider_type(),
                    message: format!(
                        "no result reported for receipt handle {}",
                        message.receipt_handle
                    ),
                })),
            };

            match error {
                None => report.acknowledged.push(message),
                Some(error) => {
                    warn!(
                        queue_url = %queue,
                        receipt_handle = %message.receipt_handle,
                        error = %error,
                        "Message was not acknowledged"
                    );
                    report.failed.push(FailedAcknowledgement { message, error });
                }
            }
        }

        Ok(())
    }

    /// Run `work` on a message and acknowledge the message afterwards, whatever
    /// the outcome
    ///
    /// The message is acknowledged when `work` succeeds, when it returns an
    /// error and when it panics. After a panic the acknowledgement is attempted
    /// and the panic then resumes. **A message whose processing failed is
    /// removed from the queue and will not be redelivered**; use
    /// [`Receiver::acknowledge`] after successful work when failed messages
    /// must be retried.
    ///
    /// # Errors
    ///
    /// - [`ScopedAckError::Work`] with the work's error. If the acknowledgement
    ///   failed as well, that failure is logged.
    /// - [`ScopedAckError::Acknowledge`] if the work succeeded but the message
    ///   could not be acknowledged
    pub async fn with_acknowledgement<F, Fut, T, E>(
        &self,
        message: Message<C::Value>,
        work: F,
    ) -> Result<T, ScopedAckError<E>>
    where
        F: FnOnce(Message<C::Value>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let queue = self
            .connection
            .queue_url()
            .map_err(ScopedAckError::Acknowledge)?;
        let receipt = message.receipt_handle.clone();

        let outcome = AssertUnwindSafe(async move { work(message).await })
            .catch_unwind()
            .await;
        let acknowledged = self.delete_receipt(queue, &receipt).await;

        match outcome {
            Ok(Ok(value)) => acknowledged
                .map(|()| value)
                .map_err(ScopedAckError::Acknowledge),
            Ok(Err(work_error)) => {
                if let Err(ack_error) = acknowledged {
                    warn!(
                        queue_url = %queue,
                        receipt_handle = %receipt,
                        error = %ack_error,
                        "Work failed and the message could not be acknowledged"
                    );
                }
                Err(ScopedAckError::Work(work_error))
            }
            Err(panic) => {
                if let Err(ack_error) = acknowledged {
                    error!(
                        queue_url = %queue,
                        receipt_handle = %receipt,
                        error = %ack_error,
                        "Work panicked and the message could not be acknowledged"
                    );
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

impl<C: Codec> fmt::Debug for Receiver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("connection", &self.connection)
            .field("timeout", &self.timeout)
            .field("batch_size", &self.batch_size)
            .field("poll_pause", &self.poll_pause)
            .field("max_wait_time_seconds", &self.max_wait_time_seconds)
            .finish()
    }
}

struct IterationState {
    /// Started lazily when a round begins; cleared after every delivery
    timer: Option<Timer>,
    pending: VecDeque<RawMessage>,
    finished: bool,
}

/// Outcome of [`Receiver::acknowledge_many`]
#[derive(Debug)]
pub struct AcknowledgeReport<V> {
    /// Messages deleted from the queue, in input order
    pub acknowledged: Vec<Message<V>>,
    /// Messages the service refused to delete, in input order
    pub failed: Vec<FailedAcknowledgement<V>>,
}

impl<V> AcknowledgeReport<V> {
    /// Check if every message was acknowledged
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<V> Default for AcknowledgeReport<V> {
    fn default() -> Self {
        Self {
            acknowledged: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// A message the service refused to delete
#[derive(Debug)]
pub struct FailedAcknowledgement<V> {
    pub message: Message<V>,
    pub error: QueueError,
}
