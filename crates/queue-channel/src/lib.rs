//! # Queue Channel
//!
//! Typed, timeout-aware client channels over an at-least-once message queue
//! such as Amazon SQS.
//!
//! This library provides:
//! - A [`Sender`] that encodes values and submits them singly or in batches
//! - A [`Receiver`] that long-polls within a [`TimeoutPolicy`] budget, streams
//!   messages lazily and acknowledges them
//! - Classification of backend failures into a small domain error taxonomy
//! - An SQS provider over HTTPS and an SQS-compatible in-memory emulator
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`classify`] - Mapping of backend failures onto [`QueueError`]
//! - [`timeout`] - Timeout policies, timers and long-poll wait computation
//! - [`message`] - Message structures and receipt handles
//! - [`codec`] - Value to wire body conversion
//! - [`service`] - The backend call shape and its providers in [`providers`]
//! - [`sender`] / [`receiver`] - The typed channel ends
//! - [`config`] / [`telemetry`] - Configuration loading and logging setup
//!
//! ## Example
//!
//! ```no_run
//! use queue_channel::providers::InMemoryService;
//! use queue_channel::{QueueConnection, Receiver, Sender, StringCodec};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = InMemoryService::default();
//! let queue = service.create_queue("commands")?;
//! let connection = QueueConnection::new(Arc::new(service), queue);
//!
//! let sender = Sender::new(connection.clone(), StringCodec);
//! sender.send("JUMP".to_string()).await?;
//!
//! let receiver = Receiver::new(connection, StringCodec).with_timeout(Duration::from_secs(5));
//! let message = receiver.receive().await?;
//! receiver.acknowledge(message).await?;
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod classify;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;
pub mod receiver;
pub mod sender;
pub mod service;
pub mod telemetry;
pub mod timeout;

// Re-export commonly used types at crate root for convenience
pub use codec::{Codec, FromStrCodec, JsonCodec, StringCodec};
pub use config::{ChannelConfig, LoggingConfig, Settings};
pub use connection::QueueConnection;
pub use error::{
    ConfigurationError, QueueError, ScopedAckError, SerializationError, ServiceError,
    ValidationError,
};
pub use message::{Message, MessageId, QueueUrl, ReceiptHandle, SentMessage, Timestamp};
pub use provider::{InMemoryConfig, ProviderType, ServiceLimits, SqsConfig};
pub use receiver::{AcknowledgeReport, FailedAcknowledgement, Receiver};
pub use sender::{FailedEntry, SendManyReport, Sender};
pub use service::{PollOutcome, QueueService};
pub use timeout::{TimeoutPolicy, Timer};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
