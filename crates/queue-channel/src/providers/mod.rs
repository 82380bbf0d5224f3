//! Queue service implementations.
//!
//! This module contains concrete implementations of the
//! [`QueueService`](crate::service::QueueService) trait for different backends.

pub mod memory;
pub mod sqs;

pub use memory::InMemoryService;
pub use sqs::SqsService;
