//! Shared connection state held by both senders and receivers.

use crate::error::QueueError;
use crate::message::QueueUrl;
use crate::provider::ServiceLimits;
use crate::service::QueueService;
use std::fmt;
use std::sync::Arc;

/// A queue service plus the queue a channel talks to
///
/// Cheap to clone; clones share the underlying service client.
#[derive(Clone)]
pub struct QueueConnection {
    service: Arc<dyn QueueService>,
    queue_url: Option<QueueUrl>,
}

impl QueueConnection {
    /// Create a connection to a specific queue
    pub fn new(service: Arc<dyn QueueService>, queue_url: QueueUrl) -> Self {
        Self {
            service,
            queue_url: Some(queue_url),
        }
    }

    /// Create a connection whose queue is not known yet
    ///
    /// Every queue operation fails with [`QueueError::QueueNotConfigured`]
    /// until a URL is supplied through [`QueueConnection::with_queue_url`].
    pub fn unconfigured(service: Arc<dyn QueueService>) -> Self {
        Self {
            service,
            queue_url: None,
        }
    }

    /// Point the connection at a queue
    pub fn with_queue_url(mut self, queue_url: QueueUrl) -> Self {
        self.queue_url = Some(queue_url);
        self
    }

    /// Queue this connection targets
    pub fn queue_url(&self) -> Result<&QueueUrl, QueueError> {
        self.queue_url.as_ref().ok_or(QueueError::QueueNotConfigured)
    }

    /// Underlying queue service
    pub fn service(&self) -> &dyn QueueService {
        self.service.as_ref()
    }

    /// Per-call limits of the underlying service
    pub fn limits(&self) -> ServiceLimits {
        self.service.limits()
    }
}

impl fmt::Debug for QueueConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueConnection")
            .field("provider", &self.service.provider_type())
            .field("queue_url", &self.queue_url)
            .finish()
    }
}
