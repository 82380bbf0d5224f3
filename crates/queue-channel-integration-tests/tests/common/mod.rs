//! Common test utilities for queue-channel integration tests
//!
//! This module provides:
//! - An in-memory queue fixture with sender and receiver builders
//! - A typed command payload used across scenarios
//! - SQS XML response builders for the HTTP provider tests

use queue_channel::providers::InMemoryService;
use queue_channel::{
    InMemoryConfig, JsonCodec, QueueConnection, QueueUrl, Receiver, Sender, StringCodec,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Payloads
// ============================================================================

/// Movement command exchanged between the channel ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub action: String,
    pub steps: u32,
}

impl Command {
    pub fn new(action: &str, steps: u32) -> Self {
        Self {
            action: action.to_string(),
            steps,
        }
    }
}

// ============================================================================
// In-Memory Fixture
// ============================================================================

/// One emulated queue plus handles to build channel ends against it
#[allow(dead_code)]
pub struct QueueFixture {
    pub service: InMemoryService,
    pub queue: QueueUrl,
}

#[allow(dead_code)]
impl QueueFixture {
    pub fn new() -> Self {
        Self::with_visibility_timeout(Duration::from_secs(30))
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        let service = InMemoryService::new(InMemoryConfig {
            visibility_timeout,
            ..Default::default()
        });
        let queue = service
            .create_queue("integration")
            .expect("queue name is valid");
        Self { service, queue }
    }

    pub fn connection(&self) -> QueueConnection {
        QueueConnection::new(Arc::new(self.service.clone()), self.queue.clone())
    }

    pub fn string_sender(&self) -> Sender<StringCodec> {
        Sender::new(self.connection(), StringCodec)
    }

    pub fn string_receiver(&self) -> Receiver<StringCodec> {
        Receiver::new(self.connection(), StringCodec)
    }

    pub fn command_sender(&self) -> Sender<JsonCodec<Command>> {
        Sender::new(self.connection(), JsonCodec::new())
    }

    pub fn command_receiver(&self) -> Receiver<JsonCodec<Command>> {
        Receiver::new(self.connection(), JsonCodec::new())
    }

    pub fn len(&self) -> usize {
        self.service
            .approximate_len(&self.queue)
            .expect("fixture queue exists")
    }
}

// ============================================================================
// SQS Response Builders
// ============================================================================

#[allow(dead_code)]
pub fn send_message_response(message_id: &str) -> String {
    format!(
        r#"<SendMessageResponse xmlns="http://queue.amazonaws.com/doc/2012-11-05/">
  <SendMessageResult>
    <MD5OfMessageBody>fafb00f5732ab283681e124bf8747ed1</MD5OfMessageBody>
    <MessageId>{}</MessageId>
  </SendMessageResult>
  <ResponseMetadata>
    <RequestId>27daac76-34dd-47df-bd01-1f6e873584a0</RequestId>
  </ResponseMetadata>
</SendMessageResponse>"#,
        message_id
    )
}

/// `(message_id, receipt_handle, body, receive_count)` per message
#[allow(dead_code)]
pub fn receive_message_response(messages: &[(&str, &str, &str, u32)]) -> String {
    let mut xml = String::from(
        r#"<ReceiveMessageResponse xmlns="http://queue.amazonaws.com/doc/2012-11-05/">
  <ReceiveMessageResult>"#,
    );
    for (message_id, receipt_handle, body, receive_count) in messages {
        xml.push_str(&format!(
            r#"
    <Message>
      <MessageId>{}</MessageId>
      <ReceiptHandle>{}</ReceiptHandle>
      <Body>{}</Body>
      <Attribute>
        <Name>ApproximateReceiveCount</Name>
        <Value>{}</Value>
      </Attribute>
    </Message>"#,
            message_id, receipt_handle, body, receive_count
        ));
    }
    xml.push_str(
        r#"
  </ReceiveMessageResult>
  <ResponseMetadata>
    <RequestId>b6633655-283d-45b4-aee4-4e84e0ae6afa</RequestId>
  </ResponseMetadata>
</ReceiveMessageResponse>"#,
    );
    xml
}

#[allow(dead_code)]
pub fn error_response(code: &str, message: &str) -> String {
    format!(
        r#"<ErrorResponse>
  <Error>
    <Type>Sender</Type>
    <Code>{}</Code>
    <Message>{}</Message>
    <Detail/>
  </Error>
  <RequestId>42d59b56-7407-4c4a-be0f-4c88daeea257</RequestId>
</ErrorResponse>"#,
        code, message
    )
}
