//! Tests for the queue-channel library module.

use super::*;
use std::sync::Arc;
use std::time::Duration;

/// Verify that the crate-root re-exports are enough for a send/receive round trip.
#[tokio::test]
async fn test_root_exports_round_trip() {
    let service = providers::InMemoryService::default();
    let queue = service.create_queue("root-exports").unwrap();
    let connection = QueueConnection::new(Arc::new(service), queue);

    let sender = Sender::new(connection.clone(), StringCodec);
    let receiver =
        Receiver::new(connection, StringCodec).with_timeout(TimeoutPolicy::constant(Duration::ZERO));

    let sent = sender.send("hello".to_string()).await.unwrap();
    let received = receiver.receive().await.unwrap();

    assert_eq!(received.value, "hello");
    assert_eq!(received.message_id, Some(sent.message_id));
}

#[test]
fn test_queue_url_validation() {
    assert!(QueueUrl::new("memory://orders".to_string()).is_ok());
    assert!(QueueUrl::new(
        "https://sqs.us-east-1.amazonaws.com/123456789012/orders".to_string()
    )
    .is_ok());

    assert!(QueueUrl::new("".to_string()).is_err());
    assert!(QueueUrl::new("   ".to_string()).is_err());
    assert!(QueueUrl::new("memory://with space".to_string()).is_err());
}

#[test]
fn test_error_transience() {
    assert!(QueueError::ReceiveTimeout {
        queue_url: "memory://q".to_string(),
        elapsed: Duration::from_secs(2),
    }
    .is_transient());

    assert!(!QueueError::QueueNotFound {
        queue_url: "memory://q".to_string(),
    }
    .is_transient());
}
