//! Tests for backend error classification.

use super::*;

fn queue() -> QueueUrl {
    QueueUrl::new("https://sqs.us-east-1.amazonaws.com/123456789012/orders".to_string()).unwrap()
}

fn sqs_error(code: &str, message: &str) -> ServiceError {
    ServiceError::api(ProviderType::AwsSqs, code, message, 400)
}

// ============================================================================
// Queue Not Found
// ============================================================================

mod queue_not_found {
    use super::*;

    /// Verify that every known missing-queue code maps to QueueNotFound for every operation.
    #[test]
    fn test_missing_queue_codes_for_all_operations() {
        let queue = queue();
        let operations = [
            Operation::Send,
            Operation::SendBatch,
            Operation::Receive,
            Operation::Acknowledge,
            Operation::AcknowledgeBatch,
        ];

        for code in QUEUE_MISSING_CODES {
            for operation in operations {
                let context = CallContext::new(operation, &queue, 1024);
                let error = classify(context, sqs_error(code, "The specified queue does not exist"));

                match error {
                    QueueError::QueueNotFound { queue_url } => {
                        assert_eq!(queue_url, queue.as_str())
                    }
                    other => panic!("{} during {:?} gave {:?}", code, operation, other),
                }
            }
        }
    }
}

// ============================================================================
// Message Not Found
// ============================================================================

mod message_not_found {
    use super::*;

    /// Verify that a rejected handle is reported with the handle that was used.
    #[test]
    fn test_invalid_receipt_reports_handle() {
        let queue = queue();
        let receipt = ReceiptHandle::new("not-a-real-handle");
        let context = CallContext::new(Operation::Acknowledge, &queue, 1024).with_receipt(&receipt);

        let error = classify(context, sqs_error("ReceiptHandleIsInvalid", "invalid"));

        match error {
            QueueError::MessageNotFound { receipt } => assert_eq!(receipt, "not-a-real-handle"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_receipt_without_handle_uses_service_message() {
        let queue = queue();
        let context = CallContext::new(Operation::AcknowledgeBatch, &queue, 1024);

        let error = classify(context, sqs_error("InvalidReceiptHandle", "handle xyz expired"));

        match error {
            QueueError::MessageNotFound { receipt } => assert_eq!(receipt, "handle xyz expired"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    /// Verify that handle codes are only meaningful for acknowledgements.
    #[test]
    fn test_invalid_receipt_outside_acknowledge_is_unclassified() {
        let queue = queue();
        let context = CallContext::new(Operation::Receive, &queue, 1024);

        let error = classify(context, sqs_error("ReceiptHandleIsInvalid", "invalid"));

        assert!(matches!(error, QueueError::Unclassified(_)));
    }
}

// ============================================================================
// Message Too Large
// ============================================================================

mod message_too_large {
    use super::*;

    #[test]
    fn test_body_too_long_on_send() {
        let queue = queue();
        let context = CallContext::new(Operation::Send, &queue, 262_144);

        let error = classify(
            context,
            sqs_error(
                "InvalidParameterValue",
                "One or more parameters are invalid. Reason: Message must be shorter than 262144 bytes.",
            ),
        );

        match error {
            QueueError::MessageTooLarge { size, max_size } => {
                assert_eq!(max_size, 262_144);
                assert_eq!(size, None);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_batch_too_long_on_batch_send() {
        let queue = queue();
        let context = CallContext::new(Operation::SendBatch, &queue, 262_144);

        for code in BATCH_TOO_LONG_CODES {
            let error = classify(context, sqs_error(code, "Batch requests cannot be longer"));
            assert!(matches!(error, QueueError::MessageTooLarge { .. }), "{}", code);
        }
    }

    /// Verify that an unrelated invalid parameter is passed through untouched.
    #[test]
    fn test_other_invalid_parameter_is_unclassified() {
        let queue = queue();
        let context = CallContext::new(Operation::Send, &queue, 262_144);

        let error = classify(
            context,
            sqs_error("InvalidParameterValue", "Value -1 for parameter DelaySeconds is invalid."),
        );

        match error {
            QueueError::Unclassified(inner) => {
                assert_eq!(inner.code(), Some("InvalidParameterValue"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

// ============================================================================
// Pass-Through
// ============================================================================

mod passthrough {
    use super::*;

    /// Verify that unknown errors propagate unchanged.
    #[test]
    fn test_unknown_code_is_passed_through() {
        let queue = queue();
        let context = CallContext::new(Operation::Send, &queue, 1024);
        let original = ServiceError::api(ProviderType::AwsSqs, "AccessDenied", "no access", 403);

        let error = classify(context, original.clone());

        match error {
            QueueError::Unclassified(inner) => {
                assert_eq!(inner.code(), Some("AccessDenied"));
                assert_eq!(inner.message(), "no access");
                assert_eq!(inner.to_string(), original.to_string());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_transport_errors_are_passed_through() {
        let queue = queue();
        let context = CallContext::new(Operation::Receive, &queue, 1024);
        let error = classify(
            context,
            ServiceError::Transport {
                provider: ProviderType::AwsSqs,
                message: "Connection failed".to_string(),
            },
        );

        assert!(matches!(
            error,
            QueueError::Unclassified(ServiceError::Transport { .. })
        ));
    }

    /// Verify that an unrecognised batch entry failure keeps its code and fault side.
    #[test]
    fn test_unknown_entry_failure_keeps_fault_side() {
        let queue = queue();
        let context = CallContext::new(Operation::SendBatch, &queue, 1024);

        let sender_side = classify_entry(
            context,
            ProviderType::AwsSqs,
            "InvalidMessageContents",
            "bad characters",
            true,
        );
        match sender_side {
            QueueError::Unclassified(ServiceError::Api { code, status, .. }) => {
                assert_eq!(code, "InvalidMessageContents");
                assert_eq!(status, 400);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let service_side =
            classify_entry(context, ProviderType::AwsSqs, "InternalError", "try again", false);
        assert!(service_side.is_transient());
    }

    #[test]
    fn test_known_entry_failure_is_classified() {
        let queue = queue();
        let receipt = ReceiptHandle::new("gone");
        let context =
            CallContext::new(Operation::AcknowledgeBatch, &queue, 1024).with_receipt(&receipt);

        let error = classify_entry(
            context,
            ProviderType::InMemory,
            "ReceiptHandleIsInvalid",
            "invalid",
            true,
        );

        assert!(matches!(error, QueueError::MessageNotFound { receipt } if receipt == "gone"));
    }
}
