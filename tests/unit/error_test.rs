//! Tests for error rendering and sources

use std::error::Error as _;
use std::time::Duration;

use prometheus_pooling::core::{PoolError, QueueError};

#[test]
fn test_pool_error_display() {
    let err = PoolError::AcquireTimeout(Duration::from_millis(250));
    assert_eq!(
        err.to_string(),
        "acquire timed out after 250ms; check pool status for details"
    );
    assert_eq!(PoolError::PoolClosed.to_string(), "pool is closed");
}

#[test]
fn test_pool_error_keeps_source() {
    let err = PoolError::ResourceCreateFailed(anyhow::anyhow!("connection refused"));
    assert_eq!(err.to_string(), "resource creation failed: connection refused");
    assert_eq!(err.source().unwrap().to_string(), "connection refused");
}

#[test]
fn test_queue_error_display() {
    assert_eq!(
        QueueError::QueueNotFound("emails".into()).to_string(),
        "could not find queue with name: emails"
    );
    let busy = QueueError::QueueBusy {
        name: "emails".into(),
        in_flight: 2,
        pending: 5,
    };
    assert!(busy.to_string().contains("in flight: 2, pending: 5"));
}

#[test]
fn test_queue_error_into_anyhow() {
    let err: anyhow::Error = QueueError::TaskDropped.into();
    assert!(err.downcast_ref::<QueueError>().is_some());
}
