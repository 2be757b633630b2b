//! Tests for utility functions

use prometheus_pooling::util::init_tracing;

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    // A second call must not panic on the already installed subscriber.
    init_tracing();
    tracing::info!(target: "prometheus_pooling", "tracing initialized");
}
