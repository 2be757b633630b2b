//! Tests for configuration validation and parsing

use std::time::Duration;

use prometheus_pooling::config::{PoolConfig, QueueConfig, SchedulerConfig};

#[test]
fn test_pool_config_defaults() {
    let cfg = PoolConfig::default();
    assert_eq!(cfg.min_size, 8);
    assert_eq!(cfg.max_size, 20);
    assert_eq!(cfg.idle_timeout(), Duration::from_secs(15));
    assert_eq!(cfg.acquire_timeout(), Duration::from_secs(2));
    assert_eq!(cfg.reap_interval(), Duration::from_secs(1));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_max_size() {
    let cfg = PoolConfig::new().with_min_size(0).with_max_size(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_pool_config_min_above_max() {
    let err = PoolConfig::new()
        .with_min_size(4)
        .with_max_size(3)
        .validate()
        .unwrap_err();
    assert!(err.contains("min_size"));
}

#[test]
fn test_pool_config_invalid_acquire_timeout() {
    let cfg = PoolConfig::new().with_acquire_timeout(Duration::ZERO);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_pool_config_invalid_idle_timeout() {
    let err = PoolConfig::new()
        .with_idle_timeout(Duration::ZERO)
        .validate()
        .unwrap_err();
    assert!(err.contains("idle_timeout_ms"));
}

#[test]
fn test_queue_config_validation() {
    assert_eq!(QueueConfig::default().concurrency, 1);
    assert!(QueueConfig::new().with_concurrency(0).validate().is_err());
    assert!(QueueConfig::new().with_concurrency(4).validate().is_ok());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "pool": { "min_size": 1, "max_size": 4, "acquire_timeout_ms": 500 },
        "queues": {
            "emails": { "concurrency": 2 },
            "reports": {}
        }
    }"#;

    let cfg = SchedulerConfig::from_json_str(json).unwrap();

    assert_eq!(cfg.pool.max_size, 4);
    assert_eq!(cfg.pool.acquire_timeout_ms, 500);
    // Unset fields fall back to defaults.
    assert_eq!(cfg.pool.idle_timeout_ms, 15_000);
    assert_eq!(cfg.queues["emails"].concurrency, 2);
    assert_eq!(cfg.queues["reports"].concurrency, 1);
}

#[test]
fn test_scheduler_config_rejects_invalid_queue() {
    let json = r#"{ "queues": { "broken": { "concurrency": 0 } } }"#;
    let err = SchedulerConfig::from_json_str(json).unwrap_err();
    assert!(err.contains("broken"));
}

#[test]
fn test_scheduler_config_parse_error() {
    let err = SchedulerConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}
