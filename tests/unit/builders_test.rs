//! Tests for building pools and registries from configuration

use std::collections::HashMap;

use async_trait::async_trait;
use prometheus_pooling::builders::{build_pool, build_registry};
use prometheus_pooling::config::{PoolConfig, QueueConfig, SchedulerConfig};
use prometheus_pooling::core::{
    processor_fn, AppResult, Feedback, PoolError, QueueError, ResourceFactory,
};
use prometheus_pooling::runtime::TokioSpawner;

struct NumberFactory;

#[async_trait]
impl ResourceFactory for NumberFactory {
    type Resource = u32;

    async fn create(&self) -> AppResult<u32> {
        Ok(7)
    }

    async fn destroy(&self, _resource: u32) {}
}

fn scheduler_config() -> SchedulerConfig {
    let mut queues = HashMap::new();
    queues.insert("fast".to_string(), QueueConfig::new().with_concurrency(4));
    queues.insert("slow".to_string(), QueueConfig::default());
    SchedulerConfig {
        pool: PoolConfig::new().with_min_size(1).with_max_size(2),
        queues,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_build_pool_from_config() {
    let cfg = scheduler_config();
    let pool = build_pool(
        &cfg.pool,
        NumberFactory,
        TokioSpawner::new(tokio::runtime::Handle::current()),
    )
    .unwrap();

    assert_eq!(*pool.acquire().await.unwrap(), 7);
    assert_eq!(pool.status().max, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_build_pool_rejects_invalid_config() {
    let result = build_pool(
        &PoolConfig::new().with_max_size(0),
        NumberFactory,
        TokioSpawner::new(tokio::runtime::Handle::current()),
    );
    assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_build_registry_from_config() {
    let cfg = scheduler_config();
    let mut seen = Vec::new();
    let registry = build_registry(
        &cfg,
        |name, queue_cfg| {
            seen.push((name.to_string(), queue_cfg.concurrency));
            Ok(processor_fn(|n: u32, _feedback: Feedback<()>| async move {
                Ok::<_, anyhow::Error>(n + 1)
            }))
        },
        TokioSpawner::new(tokio::runtime::Handle::current()),
    )
    .unwrap();

    assert_eq!(seen, vec![("fast".to_string(), 4), ("slow".to_string(), 1)]);
    assert_eq!(registry.queues(), vec!["fast", "slow"]);
    assert_eq!(registry.status("fast").unwrap().concurrency, 4);
    assert_eq!(registry.perform("slow", 1).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_build_registry_propagates_factory_error() {
    let cfg = scheduler_config();
    let result = build_registry(
        &cfg,
        |name, _queue_cfg| -> Result<_, QueueError> {
            if name == "slow" {
                return Err(QueueError::InvalidConfig("no processor for slow".into()));
            }
            Ok(processor_fn(|n: u32, _feedback: Feedback<()>| async move {
                Ok::<_, anyhow::Error>(n)
            }))
        },
        TokioSpawner::new(tokio::runtime::Handle::current()),
    );
    assert!(matches!(result, Err(QueueError::InvalidConfig(_))));
}
