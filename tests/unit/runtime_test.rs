//! Tests for the tokio spawner and the status surface

use async_trait::async_trait;
use prometheus_pooling::config::{PoolConfig, QueueConfig};
use prometheus_pooling::core::{
    processor_fn, AppResult, Feedback, Lifecycle, PoolStatus, QueueRegistry, ResourceFactory,
    ResourcePool, Spawn,
};
use prometheus_pooling::runtime::{pool_health, status_report, TokioSpawner};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_try_current_outside_runtime() {
    assert!(TokioSpawner::try_current().is_err());
}

struct Unit;

#[async_trait]
impl ResourceFactory for Unit {
    type Resource = ();

    async fn create(&self) -> AppResult<()> {
        Ok(())
    }

    async fn destroy(&self, _resource: ()) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_report_serializes() {
    let spawner = TokioSpawner::try_current().unwrap();
    let pool = ResourcePool::new(
        PoolConfig::new().with_min_size(1).with_max_size(2),
        Unit,
        spawner.clone(),
    )
    .unwrap();
    pool.initialize().await.unwrap();
    let registry = QueueRegistry::new(spawner);
    registry
        .queue(
            "b",
            QueueConfig::default(),
            processor_fn(|(): (), _feedback: Feedback<()>| async move { Ok::<_, anyhow::Error>(()) }),
        )
        .unwrap();
    registry
        .queue(
            "a",
            QueueConfig::default(),
            processor_fn(|(): (), _feedback: Feedback<()>| async move { Ok::<_, anyhow::Error>(()) }),
        )
        .unwrap();
    registry.stop("b").unwrap();

    let report = status_report(Some(&pool), &registry);

    assert_eq!(report.pool.unwrap().allocated, 1);
    let names: Vec<_> = report.queues.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(report.queues[1].lifecycle, Lifecycle::Stopped);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["pool"]["idle"], 1);
    assert_eq!(json["queues"][1]["lifecycle"], "stopped");
}

#[test]
fn test_pool_health_flags_saturation() {
    let mut status = PoolStatus {
        min: 0,
        max: 2,
        allocated: 2,
        idle: 0,
        scheduled: 2,
        waiting: 0,
    };
    assert!(pool_health(&status).ok);

    status.waiting = 3;
    let health = pool_health(&status);
    assert!(!health.ok);
    assert!(health.reason.unwrap().contains("3 waiting"));
}
