//! Tests for event sinks attached to pools and registries

use async_trait::async_trait;
use prometheus_pooling::config::{PoolConfig, QueueConfig};
use prometheus_pooling::core::{
    channel_sink, processor_fn, AppResult, EventSink, Feedback, PoolEvent, QueueEvent,
    QueueRegistry, ResourceFactory, ResourcePool,
};
use prometheus_pooling::runtime::TokioSpawner;

struct Token;

#[async_trait]
impl ResourceFactory for Token {
    type Resource = u8;

    async fn create(&self) -> AppResult<u8> {
        Ok(1)
    }

    async fn destroy(&self, _resource: u8) {}
}

/// Sink counting events without storing them.
struct Counter(std::sync::Arc<std::sync::atomic::AtomicUsize>);

impl<E> EventSink<E> for Counter {
    fn record(&mut self, _event: E) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_events_reach_every_sink() {
    let (sink, mut rx) = channel_sink();
    let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let pool = ResourcePool::new(
        PoolConfig::new().with_min_size(1).with_max_size(1),
        Token,
        TokioSpawner::try_current().unwrap(),
    )
    .unwrap()
    .with_event_sink(sink);
    pool.subscribe(Counter(count.clone()));

    pool.initialize().await.unwrap();

    assert_eq!(rx.recv().await, Some(PoolEvent::Initialized));
    assert_eq!(
        rx.recv().await,
        Some(PoolEvent::MinAllocated { allocated: 1 })
    );
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queue_completion_event_carries_task_id() {
    let (sink, mut rx) = channel_sink();
    let registry = QueueRegistry::new(TokioSpawner::try_current().unwrap()).with_event_sink(sink);
    registry
        .queue(
            "echo",
            QueueConfig::default(),
            processor_fn(|s: String, _feedback: Feedback<()>| async move {
                Ok::<_, anyhow::Error>(s)
            }),
        )
        .unwrap();

    let handle = registry.perform_now("echo", "hi".to_string()).unwrap();
    let id = handle.id();
    assert_eq!(handle.outcome().await.unwrap(), "hi");

    assert_eq!(
        rx.recv().await,
        Some(QueueEvent::Completed {
            queue: "echo".into(),
            task_id: id
        })
    );
}
