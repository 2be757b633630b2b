//! Core pooling and queueing primitives.

pub mod error;
pub mod events;
pub mod executor;
pub mod resource_pool;
pub mod task_queue;

pub use error::{AppResult, PoolError, QueueError};
pub use events::{
    channel_sink, ChannelEventSink, EventSink, InMemoryEventSink, PoolEvent, QueueEvent,
};
pub use executor::{processor_fn, FnProcessor, ResourceExecutor, ResourceFactory, TaskProcessor};
pub use resource_pool::{PoolStatus, Pooled, ResourcePool, Spawn};
pub use task_queue::{
    Feedback, Lifecycle, QueueRegistry, QueueStatus, StopSignal, TaskHandle, TaskId,
};
