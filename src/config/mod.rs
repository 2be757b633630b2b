//! Configuration models for pools and queues.

pub mod pool;

pub use pool::{PoolConfig, QueueConfig, SchedulerConfig};
