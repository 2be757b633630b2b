//! Error types for pool and queue operations.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by [`ResourcePool`](crate::core::ResourcePool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The resource factory failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreateFailed(#[source] anyhow::Error),
    /// No resource became available before the acquire timeout elapsed.
    #[error("acquire timed out after {0:?}; check pool status for details")]
    AcquireTimeout(Duration),
    /// The pool has been closed and no longer hands out resources.
    #[error("pool is closed")]
    PoolClosed,
    /// Pool configuration failed validation.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
    /// A `ResourceExecutor` run through the pool returned an error.
    #[error("execution failed: {0}")]
    ExecutionFailed(#[source] anyhow::Error),
}

/// Errors produced by [`QueueRegistry`](crate::core::QueueRegistry).
#[derive(Debug, Error)]
pub enum QueueError {
    /// No queue is registered under the given name.
    #[error("could not find queue with name: {0}")]
    QueueNotFound(String),
    /// The processing function reported an error for this task.
    #[error("task processing failed: {0}")]
    TaskProcessingFailed(#[source] anyhow::Error),
    /// Re-registration refused while the existing queue still has work.
    #[error("queue `{name}` has outstanding work (in flight: {in_flight}, pending: {pending})")]
    QueueBusy {
        /// Queue name.
        name: String,
        /// Tasks currently running.
        in_flight: usize,
        /// Tasks waiting in the backlog.
        pending: usize,
    },
    /// Queue configuration failed validation.
    #[error("invalid queue configuration: {0}")]
    InvalidConfig(String),
    /// The task was discarded before it produced an outcome.
    #[error("task dropped before completion")]
    TaskDropped,
}

/// Application-facing result using anyhow for collaborator code.
pub type AppResult<T> = Result<T, anyhow::Error>;
