//! # Prometheus Pooling
//!
//! Two async concurrency primitives built on tokio:
//!
//! - [`ResourcePool`](core::ResourcePool): a sized pool of expensive resources
//!   (connections, sessions, handles) with eager fill to a minimum, on-demand
//!   growth to a maximum, idle eviction and timeout-bounded, FIFO-fair
//!   acquisition.
//! - [`QueueRegistry`](core::QueueRegistry): named task queues, each running at
//!   most `concurrency` tasks at once with a FIFO backlog and a
//!   running / draining / stopped lifecycle.
//!
//! ## ResourcePool
//!
//! ```rust,ignore
//! use prometheus_pooling::config::PoolConfig;
//! use prometheus_pooling::core::ResourcePool;
//! use prometheus_pooling::runtime::TokioSpawner;
//! use std::time::Duration;
//!
//! let pool = ResourcePool::new(
//!     PoolConfig::new()
//!         .with_min_size(2)
//!         .with_max_size(10)
//!         .with_acquire_timeout(Duration::from_millis(500)),
//!     PgFactory::new(url),
//!     TokioSpawner::new(tokio::runtime::Handle::current()),
//! )?;
//! pool.initialize().await?;
//!
//! let conn = pool.acquire().await?;
//! // ... use the connection; dropping it returns it to the pool
//! ```
//!
//! ## QueueRegistry
//!
//! ```rust,ignore
//! use prometheus_pooling::config::QueueConfig;
//! use prometheus_pooling::core::{processor_fn, Feedback, QueueRegistry};
//!
//! let registry = QueueRegistry::new(spawner);
//! registry.queue(
//!     "emails",
//!     QueueConfig::new().with_concurrency(4),
//!     processor_fn(|msg: Email, progress: Feedback<u8>| async move {
//!         progress.send(50);
//!         send(msg).await
//!     }),
//! )?;
//!
//! let mut handle = registry.perform_now("emails", email)?;
//! while let Some(percent) = handle.next_feedback().await { /* ... */ }
//! ```
//!
//! Both primitives log through `tracing`; call
//! [`util::init_tracing`] or install your own subscriber.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core pooling and queueing primitives.
pub mod core;
/// Configuration models for pools and queues.
pub mod config;
/// Builders to construct pools and registries from configuration.
pub mod builders;
/// Runtime adapters and monitoring surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
