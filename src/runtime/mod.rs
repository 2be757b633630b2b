//! Runtime adapters and monitoring surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{pool_health, status_report, Health, StatusReport};
pub use tokio_spawner::TokioSpawner;
