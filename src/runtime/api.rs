//! Monitoring-facing status models.

use serde::{Deserialize, Serialize};

use crate::core::{PoolStatus, QueueRegistry, QueueStatus, ResourceFactory, ResourcePool, Spawn};

/// Serializable snapshot of a pool and the queues of a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Pool occupancy, if a pool was included.
    pub pool: Option<PoolStatus>,
    /// Every registered queue, sorted by name.
    pub queues: Vec<QueueStatus>,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Optional reason when unhealthy.
    pub reason: Option<String>,
}

/// Collect a status report from an optional pool and a registry.
pub fn status_report<RF, PS, D, R, QS, F>(
    pool: Option<&ResourcePool<RF, PS>>,
    registry: &QueueRegistry<D, R, QS, F>,
) -> StatusReport
where
    RF: ResourceFactory,
    PS: Spawn,
    D: Send + 'static,
    R: Send + 'static,
    QS: Spawn,
    F: Send + 'static,
{
    StatusReport {
        pool: pool.map(ResourcePool::status),
        queues: registry.statuses(),
    }
}

/// Health of a pool: unhealthy when callers are waiting and nothing is idle
/// or being freed up, i.e. the pool is saturated at its ceiling.
#[must_use]
pub fn pool_health(status: &PoolStatus) -> Health {
    if status.waiting > 0 && status.idle == 0 && status.allocated >= status.max {
        return Health {
            ok: false,
            reason: Some(format!(
                "pool saturated: {} waiting with {}/{} allocated",
                status.waiting, status.allocated, status.max
            )),
        };
    }
    Health {
        ok: true,
        reason: None,
    }
}
