//! Builders to construct a resource pool and a queue registry from configuration.

use crate::config::{PoolConfig, QueueConfig, SchedulerConfig};
use crate::core::{
    PoolError, QueueError, QueueRegistry, ResourceFactory, ResourcePool, Spawn, TaskProcessor,
};

/// Build a resource pool from its configuration. The pool is not initialized.
///
/// # Errors
///
/// Returns `PoolError::InvalidConfig` if the configuration is invalid.
pub fn build_pool<RF, S>(
    cfg: &PoolConfig,
    factory: RF,
    spawner: S,
) -> Result<ResourcePool<RF, S>, PoolError>
where
    RF: ResourceFactory,
    S: Spawn,
{
    ResourcePool::new(cfg.clone(), factory, spawner)
}

/// Build a registry with one queue per entry of `cfg.queues`, asking
/// `processor_factory` for each queue's processor.
///
/// # Errors
///
/// - `QueueError::InvalidConfig` if the scheduler configuration is invalid
/// - any error returned by `processor_factory`
pub fn build_registry<D, R, F, S, P, FP>(
    cfg: &SchedulerConfig,
    mut processor_factory: FP,
    spawner: S,
) -> Result<QueueRegistry<D, R, S, F>, QueueError>
where
    D: Send + 'static,
    R: Send + 'static,
    F: Send + 'static,
    S: Spawn,
    P: TaskProcessor<D, R, F>,
    FP: FnMut(&str, &QueueConfig) -> Result<P, QueueError>,
{
    cfg.validate()
        .map_err(|e| QueueError::InvalidConfig(format!("config invalid: {e}")))?;

    let registry = QueueRegistry::new(spawner);
    let mut names: Vec<_> = cfg.queues.keys().collect();
    names.sort();
    for name in names {
        let queue_cfg = &cfg.queues[name];
        let processor = processor_factory(name, queue_cfg)?;
        registry.queue(name.clone(), queue_cfg.clone(), processor)?;
    }
    Ok(registry)
}
