//! Resource pool with eager/on-demand creation, idle eviction and
//! timeout-bounded acquisition.
//!
//! # Accounting
//!
//! `allocated` counts resources that were created successfully and not yet
//! destroyed; `idle` of them rest in the pool and the remaining `scheduled` are
//! checked out. Creations in progress are tracked separately and count against
//! `max_size`, so `allocated` never exceeds it. A failed creation never enters
//! the accounting.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_pooling::config::PoolConfig;
//! use prometheus_pooling::core::ResourcePool;
//! use prometheus_pooling::runtime::TokioSpawner;
//!
//! let pool = ResourcePool::new(
//!     PoolConfig::new().with_min_size(2).with_max_size(8),
//!     my_factory,
//!     TokioSpawner::new(tokio::runtime::Handle::current()),
//! )?;
//! pool.initialize().await?;
//!
//! let mut conn = pool.acquire().await?;
//! conn.ping().await?;
//! pool.release(conn);
//! ```

mod gate;
mod state;

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::core::events::EventBus;
use crate::core::{
    AppResult, EventSink, PoolError, PoolEvent, ResourceExecutor, ResourceFactory,
};

use self::state::PoolState;

/// Abstraction for spawning background work on a runtime.
pub trait Spawn: Send + Sync + 'static {
    /// Spawn a future that runs to completion independently of the caller.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Read-only snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Configured floor.
    pub min: usize,
    /// Configured ceiling.
    pub max: usize,
    /// Live resources, idle plus checked out.
    pub allocated: usize,
    /// Resources resting in the pool.
    pub idle: usize,
    /// Resources checked out, `allocated - idle`.
    pub scheduled: usize,
    /// Callers currently blocked in `acquire`.
    pub waiting: usize,
}

struct PoolInner<F: ResourceFactory, S: Spawn> {
    config: PoolConfig,
    factory: F,
    spawner: S,
    state: Mutex<PoolState<F::Resource>>,
    /// Signalled when a closed pool has no resources left.
    drained: Notify,
    events: EventBus<PoolEvent>,
}

/// Sized pool of reusable resources.
///
/// Cloning is cheap and yields another handle to the same pool.
pub struct ResourcePool<F: ResourceFactory, S: Spawn> {
    inner: Arc<PoolInner<F, S>>,
}

impl<F: ResourceFactory, S: Spawn> Clone for ResourcePool<F, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ResourceFactory, S: Spawn> fmt::Debug for ResourcePool<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// A checked-out resource.
///
/// Dereferences to the resource. Dropping it (or passing it to
/// [`ResourcePool::release`]) returns it to the pool it came from.
pub struct Pooled<F: ResourceFactory, S: Spawn> {
    resource: Option<F::Resource>,
    pool: Arc<PoolInner<F, S>>,
}

impl<F, S> fmt::Debug for Pooled<F, S>
where
    F: ResourceFactory,
    F::Resource: fmt::Debug,
    S: Spawn,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.resource).finish()
    }
}

impl<F: ResourceFactory, S: Spawn> Pooled<F, S> {
    fn take(mut self) -> (F::Resource, Arc<PoolInner<F, S>>) {
        let resource = self
            .resource
            .take()
            .expect("pooled resource is present until released");
        (resource, Arc::clone(&self.pool))
    }
}

impl<F: ResourceFactory, S: Spawn> Deref for Pooled<F, S> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        self.resource
            .as_ref()
            .expect("pooled resource is present until released")
    }
}

impl<F: ResourceFactory, S: Spawn> DerefMut for Pooled<F, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource
            .as_mut()
            .expect("pooled resource is present until released")
    }
}

impl<F: ResourceFactory, S: Spawn> Drop for Pooled<F, S> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.release_resource(resource);
        }
    }
}

impl<F: ResourceFactory, S: Spawn> ResourcePool<F, S> {
    /// Create a pool. No resource is created until [`initialize`](Self::initialize)
    /// or the first [`acquire`](Self::acquire).
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: PoolConfig, factory: F, spawner: S) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;
        let state = PoolState::new(config.max_size);
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                factory,
                spawner,
                state: Mutex::new(state),
                drained: Notify::new(),
                events: EventBus::new(),
            }),
        })
    }

    /// Attach an event sink.
    #[must_use]
    pub fn with_event_sink(self, sink: impl EventSink<PoolEvent> + 'static) -> Self {
        self.subscribe(sink);
        self
    }

    /// Subscribe an additional event sink.
    pub fn subscribe(&self, sink: impl EventSink<PoolEvent> + 'static) {
        self.inner.events.subscribe(Box::new(sink));
    }

    /// Pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Current occupancy snapshot.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.inner.state.lock().status(&self.inner.config)
    }

    /// One-time setup: emits `Initialized`, starts the idle reaper and fills the
    /// pool up to `min_size`, waiting for those creations to finish.
    ///
    /// Later calls return immediately.
    ///
    /// # Errors
    ///
    /// - `PoolError::PoolClosed` if the pool was closed before initialization
    /// - `PoolError::ResourceCreateFailed` with the first eager creation failure;
    ///   the pool stays usable and creates on demand
    pub async fn initialize(&self) -> Result<(), PoolError> {
        let done = self.start()?;
        let mut first_error = None;
        for outcome in join_all(done).await {
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(message)) => message,
                Err(_) => "creation task dropped".to_string(),
            };
            first_error.get_or_insert(failure);
        }
        match first_error {
            Some(message) => Err(PoolError::ResourceCreateFailed(anyhow::anyhow!(message))),
            None => Ok(()),
        }
    }

    /// Marks the pool initialized and schedules the eager creations without
    /// waiting for them. Returns one completion receiver per scheduled creation.
    fn start(&self) -> Result<Vec<oneshot::Receiver<Result<(), String>>>, PoolError> {
        let min_size = self.inner.config.min_size;
        let (eager, announce_min) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(PoolError::PoolClosed);
            }
            if state.initialized {
                return Ok(Vec::new());
            }
            state.initialized = true;
            let mut eager = 0;
            while state.allocated + state.creating < min_size
                && state.reserve_creation(self.inner.config.max_size)
            {
                eager += 1;
            }
            let announce_min = min_size == 0 && !state.min_announced;
            if announce_min {
                state.min_announced = true;
            }
            (eager, announce_min)
        };

        info!(
            min_size,
            max_size = self.inner.config.max_size,
            "resource pool initialized"
        );
        self.inner.events.emit(&PoolEvent::Initialized);
        if announce_min {
            self.inner
                .events
                .emit(&PoolEvent::MinAllocated { allocated: 0 });
        }
        self.spawn_reaper();

        Ok((0..eager).map(|_| self.inner.spawn_create()).collect())
    }

    /// Acquire a resource, waiting at most `acquire_timeout`.
    ///
    /// Hands out the longest-idle resource, otherwise waits in FIFO order while
    /// a new resource is created (below `max_size`) or another caller releases
    /// one. Initializes the pool first if nobody did, without waiting for the
    /// eager fill.
    ///
    /// # Errors
    ///
    /// - `PoolError::AcquireTimeout` if nothing became available in time
    /// - `PoolError::ResourceCreateFailed` if the creation serving this caller failed
    /// - `PoolError::PoolClosed` if the pool is closed or closes while waiting
    pub async fn acquire(&self) -> Result<Pooled<F, S>, PoolError> {
        let initialized = self.inner.state.lock().initialized;
        if !initialized {
            // Eager creations land in idle or serve the waiter queue; this
            // caller parks under the acquire timer like any other.
            self.start()?;
        }
        let resource = self.inner.checkout().await?;
        Ok(Pooled {
            resource: Some(resource),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Return a checked-out resource.
    ///
    /// The longest waiting caller is served first; otherwise the resource
    /// becomes idle. Equivalent to dropping the guard.
    pub fn release(&self, resource: Pooled<F, S>) {
        drop(resource);
    }

    /// Remove a checked-out resource from the pool and destroy it.
    ///
    /// Use this for resources known to be broken. Frees capacity for a new
    /// creation if callers are waiting.
    pub fn destroy(&self, resource: Pooled<F, S>) {
        let (resource, inner) = resource.take();
        let (replenish, drained) = {
            let mut state = inner.state.lock();
            state.allocated = state.allocated.saturating_sub(1);
            let replenish =
                state.wants_creation() && state.reserve_creation(inner.config.max_size);
            (replenish, state.closed && state.is_drained())
        };
        debug!("destroying checked-out resource");
        inner.spawn_destroy(vec![resource]);
        if replenish {
            drop(inner.spawn_create());
        }
        if drained {
            inner.drained.notify_waiters();
        }
    }

    /// Acquire a resource, run `executor` against it and release it.
    ///
    /// # Errors
    ///
    /// Acquisition errors as for [`acquire`](Self::acquire), or
    /// `PoolError::ExecutionFailed` when the executor fails.
    pub async fn run<E>(&self, executor: &E) -> Result<E::Output, PoolError>
    where
        E: ResourceExecutor<F::Resource>,
    {
        let mut resource = self.acquire().await?;
        let output = executor.execute(&mut resource).await;
        self.release(resource);
        output.map_err(PoolError::ExecutionFailed)
    }

    /// Check that the factory can currently create a resource.
    ///
    /// The probe resource is destroyed right away and never enters the pool.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ResourceCreateFailed` with the factory error.
    pub async fn probe(&self) -> Result<(), PoolError> {
        let resource = self
            .inner
            .factory
            .create()
            .await
            .map_err(PoolError::ResourceCreateFailed)?;
        self.inner.factory.destroy(resource).await;
        Ok(())
    }

    /// Destroy idle resources idle for longer than `idle_timeout`, never going
    /// below `min_size`. Returns how many were evicted.
    ///
    /// The background reaper calls this every `reap_interval`.
    pub fn evict_idle(&self) -> usize {
        self.inner.evict_idle()
    }

    /// Stop handing out resources and tear the pool down.
    ///
    /// Current waiters fail with `PoolClosed`, idle resources are destroyed, and
    /// the call waits until every checked-out resource and in-progress creation
    /// has come back and been destroyed. Safe to call more than once.
    pub async fn close(&self) {
        let (idle, waiters) = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let idle: Vec<_> = state.idle.drain(..).map(|entry| entry.resource).collect();
            state.allocated = state.allocated.saturating_sub(idle.len());
            let waiters: Vec<_> = state.waiters.drain(..).collect();
            (idle, waiters)
        };
        if !waiters.is_empty() {
            debug!(waiters = waiters.len(), "failing waiters on close");
        }
        for waiter in waiters {
            waiter.reject(PoolError::PoolClosed);
        }
        for resource in idle {
            self.inner.factory.destroy(resource).await;
        }

        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let drained = self.inner.state.lock().is_drained();
            if drained {
                break;
            }
            notified.await;
        }
        info!("resource pool closed");
    }

    fn spawn_reaper(&self) {
        let pool = Arc::downgrade(&self.inner);
        let interval = self.inner.config.reap_interval();
        self.inner.spawner.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(inner) = pool.upgrade() else {
                    break;
                };
                let closed = inner.state.lock().closed;
                if closed {
                    break;
                }
                inner.evict_idle();
            }
            debug!("idle reaper stopped");
        });
    }
}

impl<F: ResourceFactory, S: Spawn> PoolInner<F, S> {
    /// Start a creation whose slot was already reserved in `creating`.
    ///
    /// The returned channel reports the outcome once the resource has been
    /// routed (or the failure delivered); dropping it does not cancel anything.
    fn spawn_create(self: &Arc<Self>) -> oneshot::Receiver<Result<(), String>> {
        let inner = Arc::clone(self);
        let (done_tx, done_rx) = oneshot::channel();
        self.spawner.spawn(async move {
            let created = inner.factory.create().await;
            let outcome = inner.finish_create(created);
            let _ = done_tx.send(outcome);
        });
        done_rx
    }

    fn finish_create(self: &Arc<Self>, created: AppResult<F::Resource>) -> Result<(), String> {
        match created {
            Ok(resource) => {
                let (announce, destroy, drained) = {
                    let mut state = self.state.lock();
                    state.creating = state.creating.saturating_sub(1);
                    state.allocated += 1;
                    let announce = !state.min_announced
                        && state.allocated >= self.config.min_size;
                    if announce {
                        state.min_announced = true;
                    }
                    let allocated = state.allocated;
                    let destroy = state.put_back(resource);
                    let drained = state.closed && state.is_drained();
                    (announce.then_some(allocated), destroy, drained)
                };
                debug!("resource created");
                if let Some(allocated) = announce {
                    info!(allocated, "pool reached its minimum size");
                    self.events.emit(&PoolEvent::MinAllocated { allocated });
                }
                if let Some(resource) = destroy {
                    self.spawn_destroy(vec![resource]);
                }
                if drained {
                    self.drained.notify_waiters();
                }
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                warn!(error = %message, "resource creation failed");
                let (undelivered, replenish, drained) = {
                    let mut state = self.state.lock();
                    state.creating = state.creating.saturating_sub(1);
                    let undelivered = state.fail_waiter(PoolError::ResourceCreateFailed(err));
                    // The freed slot goes to whoever is still queued.
                    let replenish =
                        state.wants_creation() && state.reserve_creation(self.config.max_size);
                    (undelivered, replenish, state.closed && state.is_drained())
                };
                if undelivered.is_some() {
                    debug!("no waiter left to receive the creation failure");
                }
                if replenish {
                    drop(self.spawn_create());
                }
                if drained {
                    self.drained.notify_waiters();
                }
                Err(message)
            }
        }
    }

    fn release_resource(self: &Arc<Self>, resource: F::Resource) {
        let (destroy, drained) = {
            let mut state = self.state.lock();
            let destroy = state.put_back(resource);
            (destroy, state.closed && state.is_drained())
        };
        if let Some(resource) = destroy {
            debug!("resource released into a closed pool; destroying");
            self.spawn_destroy(vec![resource]);
        }
        if drained {
            self.drained.notify_waiters();
        }
    }

    fn evict_idle(self: &Arc<Self>) -> usize {
        let expired = self
            .state
            .lock()
            .take_expired(self.config.idle_timeout(), self.config.min_size);
        let evicted = expired.len();
        if evicted > 0 {
            debug!(evicted, "evicting idle resources");
            self.spawn_destroy(expired);
        }
        evicted
    }

    fn spawn_destroy(self: &Arc<Self>, resources: Vec<F::Resource>) {
        if resources.is_empty() {
            return;
        }
        let inner = Arc::clone(self);
        self.spawner.spawn(async move {
            for resource in resources {
                inner.factory.destroy(resource).await;
            }
        });
    }
}
