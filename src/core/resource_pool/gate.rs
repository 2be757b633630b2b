//! Acquisition gate: hands out idle resources or parks the caller until a
//! delivery arrives or the acquire timeout fires, whichever comes first.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::state::{Delivery, Withdrawal};
use super::{PoolInner, PoolStatus, Spawn};
use crate::core::{PoolError, PoolEvent, ResourceFactory};

/// Parked caller. Withdraws itself from the waiter queue when dropped while
/// still armed, so a cancelled `acquire` never strands a delivered resource.
struct WaiterGuard<F: ResourceFactory, S: Spawn> {
    inner: Arc<PoolInner<F, S>>,
    id: u64,
    rx: oneshot::Receiver<Delivery<F::Resource>>,
    armed: bool,
}

impl<F: ResourceFactory, S: Spawn> Drop for WaiterGuard<F, S> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.withdraw(self.id, &mut self.rx);
        }
    }
}

impl<F: ResourceFactory, S: Spawn> PoolInner<F, S> {
    pub(super) async fn checkout(self: &Arc<Self>) -> Result<F::Resource, PoolError> {
        let (id, rx, create) = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::PoolClosed);
            }
            if let Some(entry) = state.idle.pop_front() {
                return Ok(entry.resource);
            }
            let (id, rx) = state.push_waiter();
            let create =
                state.wants_creation() && state.reserve_creation(self.config.max_size);
            (id, rx, create)
        };
        if create {
            drop(self.spawn_create());
        }

        let mut guard = WaiterGuard {
            inner: Arc::clone(self),
            id,
            rx,
            armed: true,
        };
        let timeout = self.config.acquire_timeout();
        let started = Instant::now();

        tokio::select! {
            biased;
            delivery = &mut guard.rx => {
                guard.armed = false;
                // Senders are only dropped unsent when the pool shuts down.
                delivery.unwrap_or(Err(PoolError::PoolClosed))
            }
            () = tokio::time::sleep(timeout) => {
                guard.armed = false;
                let status = self.withdraw(guard.id, &mut guard.rx);
                let waited = started.elapsed();
                warn!(
                    ?waited,
                    allocated = status.allocated,
                    idle = status.idle,
                    scheduled = status.scheduled,
                    waiting = status.waiting,
                    max = status.max,
                    "acquire timed out"
                );
                self.events.emit(&PoolEvent::AcquireTimeout { waited, status });
                Err(PoolError::AcquireTimeout(timeout))
            }
        }
    }

    /// Remove a waiter and reconcile anything delivered to it meanwhile.
    /// Returns the status right after the withdrawal.
    fn withdraw(
        self: &Arc<Self>,
        id: u64,
        rx: &mut oneshot::Receiver<Delivery<F::Resource>>,
    ) -> PoolStatus {
        let (outcome, status, drained) = {
            let mut state = self.state.lock();
            let outcome = state.withdraw(id, rx);
            let status = state.status(&self.config);
            (outcome, status, state.closed && state.is_drained())
        };
        match outcome {
            Withdrawal::LateResource(Some(resource)) => self.spawn_destroy(vec![resource]),
            Withdrawal::LateResource(None) => debug!("late resource returned to the pool"),
            Withdrawal::LateError(error) => {
                debug!(error = %error, "creation failure arrived after the waiter left");
            }
            Withdrawal::Nothing => {}
        }
        if drained {
            self.drained.notify_waiters();
        }
        status
    }
}
