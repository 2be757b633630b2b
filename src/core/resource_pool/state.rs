//! Pool bookkeeping guarded by the pool mutex.
//!
//! Every method here runs inside a single critical section, so each one is an
//! indivisible transition of the pool state.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::core::{PoolError, PoolStatus};

/// What a waiter receives: a resource, or the reason it will not get one.
pub(super) type Delivery<T> = Result<T, PoolError>;

/// Resource resting in the idle set.
pub(super) struct IdleEntry<T> {
    pub(super) resource: T,
    pub(super) since: Instant,
}

/// Caller blocked in `acquire`.
pub(super) struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<Delivery<T>>,
}

impl<T> Waiter<T> {
    /// Fail the waiter; ignored if it already stopped listening.
    pub(super) fn reject(self, error: PoolError) {
        let _ = self.tx.send(Err(error));
    }
}

pub(super) struct PoolState<T> {
    /// Ordered by release time, oldest first.
    pub(super) idle: VecDeque<IdleEntry<T>>,
    pub(super) waiters: VecDeque<Waiter<T>>,
    /// Successfully created, not yet destroyed. Includes idle and checked out.
    pub(super) allocated: usize,
    /// Creations started but not finished.
    pub(super) creating: usize,
    pub(super) initialized: bool,
    pub(super) min_announced: bool,
    pub(super) closed: bool,
    next_waiter_id: u64,
}

impl<T> PoolState<T> {
    pub(super) fn new(max_size: usize) -> Self {
        Self {
            idle: VecDeque::with_capacity(max_size),
            waiters: VecDeque::new(),
            allocated: 0,
            creating: 0,
            initialized: false,
            min_announced: false,
            closed: false,
            next_waiter_id: 0,
        }
    }

    pub(super) fn status(&self, config: &PoolConfig) -> PoolStatus {
        let idle = self.idle.len();
        PoolStatus {
            min: config.min_size,
            max: config.max_size,
            allocated: self.allocated,
            idle,
            scheduled: self.allocated.saturating_sub(idle),
            waiting: self.waiters.len(),
        }
    }

    pub(super) const fn has_capacity(&self, max_size: usize) -> bool {
        self.allocated + self.creating < max_size
    }

    /// Reserve a creation slot if the pool may still grow.
    pub(super) fn reserve_creation(&mut self, max_size: usize) -> bool {
        if self.closed || !self.has_capacity(max_size) {
            return false;
        }
        self.creating += 1;
        true
    }

    /// More callers are waiting than there are creations in flight to serve them.
    pub(super) fn wants_creation(&self) -> bool {
        self.creating < self.waiters.len()
    }

    pub(super) const fn is_drained(&self) -> bool {
        self.allocated == 0 && self.creating == 0
    }

    /// Queue a new waiter at the tail.
    pub(super) fn push_waiter(&mut self) -> (u64, oneshot::Receiver<Delivery<T>>) {
        let (tx, rx) = oneshot::channel();
        let id = self.next_waiter_id;
        self.next_waiter_id = self.next_waiter_id.wrapping_add(1);
        self.waiters.push_back(Waiter { id, tx });
        (id, rx)
    }

    /// Return an allocated resource to circulation.
    ///
    /// The longest waiter still listening gets it; otherwise it joins the idle
    /// tail. When the pool is closed the resource leaves the accounting and is
    /// handed back for destruction.
    pub(super) fn put_back(&mut self, resource: T) -> Option<T> {
        if self.closed {
            self.allocated = self.allocated.saturating_sub(1);
            return Some(resource);
        }
        let mut delivery = Ok(resource);
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.tx.send(delivery) {
                Ok(()) => return None,
                // Receiver already gone; try the next one.
                Err(returned) => delivery = returned,
            }
        }
        if let Ok(resource) = delivery {
            self.idle.push_back(IdleEntry {
                resource,
                since: Instant::now(),
            });
        }
        None
    }

    /// Hand a creation failure to the longest waiter still listening.
    /// Returns the error when nobody took it.
    pub(super) fn fail_waiter(&mut self, error: PoolError) -> Option<PoolError> {
        let mut delivery = Err(error);
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.tx.send(delivery) {
                Ok(()) => return None,
                Err(returned) => delivery = returned,
            }
        }
        delivery.err()
    }

    /// Withdraw a waiter that stopped waiting.
    ///
    /// Once removed no further delivery can reach it, so anything already sent
    /// is taken back here and put back into circulation in the same step.
    pub(super) fn withdraw(
        &mut self,
        id: u64,
        rx: &mut oneshot::Receiver<Delivery<T>>,
    ) -> Withdrawal<T> {
        self.waiters.retain(|w| w.id != id);
        rx.close();
        match rx.try_recv() {
            Ok(Ok(resource)) => Withdrawal::LateResource(self.put_back(resource)),
            Ok(Err(error)) => Withdrawal::LateError(error),
            Err(_) => Withdrawal::Nothing,
        }
    }

    /// Remove idle resources idle longer than `idle_timeout`, oldest first,
    /// never dropping `allocated` below `min_size`.
    pub(super) fn take_expired(&mut self, idle_timeout: Duration, min_size: usize) -> Vec<T> {
        let mut expired = Vec::new();
        while self.allocated > min_size {
            let is_expired = self
                .idle
                .front()
                .is_some_and(|entry| entry.since.elapsed() > idle_timeout);
            if !is_expired {
                break;
            }
            let Some(entry) = self.idle.pop_front() else {
                break;
            };
            self.allocated -= 1;
            expired.push(entry.resource);
        }
        expired
    }
}

/// Result of withdrawing a waiter.
pub(super) enum Withdrawal<T> {
    /// Nothing had been delivered yet.
    Nothing,
    /// A resource arrived after the caller gave up and was put back.
    /// Holds the resource when the pool is closed and it must be destroyed.
    LateResource(Option<T>),
    /// A creation failure arrived after the caller gave up.
    LateError(PoolError),
}
