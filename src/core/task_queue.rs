//! Named task queues with bounded concurrency and a FIFO backlog.
//!
//! A [`QueueRegistry`] owns any number of queues. Each queue runs at most
//! `concurrency` tasks at once; further submissions wait in submission order and
//! are promoted as running tasks complete. Queues can be stopped (drain, then
//! idle) and resumed without losing pending work.
//!
//! ```rust,ignore
//! let registry = QueueRegistry::new(TokioSpawner::new(Handle::current()));
//! registry.queue(
//!     "thumbnails",
//!     QueueConfig::new().with_concurrency(2),
//!     processor_fn(|path: String, _fb: Feedback<()>| async move { render(path).await }),
//! )?;
//! let handle = registry.perform_now("thumbnails", "cat.png".into())?;
//! let rendered = handle.outcome().await?;
//! ```

mod backlog;
mod feedback;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::core::events::EventBus;
use crate::core::{EventSink, QueueError, QueueEvent, Spawn, TaskProcessor};

use self::backlog::{PendingBacklog, TaskRecord};
pub use self::feedback::Feedback;

/// Unique identifier assigned to every submitted task.
pub type TaskId = Uuid;

/// Lifecycle of a single queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Pending tasks are promoted as slots free up.
    Running,
    /// Stop requested; in-flight tasks finish, nothing new starts.
    Draining,
    /// Nothing in flight and nothing starts until resumed.
    Stopped,
}

/// Read-only snapshot of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Queue name.
    pub name: String,
    /// Maximum tasks in flight.
    pub concurrency: usize,
    /// Current lifecycle state.
    pub lifecycle: Lifecycle,
    /// Tasks currently running.
    pub in_flight: usize,
    /// Tasks waiting for a slot.
    pub pending: usize,
}

/// Submitter's side of one task: its outcome and its feedback stream.
pub struct TaskHandle<R, F = ()> {
    id: TaskId,
    outcome: oneshot::Receiver<Result<R, QueueError>>,
    feedback: mpsc::UnboundedReceiver<F>,
}

impl<R, F> fmt::Debug for TaskHandle<R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

impl<R, F> TaskHandle<R, F> {
    /// Identifier of the task.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Next feedback update. Returns `None` once the task has finished and all
    /// updates were read.
    pub async fn next_feedback(&mut self) -> Option<F> {
        self.feedback.recv().await
    }

    /// Feedback update already available, if any.
    pub fn try_feedback(&mut self) -> Option<F> {
        self.feedback.try_recv().ok()
    }

    /// Wait for the task to finish.
    ///
    /// # Errors
    ///
    /// - `QueueError::TaskProcessingFailed` if the processor failed or panicked
    /// - `QueueError::TaskDropped` if the registry was dropped before the task ran
    pub async fn outcome(self) -> Result<R, QueueError> {
        self.outcome
            .await
            .unwrap_or_else(|_| Err(QueueError::TaskDropped))
    }
}

/// Observer for a stop request.
#[derive(Debug)]
pub struct StopSignal {
    rx: watch::Receiver<Lifecycle>,
}

impl StopSignal {
    /// Lifecycle of the queue right now.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        *self.rx.borrow()
    }

    /// Wait until the queue leaves `Draining`.
    ///
    /// Resolves with `Stopped` once in-flight work finished, or with `Running`
    /// if the queue was resumed first.
    pub async fn stopped(mut self) -> Lifecycle {
        match self.rx.wait_for(|state| *state != Lifecycle::Draining).await {
            Ok(state) => *state,
            // Queue replaced or registry dropped.
            Err(_) => Lifecycle::Stopped,
        }
    }
}

type SharedProcessor<D, R, F> = Arc<dyn TaskProcessor<D, R, F>>;

struct QueueEntry<D, R, F> {
    concurrency: usize,
    processor: SharedProcessor<D, R, F>,
    lifecycle: watch::Sender<Lifecycle>,
    in_flight: HashSet<TaskId>,
    pending: PendingBacklog<TaskRecord<D, R, F>>,
}

impl<D, R, F> QueueEntry<D, R, F> {
    fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Returns whether the state actually changed.
    fn set_lifecycle(&self, next: Lifecycle) -> bool {
        self.lifecycle.send_replace(next) != next
    }

    fn has_free_slot(&self) -> bool {
        self.in_flight.len() < self.concurrency
    }

    fn is_busy(&self) -> bool {
        !self.in_flight.is_empty() || !self.pending.is_empty()
    }

    /// Move pending heads into the in-flight set while running and under the limit.
    fn promote(&mut self) -> Vec<TaskRecord<D, R, F>> {
        let mut promoted = Vec::new();
        while self.lifecycle() == Lifecycle::Running && self.has_free_slot() {
            let Some(record) = self.pending.pop_front() else {
                break;
            };
            self.in_flight.insert(record.id);
            promoted.push(record);
        }
        promoted
    }

    fn status(&self, name: &str) -> QueueStatus {
        QueueStatus {
            name: name.to_string(),
            concurrency: self.concurrency,
            lifecycle: self.lifecycle(),
            in_flight: self.in_flight.len(),
            pending: self.pending.len(),
        }
    }
}

struct RegistryInner<D, R, S, F> {
    queues: Mutex<HashMap<String, QueueEntry<D, R, F>>>,
    spawner: S,
    events: EventBus<QueueEvent>,
}

/// Explicit, caller-owned collection of named task queues.
///
/// Cloning yields another handle to the same registry; independent registries
/// never share state.
pub struct QueueRegistry<D, R, S, F = ()> {
    inner: Arc<RegistryInner<D, R, S, F>>,
}

impl<D, R, S, F> Clone for QueueRegistry<D, R, S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D, R, S, F> fmt::Debug for QueueRegistry<D, R, S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.inner.queues.lock();
        f.debug_struct("QueueRegistry")
            .field("queues", &queues.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<D, R, S, F> QueueRegistry<D, R, S, F>
where
    D: Send + 'static,
    R: Send + 'static,
    F: Send + 'static,
    S: Spawn,
{
    /// Create an empty registry running tasks on `spawner`.
    pub fn new(spawner: S) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                queues: Mutex::new(HashMap::new()),
                spawner,
                events: EventBus::new(),
            }),
        }
    }

    /// Attach an event sink.
    #[must_use]
    pub fn with_event_sink(self, sink: impl EventSink<QueueEvent> + 'static) -> Self {
        self.subscribe(sink);
        self
    }

    /// Subscribe an additional event sink.
    pub fn subscribe(&self, sink: impl EventSink<QueueEvent> + 'static) {
        self.inner.events.subscribe(Box::new(sink));
    }

    /// Register `processor` under `name`, replacing an idle queue of the same name.
    ///
    /// # Errors
    ///
    /// - `QueueError::InvalidConfig` if the configuration is invalid
    /// - `QueueError::QueueBusy` if a queue with this name still has in-flight
    ///   or pending tasks
    pub fn queue<P>(
        &self,
        name: impl Into<String>,
        config: QueueConfig,
        processor: P,
    ) -> Result<(), QueueError>
    where
        P: TaskProcessor<D, R, F>,
    {
        config.validate().map_err(QueueError::InvalidConfig)?;
        let name = name.into();
        {
            let mut queues = self.inner.queues.lock();
            if let Some(existing) = queues.get(&name) {
                if existing.is_busy() {
                    return Err(QueueError::QueueBusy {
                        name,
                        in_flight: existing.in_flight.len(),
                        pending: existing.pending.len(),
                    });
                }
            }
            let (lifecycle, _) = watch::channel(Lifecycle::Running);
            queues.insert(
                name.clone(),
                QueueEntry {
                    concurrency: config.concurrency,
                    processor: Arc::new(processor),
                    lifecycle,
                    in_flight: HashSet::new(),
                    pending: PendingBacklog::new(),
                },
            );
        }
        info!(queue = %name, concurrency = config.concurrency, "queue registered");
        Ok(())
    }

    /// Submit a task and return immediately.
    ///
    /// The task starts right away when the queue is running and has a free slot,
    /// otherwise it joins the backlog. Submissions are never rejected for load.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::QueueNotFound` if no queue is registered under `name`;
    /// nothing is mutated in that case.
    pub fn perform_now(&self, name: &str, data: D) -> Result<TaskHandle<R, F>, QueueError> {
        let id = Uuid::new_v4();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (feedback, feedback_rx) = Feedback::channel();
        let record = TaskRecord {
            id,
            data,
            outcome: outcome_tx,
            feedback,
        };

        let start = {
            let mut queues = self.inner.queues.lock();
            let entry = queues
                .get_mut(name)
                .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))?;
            if entry.lifecycle() == Lifecycle::Running && entry.has_free_slot() {
                entry.in_flight.insert(id);
                Some((record, Arc::clone(&entry.processor)))
            } else {
                entry.pending.push_back(record);
                debug!(
                    queue = name,
                    task_id = %id,
                    pending = entry.pending.len(),
                    "task queued"
                );
                None
            }
        };
        if let Some((record, processor)) = start {
            self.inner.launch(name, processor, record);
        }

        Ok(TaskHandle {
            id,
            outcome: outcome_rx,
            feedback: feedback_rx,
        })
    }

    /// Submit a task and wait for its outcome.
    ///
    /// # Errors
    ///
    /// As for [`perform_now`](Self::perform_now) and [`TaskHandle::outcome`].
    pub async fn perform(&self, name: &str, data: D) -> Result<R, QueueError> {
        self.perform_now(name, data)?.outcome().await
    }

    /// Stop promoting pending tasks.
    ///
    /// The queue is `Draining` until its in-flight tasks finish, then `Stopped`;
    /// with nothing in flight it is `Stopped` right away. Pending and newly
    /// submitted tasks stay in the backlog.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::QueueNotFound` for an unknown name.
    pub fn stop(&self, name: &str) -> Result<StopSignal, QueueError> {
        let (signal, target, changed) = {
            let queues = self.inner.queues.lock();
            let entry = queues
                .get(name)
                .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))?;
            let target = if entry.in_flight.is_empty() {
                Lifecycle::Stopped
            } else {
                Lifecycle::Draining
            };
            let changed = entry.set_lifecycle(target);
            let signal = StopSignal {
                rx: entry.lifecycle.subscribe(),
            };
            (signal, target, changed)
        };
        if changed {
            info!(queue = name, lifecycle = ?target, "queue stopping");
            self.inner.lifecycle_changed(name, target);
        }
        Ok(signal)
    }

    /// Return the queue to `Running` and start pending tasks up to the limit.
    /// Returns how many were started.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::QueueNotFound` for an unknown name.
    pub fn resume(&self, name: &str) -> Result<usize, QueueError> {
        let (promoted, processor, changed) = {
            let mut queues = self.inner.queues.lock();
            let entry = queues
                .get_mut(name)
                .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))?;
            let changed = entry.set_lifecycle(Lifecycle::Running);
            (entry.promote(), Arc::clone(&entry.processor), changed)
        };
        if changed {
            info!(queue = name, promoted = promoted.len(), "queue resumed");
            self.inner.lifecycle_changed(name, Lifecycle::Running);
        }
        let started = promoted.len();
        for record in promoted {
            self.inner.launch(name, Arc::clone(&processor), record);
        }
        Ok(started)
    }

    /// Snapshot of one queue.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::QueueNotFound` for an unknown name.
    pub fn status(&self, name: &str) -> Result<QueueStatus, QueueError> {
        self.inner
            .queues
            .lock()
            .get(name)
            .map(|entry| entry.status(name))
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))
    }

    /// Snapshots of every registered queue, sorted by name.
    #[must_use]
    pub fn statuses(&self) -> Vec<QueueStatus> {
        let mut statuses: Vec<_> = self
            .inner
            .queues
            .lock()
            .iter()
            .map(|(name, entry)| entry.status(name))
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Names of registered queues, sorted.
    #[must_use]
    pub fn queues(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.queues.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<D, R, S, F> RegistryInner<D, R, S, F>
where
    D: Send + 'static,
    R: Send + 'static,
    F: Send + 'static,
    S: Spawn,
{
    /// Run a task whose id is already in the in-flight set.
    fn launch(
        self: &Arc<Self>,
        queue: &str,
        processor: SharedProcessor<D, R, F>,
        record: TaskRecord<D, R, F>,
    ) {
        let inner = Arc::clone(self);
        let queue = queue.to_string();
        debug!(queue = %queue, task_id = %record.id, "task started");
        self.spawner.spawn(async move {
            let TaskRecord {
                id,
                data,
                outcome,
                feedback,
            } = record;
            let result = match AssertUnwindSafe(processor.process(data, feedback))
                .catch_unwind()
                .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(QueueError::TaskProcessingFailed(err)),
                Err(panic) => Err(QueueError::TaskProcessingFailed(anyhow::anyhow!(
                    "processor panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };
            inner.complete(&queue, id, result, outcome);
        });
    }

    fn complete(
        self: &Arc<Self>,
        queue: &str,
        id: TaskId,
        result: Result<R, QueueError>,
        outcome: oneshot::Sender<Result<R, QueueError>>,
    ) {
        let (promoted, processor, stopped) = {
            let mut queues = self.queues.lock();
            match queues.get_mut(queue) {
                Some(entry) => {
                    entry.in_flight.remove(&id);
                    let promoted = entry.promote();
                    let stopped = entry.lifecycle() == Lifecycle::Draining
                        && entry.in_flight.is_empty()
                        && entry.set_lifecycle(Lifecycle::Stopped);
                    (promoted, Some(Arc::clone(&entry.processor)), stopped)
                }
                None => (Vec::new(), None, false),
            }
        };

        let event = match &result {
            Ok(_) => {
                debug!(queue, task_id = %id, "task completed");
                QueueEvent::Completed {
                    queue: queue.to_string(),
                    task_id: id,
                }
            }
            Err(err) => {
                warn!(queue, task_id = %id, error = %err, "task failed");
                QueueEvent::Failed {
                    queue: queue.to_string(),
                    task_id: id,
                    error: err.to_string(),
                }
            }
        };
        self.events.emit(&event);
        if stopped {
            info!(queue, "queue stopped");
            self.lifecycle_changed(queue, Lifecycle::Stopped);
        }

        // Submitter may have dropped the handle.
        let _ = outcome.send(result);

        if let Some(processor) = processor {
            for record in promoted {
                debug!(queue, task_id = %record.id, "task promoted");
                self.launch(queue, Arc::clone(&processor), record);
            }
        }
    }

    fn lifecycle_changed(&self, queue: &str, lifecycle: Lifecycle) {
        self.events.emit(&QueueEvent::LifecycleChanged {
            queue: queue.to_string(),
            lifecycle,
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
