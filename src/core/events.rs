//! Typed lifecycle events and the sinks that receive them.
//!
//! Pools and registries emit events to every subscribed [`EventSink`].
//! `Initialized` and `MinAllocated` fire once per pool; every other event fires
//! on each occurrence.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::core::{Lifecycle, PoolStatus, TaskId};

/// Events emitted by a [`ResourcePool`](crate::core::ResourcePool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// `initialize` ran for the first time.
    Initialized,
    /// `allocated` reached `min_size` for the first time.
    MinAllocated {
        /// Allocated resources at the moment the floor was reached.
        allocated: usize,
    },
    /// An acquire call gave up waiting. Should always be logged.
    AcquireTimeout {
        /// How long the caller waited.
        waited: Duration,
        /// Pool status right after the waiter was withdrawn.
        status: PoolStatus,
    },
}

/// Events emitted by a [`QueueRegistry`](crate::core::QueueRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A task finished successfully.
    Completed {
        /// Queue name.
        queue: String,
        /// Task identifier.
        task_id: TaskId,
    },
    /// A task finished with an error.
    Failed {
        /// Queue name.
        queue: String,
        /// Task identifier.
        task_id: TaskId,
        /// Rendered error.
        error: String,
    },
    /// A queue changed lifecycle state.
    LifecycleChanged {
        /// Queue name.
        queue: String,
        /// New state.
        lifecycle: Lifecycle,
    },
}

/// Receiver of emitted events.
pub trait EventSink<E>: Send {
    /// Record one event.
    fn record(&mut self, event: E);
}

/// Bounded in-memory sink; clones share the same buffer.
pub struct InMemoryEventSink<E> {
    events: Arc<Mutex<VecDeque<E>>>,
    max_events: usize,
}

impl<E> Clone for InMemoryEventSink<E> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            max_events: self.max_events,
        }
    }
}

impl<E: Clone> InMemoryEventSink<E> {
    /// Create a sink retaining at most `max_events` recent events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<E> {
        self.events.lock().iter().cloned().collect()
    }

    /// Number of stored events matching `pred`.
    pub fn count(&self, pred: impl Fn(&E) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl<E: Send> EventSink<E> for InMemoryEventSink<E> {
    fn record(&mut self, event: E) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink forwarding events into an unbounded tokio channel.
pub struct ChannelEventSink<E> {
    tx: mpsc::UnboundedSender<E>,
}

/// Create a channel-backed sink and the stream of events it feeds.
#[must_use]
pub fn channel_sink<E>() -> (ChannelEventSink<E>, mpsc::UnboundedReceiver<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelEventSink { tx }, rx)
}

impl<E: Send> EventSink<E> for ChannelEventSink<E> {
    fn record(&mut self, event: E) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

/// Fan-out of events to all subscribed sinks.
pub(crate) struct EventBus<E> {
    sinks: Mutex<Vec<Box<dyn EventSink<E>>>>,
}

impl<E: Clone> EventBus<E> {
    pub(crate) fn new() -> Self {
        Self {
            sinks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, sink: Box<dyn EventSink<E>>) {
        self.sinks.lock().push(sink);
    }

    pub(crate) fn emit(&self, event: &E) {
        let mut sinks = self.sinks.lock();
        for sink in sinks.iter_mut() {
            sink.record(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_sink_overflow() {
        let mut sink = InMemoryEventSink::new(2);
        sink.record(PoolEvent::Initialized);
        sink.record(PoolEvent::MinAllocated { allocated: 1 });
        sink.record(PoolEvent::MinAllocated { allocated: 2 });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], PoolEvent::MinAllocated { allocated: 1 });
    }

    #[test]
    fn test_in_memory_sink_zero_capacity_keeps_nothing() {
        let mut sink = InMemoryEventSink::new(0);
        sink.record(PoolEvent::Initialized);
        sink.record(PoolEvent::MinAllocated { allocated: 1 });
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_bus_fans_out_to_clones() {
        let bus = EventBus::new();
        let first = InMemoryEventSink::new(10);
        let second = InMemoryEventSink::new(10);
        bus.subscribe(Box::new(first.clone()));
        bus.subscribe(Box::new(second.clone()));

        bus.emit(&PoolEvent::Initialized);

        assert_eq!(first.events(), vec![PoolEvent::Initialized]);
        assert_eq!(second.count(|e| *e == PoolEvent::Initialized), 1);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (mut sink, mut rx) = channel_sink();
        sink.record(PoolEvent::Initialized);
        assert_eq!(rx.recv().await, Some(PoolEvent::Initialized));

        drop(rx);
        // Sending into a closed channel is silently ignored.
        sink.record(PoolEvent::Initialized);
    }
}
