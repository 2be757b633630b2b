//! FIFO backlog of tasks waiting for a free slot.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use super::{Feedback, TaskId};
use crate::core::QueueError;

/// Submitted task not yet started, or starting.
pub(crate) struct TaskRecord<D, R, F> {
    pub(crate) id: TaskId,
    pub(crate) data: D,
    pub(crate) outcome: oneshot::Sender<Result<R, QueueError>>,
    pub(crate) feedback: Feedback<F>,
}

/// Tasks in submission order. Pending tasks are never dropped; they stay
/// queued across stop/resume.
pub(crate) struct PendingBacklog<T> {
    entries: VecDeque<T>,
}

impl<T> PendingBacklog<T> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub(crate) fn push_back(&mut self, entry: T) {
        self.entries.push_back(entry);
    }

    pub(crate) fn pop_front(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backlog_is_fifo() {
        let mut backlog = PendingBacklog::new();
        assert!(backlog.is_empty());
        backlog.push_back("a");
        backlog.push_back("b");
        backlog.push_back("c");

        assert_eq!(backlog.len(), 3);
        assert_eq!(backlog.pop_front(), Some("a"));
        assert_eq!(backlog.pop_front(), Some("b"));
        backlog.push_back("d");
        assert_eq!(backlog.pop_front(), Some("c"));
        assert_eq!(backlog.pop_front(), Some("d"));
        assert_eq!(backlog.pop_front(), None);
    }
}
