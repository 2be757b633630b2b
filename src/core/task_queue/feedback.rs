//! Progress channel from a running task back to its submitter.

use tokio::sync::mpsc;

/// Sending half handed to a [`TaskProcessor`](crate::core::TaskProcessor).
///
/// Feedback is delivered in send order and independently of the task outcome.
/// Sending never blocks; once the submitter drops its handle further updates
/// are discarded.
pub struct Feedback<F> {
    tx: mpsc::UnboundedSender<F>,
}

impl<F> Clone for Feedback<F> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<F> std::fmt::Debug for Feedback<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feedback")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<F> Feedback<F> {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<F>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A feedback handle nobody listens to.
    #[must_use]
    pub fn disconnected() -> Self {
        Self::channel().0
    }

    /// Send an update. Returns `false` if the submitter stopped listening.
    pub fn send(&self, update: F) -> bool {
        self.tx.send(update).is_ok()
    }

    /// Whether the submitter dropped its receiving side.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
