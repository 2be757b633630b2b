//! Collaborator traits: resource factories, work executors and task processors.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::{AppResult, Feedback};

/// Creates and destroys the raw resources held by a [`ResourcePool`](crate::core::ResourcePool).
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_pooling::core::{AppResult, ResourceFactory};
///
/// struct TcpFactory { addr: String }
///
/// #[async_trait]
/// impl ResourceFactory for TcpFactory {
///     type Resource = tokio::net::TcpStream;
///
///     async fn create(&self) -> AppResult<Self::Resource> {
///         Ok(tokio::net::TcpStream::connect(&self.addr).await?)
///     }
///
///     async fn destroy(&self, _stream: Self::Resource) {}
/// }
/// ```
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    /// The pooled resource type.
    type Resource: Send + 'static;

    /// Create a new resource. Failures surface as `ResourceCreateFailed`.
    async fn create(&self) -> AppResult<Self::Resource>;

    /// Destroy a resource. Best effort; the pool never waits on this for bookkeeping.
    async fn destroy(&self, resource: Self::Resource);
}

/// Performs a caller operation against an acquired resource.
///
/// Used by [`ResourcePool::run`](crate::core::ResourcePool::run); the pool only
/// propagates the output.
#[async_trait]
pub trait ResourceExecutor<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Output produced by the operation.
    type Output: Send;

    /// Run the operation with exclusive access to `resource`.
    async fn execute(&self, resource: &mut T) -> AppResult<Self::Output>;
}

/// Processing function bound to a task queue.
///
/// Receives the submitted data and a [`Feedback`] handle for progress updates,
/// and returns the task outcome. Returning `Err` is reported to the submitter as
/// `TaskProcessingFailed`.
#[async_trait]
pub trait TaskProcessor<D, R, F = ()>: Send + Sync + 'static {
    /// Process one task.
    async fn process(&self, data: D, feedback: Feedback<F>) -> AppResult<R>;
}

/// Adapter turning an async closure into a [`TaskProcessor`].
pub struct FnProcessor<T, D, R, F> {
    func: T,
    _marker: PhantomData<fn(D, F) -> R>,
}

/// Wrap `func` as a processor.
///
/// ```rust,ignore
/// let double = processor_fn(|n: u32, _feedback: Feedback<()>| async move { Ok(n * 2) });
/// ```
pub const fn processor_fn<T, D, R, F, Fut>(func: T) -> FnProcessor<T, D, R, F>
where
    T: Fn(D, Feedback<F>) -> Fut,
    Fut: Future<Output = AppResult<R>>,
{
    FnProcessor {
        func,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<T, D, R, F, Fut> TaskProcessor<D, R, F> for FnProcessor<T, D, R, F>
where
    T: Fn(D, Feedback<F>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<R>> + Send + 'static,
    D: Send + 'static,
    R: Send + 'static,
    F: Send + 'static,
{
    async fn process(&self, data: D, feedback: Feedback<F>) -> AppResult<R> {
        (self.func)(data, feedback).await
    }
}
