//! Task execution trait and the trivial default executor.
//!
//! The executor is an external collaborator per the design (§1 Non-goals):
//! "The default work executor (which simply invokes a supplied callable) —
//! trivial glue." Only the seam — the trait a worker calls into — is
//! specified here; no retry, batching, or result-transformation logic lives
//! on this boundary.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

/// Abstraction for executing a task payload and producing a result.
///
/// A worker unit calls `execute` once per task (§4.4, step 3) and treats a
/// panic inside the call as a recoverable `task_failure` (§7), not a crash
/// of the worker itself.
#[async_trait]
pub trait TaskExecutor<P, R>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Execute `payload` and return its result.
    async fn execute(&self, payload: P, task_id: u64) -> R;
}

/// The trivial default executor: invokes a supplied `Fn(P) -> Fut` for every
/// task. This is the "generic handler" referenced throughout §4.4.
pub struct FnExecutor<P, R, F, Fut>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    callable: Arc<F>,
    _marker: PhantomData<fn(P) -> Fut>,
}

impl<P, R, F, Fut> Clone for FnExecutor<P, R, F, Fut>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            callable: Arc::clone(&self.callable),
            _marker: PhantomData,
        }
    }
}

impl<P, R, F, Fut> FnExecutor<P, R, F, Fut>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    /// Wrap a callable as a [`TaskExecutor`].
    pub fn new(callable: F) -> Self {
        Self {
            callable: Arc::new(callable),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<P, R, F, Fut> TaskExecutor<P, R> for FnExecutor<P, R, F, Fut>
where
    P: Send + 'static,
    R: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    async fn execute(&self, payload: P, _task_id: u64) -> R {
        (self.callable)(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_executor_invokes_the_callable() {
        let exec = FnExecutor::new(|x: i32| async move { x * 2 });
        assert_eq!(exec.execute(21, 1).await, 42);
    }
}
