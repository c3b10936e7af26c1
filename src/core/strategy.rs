//! Dispatch strategies (§4.3): the seven ways to turn a submission into a
//! choice of worker, or a send to every worker.

use std::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::core::error::PoolError;
use crate::core::registry::PoolDescriptor;
use crate::core::task::{next_task_id, TaskKind, WorkerId};

fn no_workers(desc: &PoolDescriptor<impl Send + std::fmt::Debug + 'static, impl Send + 'static>) -> PoolError {
    PoolError::NoWorkers(desc.name.clone())
}

/// §4.3 `best_worker`: probe every worker's mailbox length starting at a
/// uniformly random index (wrapping around) and return the shortest one
/// seen. The random start prevents every caller from herding onto worker 0
/// under contention.
pub(crate) fn best_worker<P, R>(desc: &PoolDescriptor<P, R>) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let lens = desc.supervisor.mailbox_lens();
    if lens.is_empty() {
        return Err(no_workers(desc));
    }
    let start = rand::rng().random_range(0..lens.len());
    (0..lens.len())
        .map(|offset| &lens[(start + offset) % lens.len()])
        .min_by_key(|(_, len)| *len)
        .map(|(id, _)| id.clone())
        .ok_or_else(|| no_workers(desc))
}

/// §4.3 `random_worker`: uniformly at random among the pool's workers.
pub(crate) fn random_worker<P, R>(desc: &PoolDescriptor<P, R>) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    if desc.size == 0 {
        return Err(no_workers(desc));
    }
    let index = rand::rng().random_range(0..desc.size);
    Ok(desc.worker_id(index))
}

/// §4.3 `next_worker`: atomic round-robin, one CAS attempt, no retry loop.
pub(crate) fn next_worker<P, R>(desc: &PoolDescriptor<P, R>) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    if desc.size == 0 {
        return Err(no_workers(desc));
    }
    Ok(desc.worker_id(desc.next_index()))
}

/// §4.3 `hash_worker`: stable mapping from an arbitrary key to a worker.
pub(crate) fn hash_worker<P, R, K: Hash>(
    desc: &PoolDescriptor<P, R>,
    key: &K,
) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    if desc.size == 0 {
        return Err(no_workers(desc));
    }
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let index = (hasher.finish() % desc.size as u64) as usize;
    Ok(desc.worker_id(index))
}

/// §4.3 `next_available_worker`: the first worker that is both idle (no
/// current task) and has an empty mailbox, or `no_available_workers` (§7).
pub(crate) fn next_available_worker<P, R>(desc: &PoolDescriptor<P, R>) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let mailbox_lens = desc.supervisor.mailbox_lens();
    let current_tasks = desc.supervisor.current_tasks();
    for (id, len) in mailbox_lens {
        let idle = current_tasks
            .iter()
            .find(|(task_id, _)| *task_id == id)
            .is_some_and(|(_, task)| task.is_none());
        if len == 0 && idle {
            return Ok(id);
        }
    }
    Err(PoolError::NoAvailableWorkers(desc.name.clone()))
}

/// §4.3 `call_available_worker`: end-to-end timeout bounding both queueing
/// and execution. The worker replies directly to the caller's oneshot once
/// matched (no round trip back through the queue manager).
pub(crate) async fn call_available_worker<P, R>(
    desc: &PoolDescriptor<P, R>,
    payload: P,
    call_timeout: Duration,
) -> Result<R, PoolError>
where
    P: Send + 'static,
    R: Send + 'static,
{
    let (reply_tx, reply_rx) = oneshot::channel();
    let deadline = Instant::now() + call_timeout;
    desc.queue_manager
        .enqueue_call(payload, Some(deadline), reply_tx, TaskKind::Call)?;

    match timeout(call_timeout, reply_rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(PoolError::NoProc(desc.name.clone())),
        Err(_) => Err(PoolError::Timeout),
    }
}

/// Handle to an in-flight `send_request_available_worker` call (§4.3).
/// Only the queueing time is deadline-bound; once a worker picks the task
/// up it runs to completion regardless of how long that takes.
pub struct RequestHandle<R> {
    rx: oneshot::Receiver<Result<R, PoolError>>,
}

impl<R> RequestHandle<R> {
    /// Await the eventual reply.
    pub async fn await_reply(self) -> Result<R, PoolError> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(PoolError::NoProc("queue manager dropped the reply".into())))
    }
}

/// §4.3 `send_request_available_worker`: returns immediately with a handle;
/// never blocks the caller.
pub(crate) fn send_request_available_worker<P, R>(
    desc: &PoolDescriptor<P, R>,
    payload: P,
    queue_timeout: Duration,
) -> Result<RequestHandle<R>, PoolError>
where
    P: Send + 'static,
    R: Send + 'static,
{
    let (reply_tx, reply_rx) = oneshot::channel();
    let deadline = Instant::now() + queue_timeout;
    desc.queue_manager
        .enqueue_call(payload, Some(deadline), reply_tx, TaskKind::SendRequest)?;
    Ok(RequestHandle { rx: reply_rx })
}

/// §4.3 `cast_to_available_worker`: never fails for the caller; queues
/// indefinitely until a worker is free.
pub(crate) fn cast_to_available_worker<P, R>(desc: &PoolDescriptor<P, R>, payload: P)
where
    P: Send + 'static,
    R: Send + 'static,
{
    desc.queue_manager.enqueue_cast(payload);
}

/// §4.3 `broadcast`: a copy of `payload` to every worker, bypassing the
/// queue manager entirely. Best effort: a dead worker is skipped, not
/// reported as a pool-wide failure.
pub(crate) fn broadcast<P, R>(desc: &PoolDescriptor<P, R>, payload: &P)
where
    P: Send + Clone + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    for index in 0..desc.size {
        let task_id = next_task_id();
        let _ = desc
            .supervisor
            .dispatch_to(index, task_id, payload.clone(), None);
    }
}
