//! The pool's public API surface (§6): every free function a caller uses
//! to start a pool, dispatch work to it, and inspect it.

use std::sync::Arc;
use std::time::Duration;

use crate::config::PoolOptions;
use crate::core::error::PoolError;
use crate::core::event_manager::PoolCallback;
use crate::core::executor::TaskExecutor;
use crate::core::registry;
use crate::core::stats::{PoolStats, WorkerStats};
use crate::core::strategy::{self, RequestHandle};
use crate::core::supervisor::PoolSupervisor;
use crate::core::task::WorkerId;

/// Start a pool named `name`. See [`crate::builders::pool_builder::start_link`].
pub fn start_link<P, R, E>(name: impl Into<String>, options: PoolOptions, executor: E) -> Result<(), PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
    E: TaskExecutor<P, R>,
{
    crate::builders::pool_builder::start_link(name, options, executor)
}

/// Stop a running pool (§6 `stop`).
pub fn stop<P, R>(name: &str) -> Result<(), PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    crate::builders::pool_builder::stop::<P, R>(name)
}

fn descriptor<P, R>(name: &str) -> Result<Arc<crate::core::registry::PoolDescriptor<P, R>>, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    registry::lookup(name).ok_or_else(|| PoolError::NoWorkers(name.to_string()))
}

/// §4.3 `best_worker`.
pub fn best_worker<P, R>(name: &str) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    strategy::best_worker(&descriptor::<P, R>(name)?)
}

/// §4.3 `random_worker`.
pub fn random_worker<P, R>(name: &str) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    strategy::random_worker(&descriptor::<P, R>(name)?)
}

/// §4.3 `next_worker`.
pub fn next_worker<P, R>(name: &str) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    strategy::next_worker(&descriptor::<P, R>(name)?)
}

/// §4.3 `hash_worker`.
pub fn hash_worker<P, R, K: std::hash::Hash>(name: &str, key: &K) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    strategy::hash_worker(&descriptor::<P, R>(name)?, key)
}

/// §4.3 `next_available_worker`.
pub fn next_available_worker<P, R>(name: &str) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    strategy::next_available_worker(&descriptor::<P, R>(name)?)
}

/// §4.3 `call_available_worker`: queue `payload`, wait up to `timeout` for
/// the full round trip (queueing plus execution).
pub async fn call_available_worker<P, R>(
    name: &str,
    payload: P,
    timeout: Duration,
) -> Result<R, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    strategy::call_available_worker(&descriptor::<P, R>(name)?, payload, timeout).await
}

/// §4.3 `send_request_available_worker`: returns immediately; only the
/// queueing time is deadline-bound.
pub fn send_request_available_worker<P, R>(
    name: &str,
    payload: P,
    queue_timeout: Duration,
) -> Result<RequestHandle<R>, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    strategy::send_request_available_worker(&descriptor::<P, R>(name)?, payload, queue_timeout)
}

/// §4.3 `cast_to_available_worker`: fire-and-forget; never fails.
pub fn cast_to_available_worker<P, R>(name: &str, payload: P) -> Result<(), PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    strategy::cast_to_available_worker(&descriptor::<P, R>(name)?, payload);
    Ok(())
}

/// §6 `broadcast`: send a copy of `payload` to every worker, bypassing the
/// queue manager entirely.
pub fn broadcast<P, R>(name: &str, payload: &P) -> Result<(), PoolError>
where
    P: Send + Clone + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    strategy::broadcast(&descriptor::<P, R>(name)?, payload);
    Ok(())
}

/// §6 `next(n, descriptor)`: the `n`-th deterministic worker identifier
/// for a pool, without going through dispatch.
pub fn nth_worker<P, R>(name: &str, n: usize) -> Result<WorkerId, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let desc = descriptor::<P, R>(name)?;
    desc.next(n).ok_or(PoolError::InvalidRequest)
}

/// §4.6 `stats(name)`: a point-in-time snapshot of the pool.
pub fn stats<P, R>(name: &str) -> Result<PoolStats, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let desc = descriptor::<P, R>(name)?;
    let mailbox_lens = desc.supervisor.mailbox_lens();
    let current_tasks = desc.supervisor.current_tasks();

    let workers: Vec<WorkerStats> = mailbox_lens
        .iter()
        .map(|(id, len)| {
            let current = current_tasks
                .iter()
                .find(|(task_id, _)| task_id == id)
                .and_then(|(_, task)| task.clone());
            WorkerStats {
                id: id.to_string(),
                mailbox_len: *len,
                current_payload: current.as_ref().map(|t| t.payload_debug.clone()),
                current_elapsed: current.as_ref().map(crate::core::task::CurrentTask::elapsed),
            }
        })
        .collect();

    let total_worker_queue_len: usize = workers.iter().map(|w| w.mailbox_len).sum();
    let pending = desc.queue_manager.pending_by_kind();
    let total_message_queue_len = total_worker_queue_len + desc.queue_manager.pending_count();

    Ok(PoolStats {
        name: desc.name.clone(),
        supervisor_id: format!("{}-pool-supervisor", desc.name),
        options: desc.options.clone(),
        size: desc.size,
        cursor: desc.cursor(),
        birth_time: desc.birth_time,
        total_message_queue_len,
        pending_casts: pending.casts,
        pending_calls: pending.calls,
        pending_send_requests: pending.send_requests,
        workers,
    })
}

/// §6 `get_workers(name)`: the deterministic identifiers of every worker
/// currently in the pool.
pub fn get_workers<P, R>(name: &str) -> Result<Vec<WorkerId>, PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let desc = descriptor::<P, R>(name)?;
    Ok((0..desc.size).map(|i| desc.worker_id(i)).collect())
}

/// §4.8 `add_callback_module`: register a lifecycle observer.
pub fn add_callback_module<P, R>(
    name: &str,
    module_name: impl Into<String>,
    callback: Arc<dyn PoolCallback>,
) -> Result<(), PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let desc = descriptor::<P, R>(name)?;
    desc.events.add(module_name, callback);
    Ok(())
}

/// §4.8 `remove_callback_module`: unregister a lifecycle observer.
pub fn remove_callback_module<P, R>(name: &str, module_name: &str) -> Result<(), PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let desc = descriptor::<P, R>(name)?;
    desc.events.remove(module_name);
    Ok(())
}

/// Test-only hook: force worker `index` in `name`'s pool to exit its thread,
/// to exercise the one-for-one restart path (§4.2, §8 scenario 5). Not part
/// of the pool's operational API.
#[doc(hidden)]
pub fn kill_worker_for_test<P, R>(name: &str, index: usize) -> Result<(), PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let desc = descriptor::<P, R>(name)?;
    desc.supervisor.kill_worker_for_test(index)
}
