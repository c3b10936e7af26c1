//! The worker unit (§4.4): a dedicated OS thread running its own
//! single-threaded Tokio runtime, with an unbounded mailbox (§3: Worker —
//! "a dedicated execution context... mailbox (FIFO, unbounded)").

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::core::error::PoolError;
use crate::core::executor::TaskExecutor;
use crate::core::queue_manager::QueueManager;
use crate::core::task::{next_task_id, CurrentTask, WorkerId};
use crate::core::time_checker::TimeChecker;

/// A message delivered to a worker's mailbox.
pub(crate) enum WorkerMsg<P, R> {
    /// Run `payload` through the executor; reply directly to the caller
    /// when `reply` is present (§4.3: "the worker executes the task and
    /// replies directly to the caller").
    Task {
        task_id: u64,
        payload: P,
        reply: Option<oneshot::Sender<Result<R, PoolError>>>,
    },
    /// Stop the worker thread's message loop.
    Shutdown,
}

/// A running worker's handle: its identifier and mailbox sender.
pub(crate) struct WorkerHandle<P, R> {
    pub(crate) id: WorkerId,
    pub(crate) tx: Sender<WorkerMsg<P, R>>,
    current: Arc<Mutex<Option<CurrentTask>>>,
    join: Option<JoinHandle<()>>,
}

impl<P, R> WorkerHandle<P, R>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    /// Spawn a worker thread for `id`, executing tasks with `executor` and
    /// reporting overruns/readiness to `time_checker`/`queue_manager`.
    pub(crate) fn spawn<E>(
        id: WorkerId,
        executor: E,
        task_budget: Duration,
        time_checker: Arc<TimeChecker>,
        queue_manager: Arc<QueueManager<P, R>>,
    ) -> Self
    where
        E: TaskExecutor<P, R>,
    {
        let (tx, rx): (Sender<WorkerMsg<P, R>>, Receiver<WorkerMsg<P, R>>) = unbounded();
        let current = Arc::new(Mutex::new(None));

        let worker_id = id.clone();
        let current_for_thread = Arc::clone(&current);
        let tx_for_thread = tx.clone();

        let join = thread::Builder::new()
            .name(worker_id.to_string())
            .spawn(move || {
                run(
                    worker_id,
                    rx,
                    tx_for_thread,
                    executor,
                    task_budget,
                    &time_checker,
                    &queue_manager,
                    &current_for_thread,
                );
            })
            .expect("failed to spawn worker thread");

        Self {
            id,
            tx,
            current,
            join: Some(join),
        }
    }

    /// Current mailbox length (§4.6 stats).
    pub(crate) fn mailbox_len(&self) -> usize {
        self.tx.len()
    }

    /// A snapshot of the in-flight task, if any. A torn or contended read
    /// is treated as "no task", never as a false positive (§9).
    pub(crate) fn current_task(&self) -> Option<CurrentTask> {
        self.current.try_lock().and_then(|guard| guard.clone())
    }

    pub(crate) fn shutdown(&mut self) {
        let _ = self.tx.send(WorkerMsg::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }

    /// Whether the worker's OS thread has exited (panicked or otherwise
    /// stopped) without going through [`Self::shutdown`].
    pub(crate) fn is_dead(&self) -> bool {
        self.join.as_ref().is_some_and(JoinHandle::is_finished)
    }
}

impl<P, R> Drop for WorkerHandle<P, R> {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.shutdown();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run<P, R, E>(
    id: WorkerId,
    rx: Receiver<WorkerMsg<P, R>>,
    self_tx: Sender<WorkerMsg<P, R>>,
    executor: E,
    task_budget: Duration,
    time_checker: &TimeChecker,
    queue_manager: &QueueManager<P, R>,
    current: &Mutex<Option<CurrentTask>>,
) where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
    E: TaskExecutor<P, R>,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build per-worker tokio runtime");

    // Announce readiness once before entering the loop, then again after
    // every completed task.
    queue_manager.notify_ready(id.clone(), self_tx.clone());

    while let Ok(msg) = rx.recv() {
        let (task_id, payload, reply) = match msg {
            WorkerMsg::Task {
                task_id,
                payload,
                reply,
            } => (task_id, payload, reply),
            WorkerMsg::Shutdown => break,
        };

        let payload_debug = format!("{payload:?}");
        *current.lock() = Some(CurrentTask {
            task_id,
            started_at: std::time::Instant::now(),
            payload_debug,
        });
        time_checker.notify_start(id.clone(), task_id, task_budget);

        let outcome = catch_unwind(AssertUnwindSafe(|| rt.block_on(executor.execute(payload, task_id))));

        time_checker.notify_stop(id.clone(), task_id);
        *current.lock() = None;

        if let Some(reply) = reply {
            let result = match outcome {
                Ok(value) => Ok(value),
                Err(panic) => {
                    let msg = panic_message(&panic);
                    error!(worker = %id, task_id, panic = %msg, "task panicked");
                    Err(PoolError::TaskFailure(msg))
                }
            };
            // Receiver gone means the caller stopped waiting; the result
            // is discarded per §4.3.
            let _ = reply.send(result);
        } else if outcome.is_err() {
            let msg = panic_message(&outcome.unwrap_err());
            error!(worker = %id, task_id, panic = %msg, "cast task panicked");
        }

        queue_manager.notify_ready(id.clone(), self_tx.clone());
    }
    debug!(worker = %id, "worker thread stopped");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker task panicked with a non-string payload".to_string()
    }
}
