//! The worker supervisor (§4.2): one-for-one restart of individual
//! workers: a polling monitor thread that notices a dead worker thread and
//! respawns a replacement in its slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use tokio::sync::oneshot;

use crate::config::ShutdownKind;
use crate::core::error::PoolError;
use crate::core::event_manager::{EventManager, WorkerDeathReason};
use crate::core::executor::TaskExecutor;
use crate::core::queue_manager::QueueManager;
use crate::core::task::WorkerId;
use crate::core::time_checker::TimeChecker;
use crate::core::worker::{WorkerHandle, WorkerMsg};

const MONITOR_INTERVAL: Duration = Duration::from_millis(50);

/// Owns the pool's worker pool proper and restarts any worker whose thread
/// exits unexpectedly.
pub(crate) struct WorkerSupervisor<P, R> {
    pool: String,
    workers: Arc<Mutex<Vec<WorkerHandle<P, R>>>>,
    stopping: Arc<AtomicBool>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    shutdown_kind: ShutdownKind,
}

impl<P, R> WorkerSupervisor<P, R>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    /// Start `size` workers and a monitor thread that restarts any that die.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn start<E>(
        pool: String,
        size: usize,
        executor: E,
        task_budget: Duration,
        time_checker: Arc<TimeChecker>,
        queue_manager: Arc<QueueManager<P, R>>,
        events: Arc<EventManager>,
        shutdown_kind: ShutdownKind,
    ) -> Self
    where
        E: TaskExecutor<P, R>,
    {
        let mut initial = Vec::with_capacity(size);
        for index in 0..size {
            let id = WorkerId::new(&pool, index);
            events.dispatch_worker_creation(&pool, &id.to_string());
            initial.push(WorkerHandle::spawn(
                id,
                executor.clone(),
                task_budget,
                Arc::clone(&time_checker),
                Arc::clone(&queue_manager),
            ));
        }

        let workers = Arc::new(Mutex::new(initial));
        let stopping = Arc::new(AtomicBool::new(false));

        let monitor_pool = pool.clone();
        let monitor_workers = Arc::clone(&workers);
        let monitor_stopping = Arc::clone(&stopping);
        let monitor = thread::Builder::new()
            .name(format!("{pool}-worker-supervisor"))
            .spawn(move || {
                monitor_loop(
                    &monitor_pool,
                    &monitor_workers,
                    &monitor_stopping,
                    executor,
                    task_budget,
                    &time_checker,
                    &queue_manager,
                    &events,
                );
            })
            .expect("failed to spawn worker supervisor monitor thread");

        Self {
            pool,
            workers,
            stopping,
            monitor: Mutex::new(Some(monitor)),
            shutdown_kind,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.workers.lock().len()
    }

    /// Whether this supervisor's own monitor thread has exited, used by the
    /// top-level pool supervisor's one-for-all health check (§4.5).
    pub(crate) fn is_dead(&self) -> bool {
        self.monitor.lock().as_ref().is_some_and(JoinHandle::is_finished)
    }

    pub(crate) fn mailbox_lens(&self) -> Vec<(WorkerId, usize)> {
        self.workers
            .lock()
            .iter()
            .map(|w| (w.id.clone(), w.mailbox_len()))
            .collect()
    }

    pub(crate) fn current_tasks(
        &self,
    ) -> Vec<(WorkerId, Option<crate::core::task::CurrentTask>)> {
        self.workers
            .lock()
            .iter()
            .map(|w| (w.id.clone(), w.current_task()))
            .collect()
    }

    /// Send a task straight to worker `index`'s mailbox, bypassing the
    /// queue manager entirely. Used by the direct dispatch strategies
    /// (§4.3: `best_worker`, `random_worker`, `next_worker`, `hash_worker`)
    /// and by `broadcast`.
    pub(crate) fn dispatch_to(
        &self,
        index: usize,
        task_id: u64,
        payload: P,
        reply: Option<oneshot::Sender<Result<R, PoolError>>>,
    ) -> Result<(), PoolError> {
        let workers = self.workers.lock();
        let worker = workers
            .get(index)
            .ok_or_else(|| PoolError::NoWorkers(self.pool.clone()))?;
        worker
            .tx
            .send(WorkerMsg::Task {
                task_id,
                payload,
                reply,
            })
            .map_err(|_| PoolError::NoWorkers(self.pool.clone()))
    }

    /// Test-only hook (§8 scenario 5, crash isolation/restart): deliver
    /// `Shutdown` straight to worker `index`'s mailbox without going through
    /// [`Self::shutdown`], so its thread actually exits instead of being
    /// joined and released. Lets a test exercise the one-for-one restart
    /// path end to end instead of only asserting the tree came up.
    #[doc(hidden)]
    pub(crate) fn kill_worker_for_test(&self, index: usize) -> Result<(), PoolError> {
        let workers = self.workers.lock();
        let worker = workers
            .get(index)
            .ok_or_else(|| PoolError::NoWorkers(self.pool.clone()))?;
        worker
            .tx
            .send(WorkerMsg::Shutdown)
            .map_err(|_| PoolError::NoWorkers(self.pool.clone()))
    }

    /// Stop every worker. `Brutal` detaches immediately, abandoning any
    /// in-flight task; `Graceful(timeout)` waits up to `timeout` for workers
    /// to drain their current task before falling back to a brutal detach
    /// (§6 `pool_sup_shutdown`).
    pub(crate) fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);

        if let ShutdownKind::Graceful { timeout } = self.shutdown_kind {
            let deadline = std::time::Instant::now() + timeout;
            loop {
                let still_running = self
                    .workers
                    .lock()
                    .iter()
                    .any(|w| w.current_task().is_some());
                if !still_running || std::time::Instant::now() >= deadline {
                    if still_running {
                        warn!(pool = %self.pool, "graceful shutdown timed out, detaching remaining workers");
                    }
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
        }

        {
            let mut workers = self.workers.lock();
            for worker in workers.iter_mut() {
                worker.shutdown();
            }
        }
        if let Some(join) = self.monitor.lock().take() {
            let _ = join.join();
        }
        info!(pool = %self.pool, "worker supervisor stopped");
    }
}

impl<P, R> Drop for WorkerSupervisor<P, R> {
    fn drop(&mut self) {
        if self.monitor.lock().is_some() {
            self.shutdown();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn monitor_loop<P, R, E>(
    pool: &str,
    workers: &Mutex<Vec<WorkerHandle<P, R>>>,
    stopping: &AtomicBool,
    executor: E,
    task_budget: Duration,
    time_checker: &Arc<TimeChecker>,
    queue_manager: &Arc<QueueManager<P, R>>,
    events: &EventManager,
) where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
    E: TaskExecutor<P, R>,
{
    while !stopping.load(Ordering::SeqCst) {
        thread::sleep(MONITOR_INTERVAL);
        if stopping.load(Ordering::SeqCst) {
            break;
        }

        let mut dead_indices = Vec::new();
        {
            let guard = workers.lock();
            for (index, worker) in guard.iter().enumerate() {
                if worker.is_dead() {
                    dead_indices.push((index, worker.id.clone()));
                }
            }
        }

        for (index, id) in dead_indices {
            events.dispatch_worker_death(pool, &id.to_string(), &WorkerDeathReason::Panic(
                "worker thread exited unexpectedly".into(),
            ));
            let replacement = WorkerHandle::spawn(
                id.clone(),
                executor.clone(),
                task_budget,
                Arc::clone(time_checker),
                Arc::clone(queue_manager),
            );
            events.dispatch_worker_creation(pool, &id.to_string());
            let mut guard = workers.lock();
            if index < guard.len() {
                guard[index] = replacement;
            }
        }
    }
}
