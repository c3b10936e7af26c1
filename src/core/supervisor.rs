//! The top-level pool supervisor (§4.1, §4.2): one-for-all lifecycle
//! management over the time checker, queue manager, event manager, and
//! worker supervisor, in that start order.
//!
//! A small lifecycle manager: one-for-all restart semantics with bounded
//! intensity measured over a sliding window (§9).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::PoolOptions;
use crate::core::error::PoolError;
use crate::core::event_manager::EventManager;
use crate::core::executor::TaskExecutor;
use crate::core::queue_manager::QueueManager;
use crate::core::registry::{self, PoolDescriptor};
use crate::core::time_checker::TimeChecker;
use crate::core::worker_supervisor::WorkerSupervisor;

const HEALTH_POLL: Duration = Duration::from_millis(100);

struct Tree<P, R> {
    time_checker: Arc<TimeChecker>,
    queue_manager: Arc<QueueManager<P, R>>,
    events: Arc<EventManager>,
    worker_supervisor: Arc<WorkerSupervisor<P, R>>,
}

fn build_tree<P, R, E>(name: &str, options: &PoolOptions, executor: E) -> Tree<P, R>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
    E: TaskExecutor<P, R>,
{
    let time_checker = Arc::new(TimeChecker::start(name.to_string(), options.overrun_handler.clone()));
    let queue_manager = Arc::new(QueueManager::start(name.to_string(), options.queue_type));
    // §2/§4.5: the event manager is an optional 4th tree child, started only
    // if `enable_callbacks` is set; otherwise it exists but never dispatches.
    let events = Arc::new(if options.enable_callbacks {
        EventManager::new()
    } else {
        EventManager::disabled()
    });
    events.dispatch_init_start(name);
    let worker_supervisor = Arc::new(WorkerSupervisor::start(
        name.to_string(),
        options.workers,
        executor,
        options.task_budget,
        Arc::clone(&time_checker),
        Arc::clone(&queue_manager),
        Arc::clone(&events),
        options.pool_sup_shutdown,
    ));
    Tree {
        time_checker,
        queue_manager,
        events,
        worker_supervisor,
    }
}

fn descriptor_from_tree<P, R>(name: &str, options: PoolOptions, tree: &Tree<P, R>) -> PoolDescriptor<P, R>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    PoolDescriptor::new_for_supervisor(
        name.to_string(),
        options,
        Arc::clone(&tree.worker_supervisor),
        Arc::clone(&tree.queue_manager),
        Arc::clone(&tree.time_checker),
        Arc::clone(&tree.events),
    )
}

/// A running pool: holds the full tree alive and watches for top-level
/// failures. On too many restarts within `pool_sup_period`, the whole
/// tree is torn down and rebuilt (one-for-all, §4.2).
pub(crate) struct PoolSupervisor<P, R> {
    name: String,
    options: PoolOptions,
    tree: Arc<Mutex<Tree<P, R>>>,
    stopping: Arc<AtomicBool>,
    monitor: Option<JoinHandle<()>>,
}

impl<P, R> PoolSupervisor<P, R>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    pub(crate) fn start_link<E>(name: String, options: PoolOptions, executor: E) -> Result<Arc<Self>, PoolError>
    where
        E: TaskExecutor<P, R>,
    {
        options
            .validate()
            .map_err(|_| PoolError::InvalidRequest)?;

        let tree = build_tree(&name, &options, executor.clone());
        let descriptor = Arc::new(descriptor_from_tree(&name, options.clone(), &tree));
        registry::publish(&name, Arc::clone(&descriptor));

        let tree = Arc::new(Mutex::new(tree));
        let stopping = Arc::new(AtomicBool::new(false));

        let monitor_name = name.clone();
        let monitor_tree = Arc::clone(&tree);
        let monitor_stopping = Arc::clone(&stopping);
        let monitor_options = options.clone();
        let monitor = thread::Builder::new()
            .name(format!("{name}-pool-supervisor"))
            .spawn(move || {
                monitor_loop(
                    &monitor_name,
                    &monitor_tree,
                    &monitor_stopping,
                    &monitor_options,
                    executor,
                );
            })
            .expect("failed to spawn pool supervisor monitor thread");

        Ok(Arc::new(Self {
            name,
            options,
            tree,
            stopping,
            monitor: Some(monitor),
        }))
    }

    /// Whether this pool's top-level supervisor thread has exited — either
    /// because it was stopped or because it gave up after exceeding
    /// `pool_sup_intensity` (§4.5). Used by the registry to evict a stale
    /// lookup hit instead of handing back a descriptor for a dead tree.
    pub(crate) fn is_dead(&self) -> bool {
        self.monitor.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Rebuild a fresh descriptor from the currently running tree, for the
    /// registry's rebuild-on-miss path (§4.1, §8 scenario 6).
    pub(crate) fn snapshot_descriptor(&self) -> Arc<PoolDescriptor<P, R>>
    where
        P: Send + std::fmt::Debug + 'static,
        R: Send + 'static,
    {
        let tree = self.tree.lock().expect("pool supervisor tree lock poisoned");
        Arc::new(descriptor_from_tree(&self.name, self.options.clone(), &tree))
    }

    pub(crate) fn shutdown(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(join) = self.monitor.take() {
            let _ = join.join();
        }
        {
            let tree = self.tree.lock().expect("pool supervisor tree lock poisoned");
            tree.worker_supervisor.shutdown();
            tree.queue_manager.shutdown();
            tree.time_checker.shutdown();
        }
        registry::remove(&self.name);
        info!(pool = %self.name, "pool supervisor stopped");
    }
}

impl<P, R> Drop for PoolSupervisor<P, R> {
    fn drop(&mut self) {
        if self.monitor.is_some() {
            self.shutdown();
        }
    }
}

fn monitor_loop<P, R, E>(
    name: &str,
    tree: &Mutex<Tree<P, R>>,
    stopping: &AtomicBool,
    options: &PoolOptions,
    executor: E,
) where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
    E: TaskExecutor<P, R>,
{
    let mut restarts: VecDeque<Instant> = VecDeque::new();
    let period = Duration::from_secs(options.pool_sup_period);

    while !stopping.load(Ordering::SeqCst) {
        thread::sleep(HEALTH_POLL);
        if stopping.load(Ordering::SeqCst) {
            break;
        }

        // The event manager has no monitor thread of its own (it only ever
        // runs on the caller's thread via `dispatch_*`), so there is nothing
        // to poll for it here.
        let unhealthy = {
            let guard = tree.lock().expect("pool supervisor tree lock poisoned");
            guard.queue_manager.is_dead()
                || guard.time_checker.is_dead()
                || guard.worker_supervisor.is_dead()
        };
        if !unhealthy {
            continue;
        }

        let now = Instant::now();
        restarts.push_back(now);
        while restarts
            .front()
            .is_some_and(|first| now.duration_since(*first) > period)
        {
            restarts.pop_front();
        }

        if restarts.len() as u32 > options.pool_sup_intensity {
            warn!(pool = name, "restart intensity exceeded, giving up");
            break;
        }

        warn!(pool = name, "top-level child died, rebuilding the pool tree");
        let mut guard = tree.lock().expect("pool supervisor tree lock poisoned");
        guard.worker_supervisor.shutdown();
        guard.queue_manager.shutdown();
        guard.time_checker.shutdown();
        *guard = build_tree(name, options, executor.clone());
        let descriptor = Arc::new(descriptor_from_tree(name, options.clone(), &guard));
        registry::publish(name, descriptor);
    }
}
