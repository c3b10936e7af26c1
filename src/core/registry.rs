//! The pool registry (§4.1): a process-wide, lock-free-read map from pool
//! name to descriptor, written once per pool start and lazily rebuilt on a
//! cache miss whenever the underlying supervisor is still alive (§8,
//! scenario: registry entry lost but supervisor alive).
//!
//! A single `Lazy`-initialized table guarded by a reader-writer lock rather
//! than a lock per pool, with a type-erased side table since pools are
//! generic over their payload/result types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::PoolOptions;
use crate::core::event_manager::EventManager;
use crate::core::executor::TaskExecutor;
use crate::core::queue_manager::QueueManager;
use crate::core::supervisor::PoolSupervisor;
use crate::core::task::WorkerId;
use crate::core::time_checker::TimeChecker;
use crate::core::worker_supervisor::WorkerSupervisor;
use crate::util::clock::now_secs;

/// Everything a dispatch strategy or `stats()` call needs about a running
/// pool (§4.1).
pub(crate) struct PoolDescriptor<P, R> {
    pub(crate) name: String,
    pub(crate) options: PoolOptions,
    pub(crate) size: usize,
    pub(crate) cursor: AtomicUsize,
    /// §3 Data Model: seconds-since-epoch timestamp of pool creation.
    pub(crate) birth_time: u64,
    pub(crate) supervisor: Arc<WorkerSupervisor<P, R>>,
    pub(crate) queue_manager: Arc<QueueManager<P, R>>,
    pub(crate) time_checker: Arc<TimeChecker>,
    pub(crate) events: Arc<EventManager>,
}

impl<P, R> PoolDescriptor<P, R>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    /// Assemble a descriptor from an already-running tree of components.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_for_supervisor(
        name: String,
        options: PoolOptions,
        supervisor: Arc<WorkerSupervisor<P, R>>,
        queue_manager: Arc<QueueManager<P, R>>,
        time_checker: Arc<TimeChecker>,
        events: Arc<EventManager>,
    ) -> Self {
        let size = options.workers;
        Self {
            name,
            options,
            size,
            cursor: AtomicUsize::new(0),
            birth_time: now_secs(),
            supervisor,
            queue_manager,
            time_checker,
            events,
        }
    }

    pub(crate) fn worker_id(&self, index: usize) -> WorkerId {
        WorkerId::new(&self.name, index)
    }

    /// §6 `next(n, descriptor)`: the `n`-th worker identifier, without
    /// touching the round-robin cursor.
    pub(crate) fn next(&self, n: usize) -> Option<WorkerId> {
        (n < self.size).then(|| self.worker_id(n))
    }

    /// §9: "atomic round-robin counter... a single compare-and-swap attempt
    /// with no retry loop on contention" — a lost race is accepted rather
    /// than retried, trading perfect fairness for a wait-free fast path.
    pub(crate) fn next_index(&self) -> usize {
        let current = self.cursor.load(Ordering::Relaxed);
        let next = (current + 1) % self.size;
        let _ = self
            .cursor
            .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed);
        current % self.size
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

type AnyDescriptor = Arc<dyn Any + Send + Sync>;

struct RegistryEntry {
    descriptor: AnyDescriptor,
}

static REGISTRY: Lazy<RwLock<HashMap<String, RegistryEntry>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Separate process-wide table of running `PoolSupervisor`s, keyed by pool
/// name, so `stop(name)` (§6) can find and tear one down without the
/// caller needing to keep the handle `start_link` returned.
static SUPERVISORS: Lazy<RwLock<HashMap<String, AnyDescriptor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub(crate) fn publish_supervisor<T: Any + Send + Sync>(name: &str, supervisor: Arc<T>) {
    SUPERVISORS
        .write()
        .insert(name.to_string(), supervisor as AnyDescriptor);
}

pub(crate) fn lookup_supervisor<T: Any + Send + Sync>(name: &str) -> Option<Arc<T>> {
    let entry = SUPERVISORS.read().get(name).map(Arc::clone)?;
    entry.downcast::<T>().ok()
}

pub(crate) fn remove_supervisor(name: &str) {
    SUPERVISORS.write().remove(name);
}

/// Publish a newly started pool's descriptor under `name`. Called exactly
/// once per pool start, from `start_link` (§4.1: "write-once-per-pool-start").
pub(crate) fn publish<P, R>(name: &str, descriptor: Arc<PoolDescriptor<P, R>>)
where
    P: Send + 'static,
    R: Send + 'static,
{
    REGISTRY
        .write()
        .insert(name.to_string(), RegistryEntry { descriptor });
}

/// Look up a running pool's descriptor by name (§4.1).
///
/// A lock-free read path: readers only ever take the shared side of the
/// `RwLock`. A cache hit is still verified against the pool's top-level
/// supervisor: if that supervisor's monitor thread has exited, the stale
/// entry is evicted and treated as a miss. A miss — whether the entry was
/// never there or was just evicted — falls through to [`rebuild`], which
/// republishes a fresh descriptor if the supervisor is in fact still alive
/// (§8 scenario 6: registry entry lost but supervisor alive).
pub(crate) fn lookup<P, R>(name: &str) -> Option<Arc<PoolDescriptor<P, R>>>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    if let Some(entry) = REGISTRY.read().get(name).map(|e| Arc::clone(&e.descriptor)) {
        if let Ok(descriptor) = entry.downcast::<PoolDescriptor<P, R>>() {
            if is_alive::<P, R>(name) {
                return Some(descriptor);
            }
            remove(name);
            return None;
        }
    }
    rebuild(name)
}

/// Republish a descriptor for `name` from its top-level supervisor, if that
/// supervisor is still alive. Used by [`lookup`] to recover from a registry
/// entry that was lost (evicted, or never published) while the pool itself
/// is still running (§4.1, §8 scenario 6).
pub(crate) fn rebuild<P, R>(name: &str) -> Option<Arc<PoolDescriptor<P, R>>>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let supervisor = lookup_supervisor::<PoolSupervisor<P, R>>(name)?;
    if supervisor.is_dead() {
        remove_supervisor(name);
        return None;
    }
    let descriptor = supervisor.snapshot_descriptor();
    publish(name, Arc::clone(&descriptor));
    Some(descriptor)
}

/// Remove a pool's entry, called on pool shutdown.
pub(crate) fn remove(name: &str) {
    REGISTRY.write().remove(name);
}

/// Whether `name`'s top-level supervisor is still alive, i.e. its monitor
/// thread has not exited. Distinguishes "evicted from the registry but
/// still running" from "actually gone".
pub(crate) fn is_alive<P, R>(name: &str) -> bool
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    lookup_supervisor::<PoolSupervisor<P, R>>(name).is_some_and(|sup| !sup.is_dead())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OverrunAction, PoolOptions, QueueType};
    use crate::core::executor::FnExecutor;

    fn test_descriptor(name: &str) -> Arc<PoolDescriptor<i32, i32>> {
        let options = PoolOptions::new().with_workers(1);
        let time_checker = Arc::new(TimeChecker::start(name.to_string(), OverrunAction::Warn));
        let queue_manager = Arc::new(QueueManager::start(name.to_string(), QueueType::Fifo));
        let events = Arc::new(EventManager::new());
        let executor = FnExecutor::new(|x: i32| async move { x });
        let supervisor = Arc::new(WorkerSupervisor::start(
            name.to_string(),
            1,
            executor,
            options.task_budget,
            Arc::clone(&time_checker),
            Arc::clone(&queue_manager),
            Arc::clone(&events),
            options.pool_sup_shutdown,
        ));
        Arc::new(PoolDescriptor {
            name: name.to_string(),
            options,
            size: 1,
            cursor: AtomicUsize::new(0),
            birth_time: crate::util::clock::now_secs(),
            supervisor,
            queue_manager,
            time_checker,
            events,
        })
    }

    #[test]
    fn publish_then_lookup_round_trips() {
        let name = "registry-roundtrip";
        let options = PoolOptions::new().with_workers(1);
        let executor = FnExecutor::new(|x: i32| async move { x });
        crate::builders::pool_builder::start_link::<i32, i32, _>(name, options, executor).unwrap();

        let found: Arc<PoolDescriptor<i32, i32>> = lookup(name).unwrap();
        assert_eq!(found.name, name);

        crate::builders::pool_builder::stop::<i32, i32>(name).unwrap();
        assert!(lookup::<i32, i32>(name).is_none());
    }

    #[test]
    fn lookup_rebuilds_a_lost_registry_entry_when_the_supervisor_survives() {
        let name = "registry-rebuild";
        let options = PoolOptions::new().with_workers(2);
        let executor = FnExecutor::new(|x: i32| async move { x });
        crate::builders::pool_builder::start_link::<i32, i32, _>(name, options, executor).unwrap();

        // Simulate the registry entry being lost while the supervisor tree
        // keeps running underneath it (§8 scenario 6: "registry rebuild").
        remove(name);
        assert!(REGISTRY.read().get(name).is_none());

        let rebuilt: Arc<PoolDescriptor<i32, i32>> = lookup(name).unwrap();
        assert_eq!(rebuilt.name, name);
        assert_eq!(rebuilt.size, 2);
        assert!(REGISTRY.read().contains_key(name));

        crate::builders::pool_builder::stop::<i32, i32>(name).unwrap();
    }

    #[test]
    fn next_index_round_robins_without_retry() {
        let desc = test_descriptor("registry-cursor");
        let seen: Vec<usize> = (0..4).map(|_| desc.next_index()).collect();
        assert_eq!(seen, vec![0, 0, 0, 0]); // size 1 always yields index 0
    }

    #[test]
    fn descriptor_stamps_a_birth_time() {
        let desc = test_descriptor("registry-birth");
        assert!(desc.birth_time > 0);
    }
}
