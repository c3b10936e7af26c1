//! Event/callback manager (§4.8): optional lifecycle event fan-out to
//! registered callback modules, following the same sink-trait shape as a
//! pluggable audit sink but dispatching lifecycle events rather than task
//! audit records.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

/// Reason a worker died, passed to [`PoolCallback::on_worker_death`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerDeathReason {
    /// The worker's task panicked.
    Panic(String),
    /// The worker was shut down as part of pool teardown.
    Shutdown,
}

/// A pool lifecycle observer. All methods default to a no-op so a callback
/// module only implements the events it cares about (§4.8).
pub trait PoolCallback: Send + Sync {
    /// The pool has started accepting work.
    fn on_init_start(&self, _pool: &str) {}
    /// A worker was created (initial start or restart).
    fn on_worker_creation(&self, _pool: &str, _worker: &str) {}
    /// A worker died.
    fn on_worker_death(&self, _pool: &str, _worker: &str, _reason: &WorkerDeathReason) {}
}

/// Registry of callback modules for one pool. Registration and removal are
/// idempotent (§4.8): registering the same name twice replaces the prior
/// entry, removing an absent name is a no-op.
pub struct EventManager {
    callbacks: RwLock<HashMap<String, Arc<dyn PoolCallback>>>,
    /// §2/§4.5: the event manager is an optional tree child. When the pool
    /// was started with `enable_callbacks = false`, registration still
    /// works but dispatch is a no-op.
    enabled: bool,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventManager {
    /// Build an enabled, empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(HashMap::new()),
            enabled: true,
        }
    }

    /// Build a manager that never dispatches, for pools started with
    /// `enable_callbacks = false`.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            callbacks: RwLock::new(HashMap::new()),
            enabled: false,
        }
    }

    /// Register (or replace) a callback module under `name`.
    pub fn add(&self, name: impl Into<String>, callback: Arc<dyn PoolCallback>) {
        self.callbacks.write().insert(name.into(), callback);
    }

    /// Remove a callback module. A no-op if `name` was never registered.
    pub fn remove(&self, name: &str) {
        self.callbacks.write().remove(name);
    }

    pub(crate) fn dispatch_init_start(&self, pool: &str) {
        self.for_each(|cb| cb.on_init_start(pool));
    }

    pub(crate) fn dispatch_worker_creation(&self, pool: &str, worker: &str) {
        self.for_each(|cb| cb.on_worker_creation(pool, worker));
    }

    pub(crate) fn dispatch_worker_death(&self, pool: &str, worker: &str, reason: &WorkerDeathReason) {
        self.for_each(|cb| cb.on_worker_death(pool, worker, reason));
    }

    /// A misbehaving callback must not take the pool down with it.
    fn for_each(&self, f: impl Fn(&Arc<dyn PoolCallback>)) {
        if !self.enabled {
            return;
        }
        let callbacks = self.callbacks.read();
        for (name, cb) in callbacks.iter() {
            if catch_unwind(AssertUnwindSafe(|| f(cb))).is_err() {
                warn!(callback = %name, "callback module panicked, continuing");
            }
        }
    }
}
