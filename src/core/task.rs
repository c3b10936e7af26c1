//! Identifiers and the per-worker "current task" marker (§3, §9).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A worker's identifier, a deterministic function of `(pool name, index)`
/// so a descriptor can be reconstructed from the pool name and a child
/// count alone (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(pub(crate) String);

impl WorkerId {
    /// Build the deterministic identifier for `index` within `pool`.
    #[must_use]
    pub fn new(pool: &str, index: usize) -> Self {
        Self(format!("{pool}/worker-{index}"))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide monotonic task id generator.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh task id, unique within the process.
#[must_use]
pub fn next_task_id() -> u64 {
    NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
}

/// What kind of submission a pending task represents (§3: Pending Task).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Fire-and-forget; the caller never waits for a reply.
    Cast,
    /// Synchronous call bounded by an end-to-end deadline.
    Call,
    /// Asynchronous call: the caller gets a handle immediately, the reply
    /// arrives later.
    SendRequest,
}

/// The marker a worker keeps while a task is in progress (§3: Worker Unit,
/// §9: "Current task" marker).
///
/// Readers (the stats collector) access this opportunistically via
/// `try_lock` and treat any contention as "no task", per the design note
/// that a torn read must never be treated as a task in progress.
#[derive(Debug, Clone)]
pub struct CurrentTask {
    /// Task identifier.
    pub task_id: u64,
    /// When execution started.
    pub started_at: Instant,
    /// `Debug` rendering of the payload, used for stats (§4.6).
    pub payload_debug: String,
}

impl CurrentTask {
    /// Elapsed runtime since the task started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_is_deterministic() {
        assert_eq!(WorkerId::new("p", 3).to_string(), "p/worker-3");
        assert_eq!(WorkerId::new("p", 3), WorkerId::new("p", 3));
        assert_ne!(WorkerId::new("p", 3), WorkerId::new("p", 4));
    }

    #[test]
    fn task_ids_are_unique_and_increasing() {
        let a = next_task_id();
        let b = next_task_id();
        assert!(b > a);
    }
}
