//! Stats snapshots (§4.6).

use std::time::Duration;

use crate::config::PoolOptions;

/// Per-worker entry in a [`PoolStats`] snapshot.
#[derive(Debug, Clone)]
pub struct WorkerStats {
    /// Worker identifier.
    pub id: String,
    /// Current mailbox length.
    pub mailbox_len: usize,
    /// Payload of the in-progress task, if any (suppressed when idle).
    pub current_payload: Option<String>,
    /// Elapsed runtime of the in-progress task, if any.
    pub current_elapsed: Option<Duration>,
}

/// A point-in-time snapshot of a pool, produced by `stats(name)` (§4.6,
/// §6). Workers whose process has disappeared are omitted, not errored on.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Pool name.
    pub name: String,
    /// Supervisor identifier (a stable label, not an OS handle).
    pub supervisor_id: String,
    /// Normalized options the pool was started with.
    pub options: PoolOptions,
    /// Number of workers.
    pub size: usize,
    /// Current round-robin cursor value (`1..=size`).
    pub cursor: usize,
    /// Seconds-since-epoch timestamp of pool creation (§3).
    pub birth_time: u64,
    /// Sum of per-worker mailbox lengths plus the queue manager's pending
    /// task count.
    pub total_message_queue_len: usize,
    /// Pending casts waiting in the queue manager (§3, §4.6).
    pub pending_casts: usize,
    /// Pending deadline-bound calls waiting in the queue manager.
    pub pending_calls: usize,
    /// Pending send-requests waiting in the queue manager.
    pub pending_send_requests: usize,
    /// Per-worker detail.
    pub workers: Vec<WorkerStats>,
}
