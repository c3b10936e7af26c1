//! The queue manager: central serializer for the "available worker"
//! strategies (§4.3).
//!
//! Modeled as a long-running thread owning its two queues, with all
//! mutations driven by messages on a single input channel (§9) — this
//! preserves single-consumer serialization without explicit locks, since
//! the thread owning the queues exclusively is the only mutator.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::QueueType;
use crate::core::error::PoolError;
use crate::core::task::{TaskKind, WorkerId};
use crate::core::worker::WorkerMsg;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct PendingEntry<P, R> {
    task_id: u64,
    payload: P,
    deadline: Option<Instant>,
    reply: Option<oneshot::Sender<Result<R, PoolError>>>,
    kind: TaskKind,
}

/// Breakdown of the pending-task queue by submission kind (§3, §4.6).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PendingCounts {
    pub(crate) casts: usize,
    pub(crate) calls: usize,
    pub(crate) send_requests: usize,
}

enum Msg<P, R> {
    CallOrRequest {
        payload: P,
        deadline: Option<Instant>,
        reply: oneshot::Sender<Result<R, PoolError>>,
        kind: TaskKind,
    },
    Cast {
        payload: P,
    },
    WorkerReady {
        worker: WorkerId,
        tx: Sender<WorkerMsg<P, R>>,
    },
    PendingCount {
        reply: Sender<usize>,
    },
    PendingByKind {
        reply: Sender<PendingCounts>,
    },
    Shutdown,
}

/// Handle to a running queue manager thread, generic over the pool's
/// payload and result types.
pub(crate) struct QueueManager<P, R> {
    tx: Sender<Msg<P, R>>,
    join: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl<P, R> QueueManager<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    pub(crate) fn start(pool: String, queue_type: QueueType) -> Self {
        let (tx, rx): (Sender<Msg<P, R>>, Receiver<Msg<P, R>>) = unbounded();

        let join = thread::Builder::new()
            .name(format!("{pool}-queue-manager"))
            .spawn(move || run(&pool, queue_type, &rx))
            .expect("failed to spawn queue manager thread");

        Self {
            tx,
            join: parking_lot::Mutex::new(Some(join)),
        }
    }

    /// §4.3 `call_available_worker`/`send_request_available_worker`
    /// enqueue path: non-blocking send of the request; the reply arrives on
    /// `reply` whenever a worker matches it or its deadline is reaped.
    /// `kind` distinguishes the two callers for `pending_by_kind` (§3, §4.6).
    pub(crate) fn enqueue_call(
        &self,
        payload: P,
        deadline: Option<Instant>,
        reply: oneshot::Sender<Result<R, PoolError>>,
        kind: TaskKind,
    ) -> Result<(), PoolError> {
        self.tx
            .send(Msg::CallOrRequest {
                payload,
                deadline,
                reply,
                kind,
            })
            .map_err(|_| PoolError::NoProc("queue manager channel closed".into()))
    }

    /// §4.3 `cast_to_available_worker`: never fails for the caller.
    pub(crate) fn enqueue_cast(&self, payload: P) {
        let _ = self.tx.send(Msg::Cast { payload });
    }

    /// A worker finished its task and is ready for more work.
    pub(crate) fn notify_ready(&self, worker: WorkerId, tx: Sender<WorkerMsg<P, R>>) {
        let _ = self.tx.send(Msg::WorkerReady { worker, tx });
    }

    /// §4.3 `pending_task_count`.
    pub(crate) fn pending_count(&self) -> usize {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Msg::PendingCount { reply: reply_tx }).is_err() {
            return 0;
        }
        reply_rx.recv_timeout(Duration::from_secs(2)).unwrap_or(0)
    }

    /// Pending-task breakdown by submission kind, for `stats(name)` (§4.6).
    pub(crate) fn pending_by_kind(&self) -> PendingCounts {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Msg::PendingByKind { reply: reply_tx }).is_err() {
            return PendingCounts::default();
        }
        reply_rx.recv_timeout(Duration::from_secs(2)).unwrap_or_default()
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(join) = self.join.lock().take() {
            let _ = join.join();
        }
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.join
            .lock()
            .as_ref()
            .is_some_and(JoinHandle::is_finished)
    }
}

impl<P, R> Drop for QueueManager<P, R> {
    fn drop(&mut self) {
        if self.join.lock().is_some() {
            self.shutdown();
        }
    }
}

fn run<P, R>(pool: &str, queue_type: QueueType, rx: &Receiver<Msg<P, R>>)
where
    P: Send + 'static,
    R: Send + 'static,
{
    // Invariant (§4.3): at any moment at most one of `pending` and `waiting`
    // is non-empty — both sides immediately match a head element of the
    // other on arrival.
    let mut pending: VecDeque<PendingEntry<P, R>> = VecDeque::new();
    let mut waiting: VecDeque<(WorkerId, Sender<WorkerMsg<P, R>>)> = VecDeque::new();

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Msg::CallOrRequest {
                payload,
                deadline,
                reply,
                kind,
            }) => {
                reap_expired(&mut pending);
                let task_id = crate::core::task::next_task_id();
                if let Some((worker, tx)) = next_ready_worker(&mut waiting) {
                    dispatch(&worker, &tx, task_id, payload, Some(reply));
                } else {
                    pending.push_back(PendingEntry {
                        task_id,
                        payload,
                        deadline,
                        reply: Some(reply),
                        kind,
                    });
                }
            }
            Ok(Msg::Cast { payload }) => {
                reap_expired(&mut pending);
                let task_id = crate::core::task::next_task_id();
                if let Some((worker, tx)) = next_ready_worker(&mut waiting) {
                    dispatch(&worker, &tx, task_id, payload, None);
                } else {
                    pending.push_back(PendingEntry {
                        task_id,
                        payload,
                        deadline: None,
                        reply: None,
                        kind: TaskKind::Cast,
                    });
                }
            }
            Ok(Msg::WorkerReady { worker, tx }) => {
                reap_expired(&mut pending);
                if let Some(entry) = pop_pending(&mut pending, queue_type) {
                    dispatch(&worker, &tx, entry.task_id, entry.payload, entry.reply);
                } else {
                    waiting.push_back((worker, tx));
                }
            }
            Ok(Msg::PendingCount { reply }) => {
                reap_expired(&mut pending);
                let _ = reply.send(pending.len());
            }
            Ok(Msg::PendingByKind { reply }) => {
                reap_expired(&mut pending);
                let mut counts = PendingCounts::default();
                for entry in &pending {
                    match entry.kind {
                        TaskKind::Cast => counts.casts += 1,
                        TaskKind::Call => counts.calls += 1,
                        TaskKind::SendRequest => counts.send_requests += 1,
                    }
                }
                let _ = reply.send(counts);
            }
            Ok(Msg::Shutdown) => break,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                reap_expired(&mut pending);
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(pool, "queue manager stopped");
}

fn next_ready_worker<P, R>(
    waiting: &mut VecDeque<(WorkerId, Sender<WorkerMsg<P, R>>)>,
) -> Option<(WorkerId, Sender<WorkerMsg<P, R>>)> {
    waiting.pop_front()
}

fn pop_pending<P, R>(
    pending: &mut VecDeque<PendingEntry<P, R>>,
    queue_type: QueueType,
) -> Option<PendingEntry<P, R>> {
    match queue_type {
        QueueType::Fifo => pending.pop_front(),
        QueueType::Lifo => pending.pop_back(),
    }
}

fn dispatch<P, R>(
    worker: &WorkerId,
    tx: &Sender<WorkerMsg<P, R>>,
    task_id: u64,
    payload: P,
    reply: Option<oneshot::Sender<Result<R, PoolError>>>,
) {
    if tx
        .send(WorkerMsg::Task {
            task_id,
            payload,
            reply,
        })
        .is_err()
    {
        warn!(worker = %worker, "failed to dispatch to worker, mailbox closed");
    }
}

fn reap_expired<P, R>(pending: &mut VecDeque<PendingEntry<P, R>>) {
    let now = Instant::now();
    let before = pending.len();
    pending.retain_mut(|entry| {
        let expired = entry.deadline.is_some_and(|d| d <= now);
        if expired {
            if let Some(reply) = entry.reply.take() {
                let _ = reply.send(Err(PoolError::Timeout));
            }
        }
        !expired
    });
    let reaped = before - pending.len();
    if reaped > 0 {
        debug!(reaped, "reaped expired calls from queue manager");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::WorkerId;

    #[test]
    fn pending_count_tracks_unmatched_casts() {
        let qm: QueueManager<u32, u32> = QueueManager::start("p".into(), QueueType::Fifo);
        assert_eq!(qm.pending_count(), 0);
        qm.enqueue_cast(1);
        qm.enqueue_cast(2);
        // Give the manager thread a moment to process.
        thread::sleep(Duration::from_millis(30));
        assert_eq!(qm.pending_count(), 2);
    }

    #[test]
    fn worker_ready_matches_a_pending_cast() {
        let qm: QueueManager<u32, u32> = QueueManager::start("p".into(), QueueType::Fifo);
        qm.enqueue_cast(7);
        thread::sleep(Duration::from_millis(20));

        let (wtx, wrx) = crossbeam_channel::unbounded::<WorkerMsg<u32, u32>>();
        qm.notify_ready(WorkerId::new("p", 0), wtx);

        let msg = wrx.recv_timeout(Duration::from_millis(200)).unwrap();
        match msg {
            WorkerMsg::Task { payload, .. } => assert_eq!(payload, 7),
            WorkerMsg::Shutdown => panic!("expected Task"),
        }
        assert_eq!(qm.pending_count(), 0);
    }

    #[tokio::test]
    async fn call_times_out_when_never_matched() {
        let qm: QueueManager<u32, u32> = QueueManager::start("p".into(), QueueType::Fifo);
        let (reply_tx, reply_rx) = oneshot::channel();
        qm.enqueue_call(
            1,
            Some(Instant::now() + Duration::from_millis(30)),
            reply_tx,
            TaskKind::Call,
        )
        .unwrap();

        let result = reply_rx.await.unwrap();
        assert_eq!(result, Err(PoolError::Timeout));
        assert_eq!(qm.pending_count(), 0);
    }
}
