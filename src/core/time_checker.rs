//! The overrun watchdog (§2, §4.5, §4.7 "Overrun").
//!
//! Workers notify this component when a task starts and stops; if a task
//! runs longer than its configured budget, the configured
//! [`OverrunAction`] fires exactly once per task. Per §1 Non-goals, the
//! time checker's own interface is all this spec covers — the pool does not
//! shed load or cancel the running task on overrun.

use std::collections::{HashMap, HashSet};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::{OverrunAction, OverrunEvent};
use crate::core::task::WorkerId;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub(crate) enum TimeCheckerMsg {
    Start {
        worker: WorkerId,
        task_id: u64,
        budget: Duration,
    },
    Stop {
        worker: WorkerId,
        task_id: u64,
    },
    Shutdown,
}

/// Handle to a running time checker thread.
pub(crate) struct TimeChecker {
    tx: Sender<TimeCheckerMsg>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl TimeChecker {
    pub(crate) fn start(pool: String, overrun: OverrunAction) -> Self {
        let (tx, rx): (Sender<TimeCheckerMsg>, Receiver<TimeCheckerMsg>) = unbounded();

        let join = thread::Builder::new()
            .name(format!("{pool}-time-checker"))
            .spawn(move || run(&pool, overrun, &rx))
            .expect("failed to spawn time checker thread");

        Self {
            tx,
            join: Mutex::new(Some(join)),
        }
    }

    pub(crate) fn notify_start(&self, worker: WorkerId, task_id: u64, budget: Duration) {
        let _ = self.tx.send(TimeCheckerMsg::Start {
            worker,
            task_id,
            budget,
        });
    }

    pub(crate) fn notify_stop(&self, worker: WorkerId, task_id: u64) {
        let _ = self.tx.send(TimeCheckerMsg::Stop { worker, task_id });
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.tx.send(TimeCheckerMsg::Shutdown);
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

impl Drop for TimeChecker {
    fn drop(&mut self) {
        if self.join.lock().is_some() {
            self.shutdown();
        }
    }
}

fn run(pool: &str, overrun: OverrunAction, rx: &Receiver<TimeCheckerMsg>) {
    let mut running: HashMap<(WorkerId, u64), (Instant, Duration)> = HashMap::new();
    let mut reported: HashSet<(WorkerId, u64)> = HashSet::new();

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(TimeCheckerMsg::Start {
                worker,
                task_id,
                budget,
            }) => {
                running.insert((worker, task_id), (Instant::now(), budget));
            }
            Ok(TimeCheckerMsg::Stop { worker, task_id }) => {
                let key = (worker, task_id);
                running.remove(&key);
                reported.remove(&key);
            }
            Ok(TimeCheckerMsg::Shutdown) => break,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }

        for ((worker, task_id), (started, budget)) in &running {
            if reported.contains(&(worker.clone(), *task_id)) {
                continue;
            }
            let elapsed = started.elapsed();
            if elapsed > *budget {
                let event = OverrunEvent {
                    pool: pool.to_string(),
                    worker: worker.to_string(),
                    task_id: *task_id,
                    elapsed,
                    budget: *budget,
                };
                match &overrun {
                    OverrunAction::Warn => {
                        warn!(
                            pool = %event.pool,
                            worker = %event.worker,
                            task_id = event.task_id,
                            elapsed_ms = event.elapsed.as_millis() as u64,
                            budget_ms = event.budget.as_millis() as u64,
                            "task exceeded its overrun budget"
                        );
                    }
                    OverrunAction::Callback(f) => f(event),
                }
                reported.insert((worker.clone(), *task_id));
            }
        }
    }
    debug!(pool, "time checker stopped");
}
