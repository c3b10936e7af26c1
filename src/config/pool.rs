//! Pool configuration: the options bag accepted by `start_link`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Queue discipline used by the queue manager when no worker is immediately
/// available (§4.3). FIFO is the default; LIFO favors freshness over
/// arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueType {
    /// First-in, first-out (default).
    Fifo,
    /// Last-in, first-out.
    Lifo,
}

impl Default for QueueType {
    fn default() -> Self {
        Self::Fifo
    }
}

/// Shutdown kind for the worker supervisor (§4.5: all other children are
/// always "brutal").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownKind {
    /// Detach worker threads immediately; in-flight tasks are abandoned.
    Brutal,
    /// Wait up to the given duration for in-flight tasks to finish before
    /// detaching.
    Graceful {
        /// Grace period before falling back to a brutal detach.
        #[serde(with = "duration_secs")]
        timeout: Duration,
    },
}

impl Default for ShutdownKind {
    fn default() -> Self {
        Self::Brutal
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// What to do when a task exceeds its configured wall-clock budget (§4.7,
/// the time checker's overrun signal).
#[derive(Clone)]
pub enum OverrunAction {
    /// Emit a `tracing::warn!` with the task's context (the default).
    Warn,
    /// Invoke a user-supplied handler with the offending task's context.
    Callback(Arc<dyn Fn(OverrunEvent) + Send + Sync>),
}

impl fmt::Debug for OverrunAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => write!(f, "OverrunAction::Warn"),
            Self::Callback(_) => write!(f, "OverrunAction::Callback(..)"),
        }
    }
}

impl Default for OverrunAction {
    fn default() -> Self {
        Self::Warn
    }
}

/// Context passed to an [`OverrunAction::Callback`] when a task runs longer
/// than the configured budget.
#[derive(Debug, Clone)]
pub struct OverrunEvent {
    /// Pool the overrunning task belongs to.
    pub pool: String,
    /// Worker currently running the task.
    pub worker: String,
    /// Task identifier.
    pub task_id: u64,
    /// How long the task has been running.
    pub elapsed: Duration,
    /// Configured budget that was exceeded.
    pub budget: Duration,
}

/// Options accepted by [`crate::runtime::start_link`] (§6).
#[derive(Clone)]
pub struct PoolOptions {
    /// Number of worker units (default 100).
    pub workers: usize,
    /// Queue discipline for the "available worker" strategies.
    pub queue_type: QueueType,
    /// Action taken when a task exceeds its wall-clock budget.
    pub overrun_handler: OverrunAction,
    /// Default per-task overrun budget used by the time checker.
    pub task_budget: Duration,
    /// Shutdown kind for the worker supervisor.
    pub pool_sup_shutdown: ShutdownKind,
    /// Max restarts allowed within `pool_sup_period` before the pool
    /// supervisor gives up (one-for-all escalation, §4.5).
    pub pool_sup_intensity: u32,
    /// Sliding window, in seconds, over which `pool_sup_intensity` is
    /// measured.
    pub pool_sup_period: u64,
    /// Whether to start the optional event/callback manager.
    pub enable_callbacks: bool,
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("workers", &self.workers)
            .field("queue_type", &self.queue_type)
            .field("overrun_handler", &self.overrun_handler)
            .field("task_budget", &self.task_budget)
            .field("pool_sup_shutdown", &self.pool_sup_shutdown)
            .field("pool_sup_intensity", &self.pool_sup_intensity)
            .field("pool_sup_period", &self.pool_sup_period)
            .field("enable_callbacks", &self.enable_callbacks)
            .finish()
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: 100,
            queue_type: QueueType::Fifo,
            overrun_handler: OverrunAction::Warn,
            task_budget: Duration::from_secs(5),
            pool_sup_shutdown: ShutdownKind::Brutal,
            pool_sup_intensity: 5,
            pool_sup_period: 60,
            enable_callbacks: false,
        }
    }
}

impl PoolOptions {
    /// Start from the documented defaults (§6).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the queue discipline.
    #[must_use]
    pub fn with_queue_type(mut self, queue_type: QueueType) -> Self {
        self.queue_type = queue_type;
        self
    }

    /// Install a custom overrun handler, replacing the default warning log.
    #[must_use]
    pub fn with_overrun_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(OverrunEvent) + Send + Sync + 'static,
    {
        self.overrun_handler = OverrunAction::Callback(Arc::new(handler));
        self
    }

    /// Set the per-task overrun budget watched by the time checker.
    #[must_use]
    pub fn with_task_budget(mut self, budget: Duration) -> Self {
        self.task_budget = budget;
        self
    }

    /// Set the worker supervisor's shutdown kind.
    #[must_use]
    pub fn with_pool_sup_shutdown(mut self, kind: ShutdownKind) -> Self {
        self.pool_sup_shutdown = kind;
        self
    }

    /// Set the one-for-all restart intensity and period.
    #[must_use]
    pub fn with_restart_intensity(mut self, intensity: u32, period_secs: u64) -> Self {
        self.pool_sup_intensity = intensity;
        self.pool_sup_period = period_secs;
        self
    }

    /// Enable the optional callback/event manager.
    #[must_use]
    pub fn with_callbacks_enabled(mut self, enabled: bool) -> Self {
        self.enable_callbacks = enabled;
        self
    }

    /// Validate option values before a pool is started.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".into());
        }
        if self.pool_sup_period == 0 {
            return Err("pool_sup_period must be greater than 0".into());
        }
        Ok(())
    }
}

/// Serializable projection of [`PoolOptions`] for declaring pools from
/// external configuration. The engine does no file I/O itself (packaging and
/// config-file parsing are out of scope, §1) but the shape is kept
/// serde-friendly so embedding applications can load it however they like.
/// The `overrun_handler` and `task_budget` always take their defaults when
/// converted back, since a callback cannot be represented in data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolOptionsConfig {
    /// Number of worker units.
    pub workers: usize,
    /// Queue discipline.
    #[serde(default)]
    pub queue_type: QueueType,
    /// Worker supervisor shutdown kind.
    #[serde(default)]
    pub pool_sup_shutdown: ShutdownKind,
    /// One-for-all restart intensity.
    #[serde(default = "default_intensity")]
    pub pool_sup_intensity: u32,
    /// One-for-all restart period, in seconds.
    #[serde(default = "default_period")]
    pub pool_sup_period: u64,
    /// Whether to start the callback manager.
    #[serde(default)]
    pub enable_callbacks: bool,
}

fn default_intensity() -> u32 {
    5
}

fn default_period() -> u64 {
    60
}

impl PoolOptionsConfig {
    /// Validate this configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".into());
        }
        if self.pool_sup_period == 0 {
            return Err("pool_sup_period must be greater than 0".into());
        }
        Ok(())
    }
}

impl From<PoolOptionsConfig> for PoolOptions {
    fn from(cfg: PoolOptionsConfig) -> Self {
        Self {
            workers: cfg.workers,
            queue_type: cfg.queue_type,
            overrun_handler: OverrunAction::Warn,
            task_budget: Duration::from_secs(5),
            pool_sup_shutdown: cfg.pool_sup_shutdown,
            pool_sup_intensity: cfg.pool_sup_intensity,
            pool_sup_period: cfg.pool_sup_period,
            enable_callbacks: cfg.enable_callbacks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let opts = PoolOptions::default();
        assert_eq!(opts.workers, 100);
        assert_eq!(opts.queue_type, QueueType::Fifo);
        assert_eq!(opts.pool_sup_intensity, 5);
        assert_eq!(opts.pool_sup_period, 60);
        assert!(!opts.enable_callbacks);
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let opts = PoolOptions::default().with_workers(0);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = PoolOptionsConfig {
            workers: 8,
            queue_type: QueueType::Lifo,
            pool_sup_shutdown: ShutdownKind::Brutal,
            pool_sup_intensity: 3,
            pool_sup_period: 30,
            enable_callbacks: true,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: PoolOptionsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.workers, 8);
        assert_eq!(back.queue_type, QueueType::Lifo);
        assert_eq!(back.pool_sup_intensity, 3);
        assert!(back.enable_callbacks);
    }

    #[test]
    fn config_into_options_uses_default_overrun_handler() {
        let cfg = PoolOptionsConfig {
            workers: 4,
            queue_type: QueueType::Fifo,
            pool_sup_shutdown: ShutdownKind::Brutal,
            pool_sup_intensity: 5,
            pool_sup_period: 60,
            enable_callbacks: false,
        };
        let opts: PoolOptions = cfg.into();
        assert!(matches!(opts.overrun_handler, OverrunAction::Warn));
    }
}
