//! Library-visible error taxonomy for the dispatch and queueing engine.

use thiserror::Error;

/// Errors reported to callers of the public dispatch API.
///
/// This is the complete taxonomy from the design: every failure a client can
/// observe is one of these variants, never a panic or a bare `String`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool name is unknown, or its top supervisor is dead.
    #[error("no workers: pool `{0}` is unknown or its supervisor is dead")]
    NoWorkers(String),

    /// Every worker was busy for a strategy that requires an immediate match.
    #[error("no available workers in pool `{0}`")]
    NoAvailableWorkers(String),

    /// The deadline elapsed before a match or reply arrived.
    #[error("operation timed out")]
    Timeout,

    /// The queue manager for the pool is not running.
    #[error("queue manager for pool `{0}` is not running")]
    NoProc(String),

    /// A worker received a payload it does not understand.
    #[error("invalid request")]
    InvalidRequest,

    /// The task itself raised during execution.
    ///
    /// Carries a human-readable reason; the original panic payload/error is
    /// not `Send + 'static`-safe to propagate in general, so it is captured
    /// as a string at the catch site.
    #[error("task failed: {0}")]
    TaskFailure(String),
}

/// Application-facing result for bring-up/config code, matching the split
/// between library errors (`PoolError`) and higher-level context
/// (`anyhow::Error`) used for pool construction.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_stable() {
        assert_eq!(
            PoolError::NoWorkers("p".into()).to_string(),
            "no workers: pool `p` is unknown or its supervisor is dead"
        );
        assert_eq!(PoolError::Timeout.to_string(), "operation timed out");
        assert_eq!(
            PoolError::NoAvailableWorkers("p".into()).to_string(),
            "no available workers in pool `p`"
        );
    }
}
