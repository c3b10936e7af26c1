//! Builds and publishes a pool's supervision tree (§4.1, §4.2): the
//! `start_link` entry point.

use std::sync::Arc;

use tracing::info;

use crate::config::PoolOptions;
use crate::core::error::PoolError;
use crate::core::executor::TaskExecutor;
use crate::core::registry;
use crate::core::supervisor::PoolSupervisor;

/// Start a new pool named `name` with `options`, executing every task with
/// `executor`. Fails if a pool with the same name is already running, or
/// if `options` fails validation (§6, §7 `invalid_request`).
pub fn start_link<P, R, E>(
    name: impl Into<String>,
    options: PoolOptions,
    executor: E,
) -> Result<(), PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
    E: TaskExecutor<P, R>,
{
    let name = name.into();
    if registry::lookup_supervisor::<PoolSupervisor<P, R>>(&name).is_some() {
        return Err(PoolError::InvalidRequest);
    }

    let supervisor = PoolSupervisor::<P, R>::start_link(name.clone(), options, executor)?;
    registry::publish_supervisor(&name, supervisor);

    info!(pool = %name, "pool started");
    Ok(())
}

/// Stop a running pool, tearing down its entire supervision tree
/// (§6 `stop`).
pub fn stop<P, R>(name: &str) -> Result<(), PoolError>
where
    P: Send + std::fmt::Debug + 'static,
    R: Send + 'static,
{
    let supervisor = registry::lookup_supervisor::<PoolSupervisor<P, R>>(name)
        .ok_or_else(|| PoolError::NoWorkers(name.to_string()))?;
    registry::remove_supervisor(name);

    // The supervisor is the sole remaining owner once removed from the
    // registry (the registry held the only other strong reference); its
    // `Drop` impl runs the full one-for-all shutdown sequence.
    drop(supervisor);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolOptions;
    use crate::core::executor::FnExecutor;

    #[test]
    fn starting_the_same_name_twice_is_rejected() {
        let options = PoolOptions::new().with_workers(1);
        let executor = FnExecutor::new(|x: i32| async move { x });
        start_link::<i32, i32, _>("pool-builder-dup", options.clone(), executor.clone()).unwrap();

        let result = start_link::<i32, i32, _>("pool-builder-dup", options, executor);
        assert_eq!(result, Err(PoolError::InvalidRequest));

        stop::<i32, i32>("pool-builder-dup").unwrap();
    }

    #[test]
    fn stopping_an_unknown_pool_is_no_workers() {
        let result = stop::<i32, i32>("pool-builder-missing");
        assert_eq!(
            result,
            Err(PoolError::NoWorkers("pool-builder-missing".into()))
        );
    }
}
