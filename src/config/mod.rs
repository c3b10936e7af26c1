//! Pool configuration: options bag, queue discipline, and shutdown kind.

pub mod pool;

pub use pool::{
    OverrunAction, OverrunEvent, PoolOptions, PoolOptionsConfig, QueueType, ShutdownKind,
};
