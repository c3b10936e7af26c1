//! Builders that assemble a pool's supervision tree from configuration.

pub mod pool_builder;

pub use pool_builder::{start_link, stop};
