//! The pool's public API surface (§6): starting, stopping, dispatching to,
//! and inspecting a pool.

pub mod api;

pub use api::{
    add_callback_module, best_worker, broadcast, call_available_worker,
    cast_to_available_worker, get_workers, hash_worker, next_available_worker, next_worker,
    nth_worker, random_worker, remove_callback_module, send_request_available_worker,
    start_link, stats, stop,
};
