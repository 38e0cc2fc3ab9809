// src/exec/mod.rs

//! Regeneration execution layer.
//!
//! The queue decides *what* may run; this module decides *how* it runs.
//!
//! - [`backend`] provides the `Regenerator` trait that content generators
//!   implement, plus a closure adapter.
//! - [`worker_pool`] drives a queue with up to `max_concurrent` Tokio workers.

pub mod backend;
pub mod worker_pool;

pub use backend::{FnRegenerator, RegenerateFuture, Regenerator};
pub use worker_pool::{DEFAULT_POLL_INTERVAL, WorkerPool};
