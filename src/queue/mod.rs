// src/queue/mod.rs

//! Regeneration scheduling.
//!
//! - [`task`] defines the task record and the heap ordering.
//! - [`regen_queue`] is the dependency-gated priority queue with retries.
//! - [`status`] holds the observability snapshot.

pub mod regen_queue;
pub mod status;
pub mod task;

pub use regen_queue::RegenerationQueue;
pub use status::QueueStatus;
pub use task::{DEFAULT_MAX_ATTEMPTS, RegenerationTask};
