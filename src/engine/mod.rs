// src/engine/mod.rs

//! Change propagation engine.
//!
//! Given a [`PropagationEvent`] on one node, the engine asks the dependency
//! graph for the downstream closure, orders it, and applies the configured
//! [`PropagationStrategy`](crate::types::PropagationStrategy) node by node:
//! either by calling the handler registered for the event's change type, or
//! by flagging the node for regeneration.
//!
//! - [`event`] holds the event and result records.
//! - [`handlers`] defines the handler trait and the queue-backed handler.
//! - [`selection`] builds glob-based selections for the selective strategy.
//! - [`propagation`] is the engine itself.

pub mod event;
pub mod handlers;
pub mod propagation;
pub mod selection;

pub use event::{PropagationEvent, PropagationResult};
pub use handlers::{PropagationHandler, QueueingHandler};
pub use propagation::PropagationEngine;
pub use selection::Selection;
