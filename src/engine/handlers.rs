// src/engine/handlers.rs

//! Pluggable per-change-type propagation handlers.

use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use crate::engine::event::PropagationEvent;
use crate::queue::RegenerationQueue;
use crate::types::Priority;

/// Reaction to a change reaching one affected node.
///
/// `Ok(true)` means the node was handled, `Ok(false)` or `Err` mark it failed.
/// Handlers run without any graph or queue lock held, so they may be slow and
/// may call back into either structure.
pub trait PropagationHandler: Send + Sync {
    fn handle(&self, node_id: &str, event: &PropagationEvent) -> anyhow::Result<bool>;
}

impl<F> PropagationHandler for F
where
    F: Fn(&str, &PropagationEvent) -> anyhow::Result<bool> + Send + Sync,
{
    fn handle(&self, node_id: &str, event: &PropagationEvent) -> anyhow::Result<bool> {
        self(node_id, event)
    }
}

/// Handler implementing the "queued" policy: every affected node is flagged
/// on the graph and handed to a [`RegenerationQueue`].
pub struct QueueingHandler {
    queue: Arc<RegenerationQueue>,
    priority: Priority,
}

impl QueueingHandler {
    pub fn new(queue: Arc<RegenerationQueue>, priority: Priority) -> Self {
        Self { queue, priority }
    }
}

impl PropagationHandler for QueueingHandler {
    fn handle(&self, node_id: &str, event: &PropagationEvent) -> anyhow::Result<bool> {
        let reason = event.reason();
        let mut metadata = event.metadata().clone();
        metadata.insert(
            "source_node_id".to_string(),
            serde_json::Value::String(event.source_node_id().to_string()),
        );
        metadata.insert(
            "change_type".to_string(),
            serde_json::Value::String(event.change_type().to_string()),
        );

        let task = self
            .queue
            .add(node_id, self.priority, &reason, metadata)
            .with_context(|| format!("queueing {node_id} for regeneration"))?;
        // Queued before flagging: a completion racing with this call then
        // either sees the pending task or clears the flag before it is set.
        self.queue
            .graph()
            .flag_node(node_id, &reason)
            .with_context(|| format!("flagging {node_id} for regeneration"))?;
        debug!(node = %node_id, priority = ?task.priority, "queued affected node");
        Ok(true)
    }
}
