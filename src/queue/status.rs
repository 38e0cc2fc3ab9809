// src/queue/status.rs

use serde::Serialize;

use crate::types::NodeId;

/// Point-in-time counters of the regeneration queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct QueueStatus {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub max_concurrent: usize,
    /// Nodes currently being regenerated, sorted.
    pub in_progress_nodes: Vec<NodeId>,
    /// Nodes that exhausted their attempts, sorted.
    pub failed_nodes: Vec<NodeId>,
}

impl QueueStatus {
    /// No pending and no in-progress work.
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.in_progress == 0
    }
}
