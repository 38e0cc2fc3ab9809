// src/queue/task.rs

//! Regeneration task records and their heap ordering.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Metadata, NodeId, Priority, TaskStatus};

/// Default number of attempts before a task is recorded as permanently failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// One unit of regeneration work for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenerationTask {
    pub node_id: NodeId,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    /// Insertion order; breaks ties between equal priorities.
    pub sequence: u64,
    pub reason: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl RegenerationTask {
    pub(crate) fn new(
        node_id: &str,
        priority: Priority,
        reason: &str,
        metadata: Metadata,
        sequence: u64,
        max_attempts: u32,
    ) -> Self {
        Self {
            node_id: node_id.to_string(),
            priority,
            created_at: Utc::now(),
            sequence,
            reason: reason.to_string(),
            status: TaskStatus::Pending,
            attempts: 0,
            max_attempts,
            metadata,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Heap slot pointing at a pending task.
///
/// Slots are never updated in place: a priority change pushes a fresh slot
/// with a new `generation`, and slots whose generation no longer matches the
/// pending task are dropped when popped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeapEntry {
    pub priority: Priority,
    pub sequence: u64,
    pub generation: u64,
    pub node_id: NodeId,
}

impl Ord for HeapEntry {
    // `BinaryHeap` is a max-heap: the "greatest" entry is the most urgent,
    // i.e. lowest priority value, then lowest sequence.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.generation.cmp(&self.generation))
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
