// src/engine/event.rs

//! Change events and propagation outcomes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChangeType, Metadata, NodeId};

/// An edit to an upstream artifact.
///
/// Fields are fixed once the builder chain ends; the engine's history keeps
/// its own clone of every event it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationEvent {
    source_node_id: NodeId,
    change_type: ChangeType,
    old_value: Option<serde_json::Value>,
    new_value: Option<serde_json::Value>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    metadata: Metadata,
}

impl PropagationEvent {
    pub fn new(source_node_id: impl Into<NodeId>, change_type: ChangeType) -> Self {
        Self {
            source_node_id: source_node_id.into(),
            change_type,
            old_value: None,
            new_value: None,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_values(
        mut self,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn source_node_id(&self) -> &str {
        &self.source_node_id
    }

    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    pub fn old_value(&self) -> Option<&serde_json::Value> {
        self.old_value.as_ref()
    }

    pub fn new_value(&self) -> Option<&serde_json::Value> {
        self.new_value.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Caller-supplied attributes; [`QueueingHandler`](super::QueueingHandler)
    /// copies them onto the tasks it queues.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Human-readable reason recorded on nodes flagged by this event.
    pub fn reason(&self) -> String {
        format!("{} on {}", self.change_type, self.source_node_id)
    }
}

/// Outcome of one `propagate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationResult {
    pub source_node_id: NodeId,
    /// Every downstream node, in propagation order.
    pub affected_nodes: Vec<NodeId>,
    pub propagated: Vec<NodeId>,
    pub failed: Vec<NodeId>,
    pub skipped: Vec<NodeId>,
    /// Error message per failed node.
    pub errors: BTreeMap<NodeId, String>,
}

impl PropagationResult {
    pub fn new(source_node_id: impl Into<NodeId>, affected_nodes: Vec<NodeId>) -> Self {
        Self {
            source_node_id: source_node_id.into(),
            affected_nodes,
            propagated: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}
