// src/dag/node.rs

//! Node and edge records stored in the dependency graph.

use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EdgeType, Metadata, NodeId, NodeType};

/// Key of the scheduling flag set by `mark_for_regeneration`.
pub const NEEDS_REGENERATION: &str = "needs_regeneration";
/// Key holding the reason recorded alongside [`NEEDS_REGENERATION`].
pub const REGENERATION_REASON: &str = "regeneration_reason";

/// A vertex: one story/pipeline artifact or pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    /// Domain attributes plus the scheduling flags.
    #[serde(default)]
    pub data: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>, node_type: NodeType, name: impl Into<String>, data: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            node_type,
            name: name.into(),
            data,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn needs_regeneration(&self) -> bool {
        self.data
            .get(NEEDS_REGENERATION)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn regeneration_reason(&self) -> Option<&str> {
        self.data.get(REGENERATION_REASON).and_then(|v| v.as_str())
    }

    pub(crate) fn set_regeneration_flag(&mut self, reason: &str) {
        self.data
            .insert(NEEDS_REGENERATION.to_string(), serde_json::Value::Bool(true));
        self.data.insert(
            REGENERATION_REASON.to_string(),
            serde_json::Value::String(reason.to_string()),
        );
        self.updated_at = Utc::now();
    }

    pub(crate) fn clear_regeneration_flag(&mut self) {
        self.data
            .insert(NEEDS_REGENERATION.to_string(), serde_json::Value::Bool(false));
        self.data.remove(REGENERATION_REASON);
        self.updated_at = Utc::now();
    }

    /// Content fingerprint over the name and domain data.
    ///
    /// Scheduling flags are left out so that marking a node stale does not
    /// count as a content change. `serde_json::Map` iterates in key order, so
    /// the serialised form is canonical.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(self.name.as_bytes());
        hasher.update(&[0]);
        for (key, value) in self.data.iter() {
            if key == NEEDS_REGENERATION || key == REGENERATION_REASON {
                continue;
            }
            hasher.update(key.as_bytes());
            hasher.update(&[0]);
            hasher.update(value.to_string().as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// A directed relationship `source -> target` (target is downstream).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: NodeId,
    pub target_id: NodeId,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    /// Propagation priority hint.
    pub weight: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GraphEdge {
    pub fn new(
        source_id: impl Into<NodeId>,
        target_id: impl Into<NodeId>,
        edge_type: EdgeType,
        weight: f64,
        metadata: Metadata,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type,
            weight,
            metadata,
        }
    }
}

/// Serializable copy of the whole graph, nodes and edges sorted by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}
