// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::types::NodeId;

#[derive(Error, Debug)]
pub enum StorydagError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Edge not found: {source_id} -> {target_id}")]
    EdgeNotFound { source_id: NodeId, target_id: NodeId },

    #[error("Node already exists: {0}")]
    DuplicateNode(NodeId),

    #[error("Adding edge would create a cycle: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<NodeId> },

    #[error("No in-progress task for node: {0}")]
    TaskNotInProgress(NodeId),

    #[error("Regeneration of '{node_id}' failed after {attempts} attempt(s)")]
    RegenerationFailed { node_id: NodeId, attempts: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StorydagError>;
