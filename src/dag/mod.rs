// src/dag/mod.rs

//! Dependency graph of story and pipeline artifacts.
//!
//! - [`graph`] holds the thread-safe DAG and its mutation/query operations.
//! - [`node`] defines the node and edge records and the scheduling flags.
//! - [`traversal`] implements reachability and topological ordering.
//! - [`pipeline_flow`] seeds the canonical production pipeline on top of the
//!   generic graph.

pub mod graph;
pub mod node;
pub mod pipeline_flow;
pub mod traversal;

pub use graph::DependencyGraph;
pub use node::{GraphEdge, GraphNode, GraphSnapshot, NEEDS_REGENERATION, REGENERATION_REASON};
pub use pipeline_flow::{pipeline_node_ids, register_pipeline_flow};
