// src/dag/pipeline_flow.rs

//! Seeding of the canonical story-production pipeline topology.
//!
//! ```text
//! output_pitch ──► pipeline_world_bible ──► output_world_config
//!      │                                          │
//!      └──────────────► pipeline_story ◄──────────┘
//!                            │
//!                       output_script
//!                      │            │
//!          pipeline_directing   generator_procedural
//!                      │            │
//!                     output_visual_script ─────────────┐
//!                            │                          │
//!                   system_tag_reference                │
//!                            │                          │
//!                  output_tag_references ──► output_storyboard_prompts
//! ```
//!
//! Pipeline executions refer to these ids by convention (`output_<type>`,
//! `pipeline_<name>`), so they are part of the public surface.

use tracing::{debug, info};

use crate::dag::graph::DependencyGraph;
use crate::errors::Result;
use crate::types::{EdgeType, Metadata, NodeId, NodeType};

pub const OUTPUT_PITCH: &str = "output_pitch";
pub const PIPELINE_WORLD_BIBLE: &str = "pipeline_world_bible";
pub const OUTPUT_WORLD_CONFIG: &str = "output_world_config";
pub const PIPELINE_STORY: &str = "pipeline_story";
pub const OUTPUT_SCRIPT: &str = "output_script";
pub const PIPELINE_DIRECTING: &str = "pipeline_directing";
pub const GENERATOR_PROCEDURAL: &str = "generator_procedural";
pub const OUTPUT_VISUAL_SCRIPT: &str = "output_visual_script";
pub const SYSTEM_TAG_REFERENCE: &str = "system_tag_reference";
pub const OUTPUT_TAG_REFERENCES: &str = "output_tag_references";
pub const OUTPUT_STORYBOARD_PROMPTS: &str = "output_storyboard_prompts";

const FLOW_NODES: &[(&str, NodeType, &str)] = &[
    (OUTPUT_PITCH, NodeType::Pitch, "Pitch"),
    (PIPELINE_WORLD_BIBLE, NodeType::Pipeline, "World Bible Pipeline"),
    (OUTPUT_WORLD_CONFIG, NodeType::WorldConfig, "World Configuration"),
    (PIPELINE_STORY, NodeType::Pipeline, "Story Pipeline"),
    (OUTPUT_SCRIPT, NodeType::Script, "Script"),
    (PIPELINE_DIRECTING, NodeType::Pipeline, "Directing Pipeline"),
    (GENERATOR_PROCEDURAL, NodeType::Pipeline, "Procedural Generator"),
    (OUTPUT_VISUAL_SCRIPT, NodeType::VisualScript, "Visual Script"),
    (SYSTEM_TAG_REFERENCE, NodeType::Pipeline, "Tag Reference System"),
    (OUTPUT_TAG_REFERENCES, NodeType::TagReference, "Tag References"),
    (OUTPUT_STORYBOARD_PROMPTS, NodeType::StoryboardPrompt, "Storyboard Prompts"),
];

const FLOW_EDGES: &[(&str, &str, EdgeType)] = &[
    (OUTPUT_PITCH, PIPELINE_WORLD_BIBLE, EdgeType::Consumes),
    (PIPELINE_WORLD_BIBLE, OUTPUT_WORLD_CONFIG, EdgeType::Produces),
    (OUTPUT_PITCH, PIPELINE_STORY, EdgeType::Consumes),
    (OUTPUT_WORLD_CONFIG, PIPELINE_STORY, EdgeType::Consumes),
    (PIPELINE_STORY, OUTPUT_SCRIPT, EdgeType::Produces),
    (OUTPUT_SCRIPT, PIPELINE_DIRECTING, EdgeType::Consumes),
    (OUTPUT_SCRIPT, GENERATOR_PROCEDURAL, EdgeType::Consumes),
    (PIPELINE_DIRECTING, OUTPUT_VISUAL_SCRIPT, EdgeType::Produces),
    (GENERATOR_PROCEDURAL, OUTPUT_VISUAL_SCRIPT, EdgeType::Produces),
    (OUTPUT_VISUAL_SCRIPT, SYSTEM_TAG_REFERENCE, EdgeType::Consumes),
    (SYSTEM_TAG_REFERENCE, OUTPUT_TAG_REFERENCES, EdgeType::Produces),
    (OUTPUT_TAG_REFERENCES, OUTPUT_STORYBOARD_PROMPTS, EdgeType::Transforms),
    (OUTPUT_VISUAL_SCRIPT, OUTPUT_STORYBOARD_PROMPTS, EdgeType::DerivedFrom),
];

/// Ids of every node the canonical flow registers.
pub fn pipeline_node_ids() -> Vec<NodeId> {
    FLOW_NODES.iter().map(|(id, _, _)| id.to_string()).collect()
}

/// Seed the canonical pipeline nodes and edges into `graph`.
///
/// Safe to call more than once: nodes that already exist are left untouched
/// (their data and version are kept), edges are refreshed in place.
/// Returns the ids of the nodes created by this call.
pub fn register_pipeline_flow(graph: &DependencyGraph) -> Result<Vec<NodeId>> {
    let mut created = Vec::new();

    for (id, node_type, name) in FLOW_NODES {
        if graph.contains_node(id) {
            debug!(node = %id, "pipeline node already registered; keeping it");
            continue;
        }
        graph.add_node(id, *node_type, name, Metadata::new())?;
        created.push(id.to_string());
    }

    for (source, target, edge_type) in FLOW_EDGES {
        graph.add_edge(source, target, *edge_type, 1.0, Metadata::new())?;
    }

    info!(
        created = created.len(),
        edges = FLOW_EDGES.len(),
        "registered pipeline flow"
    );
    Ok(created)
}
