// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{EdgeType, Metadata, NodeType, PropagationStrategy};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// max_concurrent = 3
/// max_attempts = 3
/// default_strategy = "immediate"
/// seed_pipeline_flow = true
///
/// [node.hero]
/// type = "character"
/// name = "Hero"
/// data = { role = "lead" }
///
/// [[edge]]
/// source = "hero"
/// target = "scene_1"
/// type = "appears_in"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Scheduling behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Nodes from `[node.<id>]`, keyed by node id.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,

    /// Edges from `[[edge]]`, in declaration order.
    #[serde(default)]
    pub edge: Vec<EdgeConfig>,
}

/// Validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub node: BTreeMap<String, NodeConfig>,
    pub edge: Vec<EdgeConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        node: BTreeMap<String, NodeConfig>,
        edge: Vec<EdgeConfig>,
    ) -> Self {
        Self { config, node, edge }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Upper bound on simultaneously in-progress regenerations.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Attempts per task before it is recorded as permanently failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Strategy used by `propagate` when the caller does not pass one.
    #[serde(default)]
    pub default_strategy: PropagationStrategy,

    /// Seed the canonical pipeline flow before adding declared nodes.
    #[serde(default = "default_seed_pipeline_flow")]
    pub seed_pipeline_flow: bool,
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_attempts() -> u32 {
    crate::queue::DEFAULT_MAX_ATTEMPTS
}

fn default_seed_pipeline_flow() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_attempts: default_max_attempts(),
            default_strategy: PropagationStrategy::default(),
            seed_pipeline_flow: default_seed_pipeline_flow(),
        }
    }
}

/// `[node.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Display name; defaults to the node id.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub data: Metadata,
}

/// `[[edge]]` entry: `target` is downstream of `source`.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    pub source: String,
    pub target: String,

    #[serde(rename = "type", default)]
    pub edge_type: EdgeType,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub metadata: Metadata,
}

fn default_weight() -> f64 {
    1.0
}
