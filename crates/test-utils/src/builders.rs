#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use storydag::config::{ConfigFile, ConfigSection, EdgeConfig, NodeConfig, RawConfigFile};
use storydag::dag::DependencyGraph;
use storydag::types::{EdgeType, Metadata, NodeType};

/// Builder for a `DependencyGraph` to simplify test setup.
///
/// Panics on any graph error; use the graph API directly when the error is
/// what the test is about.
pub struct GraphBuilder {
    graph: DependencyGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: DependencyGraph::new(),
        }
    }

    pub fn node(self, id: &str, node_type: NodeType) -> Self {
        self.graph
            .add_node(id, node_type, id, Metadata::new())
            .expect("Failed to add node in builder");
        self
    }

    /// Add several `Scene` nodes at once.
    pub fn scenes(mut self, ids: &[&str]) -> Self {
        for id in ids {
            self = self.node(id, NodeType::Scene);
        }
        self
    }

    /// `target` depends on `source`.
    pub fn edge(self, source: &str, target: &str) -> Self {
        self.edge_typed(source, target, EdgeType::DependsOn)
    }

    pub fn edge_typed(self, source: &str, target: &str, edge_type: EdgeType) -> Self {
        self.graph
            .add_edge(source, target, edge_type, 1.0, Metadata::new())
            .expect("Failed to add edge in builder");
        self
    }

    /// Chain `ids[0] -> ids[1] -> ...`, creating missing nodes as scenes.
    pub fn chain(mut self, ids: &[&str]) -> Self {
        for id in ids {
            if !self.graph.contains_node(id) {
                self = self.node(id, NodeType::Scene);
            }
        }
        for pair in ids.windows(2) {
            self = self.edge(pair[0], pair[1]);
        }
        self
    }

    pub fn with_pipeline_flow(self) -> Self {
        storydag::dag::register_pipeline_flow(&self.graph)
            .expect("Failed to register pipeline flow in builder");
        self
    }

    pub fn build(self) -> Arc<DependencyGraph> {
        Arc::new(self.graph)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ConfigFile`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection {
                    seed_pipeline_flow: false,
                    ..ConfigSection::default()
                },
                node: BTreeMap::new(),
                edge: Vec::new(),
            },
        }
    }

    pub fn with_node(mut self, id: &str, node_type: NodeType) -> Self {
        self.config.node.insert(
            id.to_string(),
            NodeConfig {
                node_type,
                name: None,
                data: Metadata::new(),
            },
        );
        self
    }

    pub fn with_edge(mut self, source: &str, target: &str) -> Self {
        self.config.edge.push(EdgeConfig {
            source: source.to_string(),
            target: target.to_string(),
            edge_type: EdgeType::DependsOn,
            weight: 1.0,
            metadata: Metadata::new(),
        });
        self
    }

    pub fn with_pipeline_flow(mut self, val: bool) -> Self {
        self.config.config.seed_pipeline_flow = val;
        self
    }

    pub fn with_max_concurrent(mut self, val: usize) -> Self {
        self.config.config.max_concurrent = val;
        self
    }

    pub fn with_max_attempts(mut self, val: u32) -> Self {
        self.config.config.max_attempts = val;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
