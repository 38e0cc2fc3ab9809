// src/dag/graph.rs

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::model::ConfigFile;
use crate::dag::node::{GraphEdge, GraphNode, GraphSnapshot};
use crate::dag::pipeline_flow::register_pipeline_flow;
use crate::errors::{Result, StorydagError};
use crate::types::{EdgeType, Metadata, NodeId, NodeType};

/// Internal node structure: the record plus immediate deps and dependents.
#[derive(Debug, Clone)]
struct NodeEntry {
    node: GraphNode,
    /// Direct dependencies (predecessors): nodes this one is produced from.
    deps: Vec<NodeId>,
    /// Direct dependents (successors): nodes downstream of this one.
    dependents: Vec<NodeId>,
}

/// Unsynchronised adjacency-list storage.
///
/// Only [`DependencyGraph`] owns one of these, behind its mutex.
#[derive(Debug, Default)]
pub(crate) struct GraphStore {
    nodes: HashMap<NodeId, NodeEntry>,
    edges: HashMap<(NodeId, NodeId), GraphEdge>,
}

impl GraphStore {
    pub(crate) fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub(crate) fn dependencies_of(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn dependents_of(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    fn entry(&self, id: &str) -> Result<&NodeEntry> {
        self.nodes
            .get(id)
            .ok_or_else(|| StorydagError::NodeNotFound(id.to_string()))
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut NodeEntry> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| StorydagError::NodeNotFound(id.to_string()))
    }
}

/// Thread-safe directed acyclic graph of story and pipeline artifacts.
///
/// All reads and writes go through one mutex. Critical sections never block
/// on IO or call back into user code, so sharing an `Arc<DependencyGraph>`
/// between request handlers and workers is cheap.
///
/// Acyclicity is enforced on insertion: `add_edge(s, t)` first checks whether
/// `t` already reaches `s`, and only then links the edge. A rejected edge never
/// touches the store.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    store: Mutex<GraphStore>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a validated [`ConfigFile`].
    ///
    /// Seeds the canonical pipeline flow first when
    /// `[config].seed_pipeline_flow` is set, then adds the declared nodes (in
    /// id order) and edges (in declaration order).
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let graph = Self::new();

        if cfg.config.seed_pipeline_flow {
            register_pipeline_flow(&graph)?;
        }

        for (id, node) in cfg.node.iter() {
            let name = node.name.clone().unwrap_or_else(|| id.clone());
            graph.add_node(id, node.node_type, &name, node.data.clone())?;
        }

        for edge in cfg.edge.iter() {
            graph.add_edge(
                &edge.source,
                &edge.target,
                edge.edge_type,
                edge.weight,
                edge.metadata.clone(),
            )?;
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "dependency graph built from config"
        );
        Ok(graph)
    }

    fn store(&self) -> MutexGuard<'_, GraphStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new node. Existing ids are rejected with `DuplicateNode`.
    pub fn add_node(
        &self,
        id: &str,
        node_type: NodeType,
        name: &str,
        data: Metadata,
    ) -> Result<GraphNode> {
        let mut store = self.store();
        if store.nodes.contains_key(id) {
            return Err(StorydagError::DuplicateNode(id.to_string()));
        }

        let node = GraphNode::new(id, node_type, name, data);
        store.nodes.insert(
            id.to_string(),
            NodeEntry {
                node: node.clone(),
                deps: Vec::new(),
                dependents: Vec::new(),
            },
        );
        debug!(node = %id, node_type = %node_type, "added node");
        Ok(node)
    }

    /// Insert (or refresh) the edge `source -> target`.
    ///
    /// An existing edge between the same ordered pair gets its type, weight and
    /// metadata replaced. A new edge that would close a cycle is refused with
    /// `CyclicDependency`, whose `cycle` starts and ends at `source`.
    pub fn add_edge(
        &self,
        source: &str,
        target: &str,
        edge_type: EdgeType,
        weight: f64,
        metadata: Metadata,
    ) -> Result<GraphEdge> {
        let mut store = self.store();
        store.entry(source)?;
        store.entry(target)?;

        let key = (source.to_string(), target.to_string());
        let edge = GraphEdge::new(source, target, edge_type, weight, metadata);

        if let Some(existing) = store.edges.get_mut(&key) {
            debug!(source = %source, target = %target, "edge already present; refreshing attributes");
            *existing = edge.clone();
            return Ok(edge);
        }

        if let Some(path) = store.path_between(target, source) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(source.to_string());
            cycle.extend(path);
            warn!(
                source = %source,
                target = %target,
                cycle = ?cycle,
                "rejected edge: would create a cycle"
            );
            return Err(StorydagError::CyclicDependency { cycle });
        }

        store.entry_mut(source)?.dependents.push(target.to_string());
        store.entry_mut(target)?.deps.push(source.to_string());
        store.edges.insert(key, edge.clone());
        debug!(source = %source, target = %target, edge_type = %edge_type, "added edge");
        Ok(edge)
    }

    /// Remove a node together with every incident edge.
    pub fn remove_node(&self, id: &str) -> Result<GraphNode> {
        let mut store = self.store();
        let entry = store
            .nodes
            .remove(id)
            .ok_or_else(|| StorydagError::NodeNotFound(id.to_string()))?;

        for dep in entry.deps.iter() {
            if let Some(up) = store.nodes.get_mut(dep) {
                up.dependents.retain(|d| d != id);
            }
            store.edges.remove(&(dep.clone(), id.to_string()));
        }
        for dependent in entry.dependents.iter() {
            if let Some(down) = store.nodes.get_mut(dependent) {
                down.deps.retain(|d| d != id);
            }
            store.edges.remove(&(id.to_string(), dependent.clone()));
        }

        debug!(
            node = %id,
            removed_edges = entry.deps.len() + entry.dependents.len(),
            "removed node"
        );
        Ok(entry.node)
    }

    pub fn remove_edge(&self, source: &str, target: &str) -> Result<GraphEdge> {
        let mut store = self.store();
        let edge = store
            .edges
            .remove(&(source.to_string(), target.to_string()))
            .ok_or_else(|| StorydagError::EdgeNotFound {
                source_id: source.to_string(),
                target_id: target.to_string(),
            })?;

        if let Some(up) = store.nodes.get_mut(source) {
            up.dependents.retain(|d| d != target);
        }
        if let Some(down) = store.nodes.get_mut(target) {
            down.deps.retain(|d| d != source);
        }
        debug!(source = %source, target = %target, "removed edge");
        Ok(edge)
    }

    /// Rename a node and/or merge `patch` into its data.
    ///
    /// `version` only moves when the content fingerprint changes; re-saving an
    /// identical artifact is a no-op apart from the returned copy.
    pub fn update_node(&self, id: &str, name: Option<&str>, patch: Metadata) -> Result<GraphNode> {
        let mut store = self.store();
        let entry = store.entry_mut(id)?;
        let before = entry.node.fingerprint();

        if let Some(name) = name {
            entry.node.name = name.to_string();
        }
        entry.node.data.extend(patch);

        if entry.node.fingerprint() != before {
            entry.node.version += 1;
            entry.node.updated_at = Utc::now();
            debug!(node = %id, version = entry.node.version, "node content changed");
        }

        Ok(entry.node.clone())
    }

    pub fn get_node(&self, id: &str) -> Result<GraphNode> {
        Ok(self.store().entry(id)?.node.clone())
    }

    pub fn get_edge(&self, source: &str, target: &str) -> Result<GraphEdge> {
        self.store()
            .edges
            .get(&(source.to_string(), target.to_string()))
            .cloned()
            .ok_or_else(|| StorydagError::EdgeNotFound {
                source_id: source.to_string(),
                target_id: target.to_string(),
            })
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.store().nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.store().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.store().edges.len()
    }

    /// Immediate downstream nodes of `id`.
    pub fn get_dependents(&self, id: &str) -> Result<Vec<NodeId>> {
        Ok(self.store().entry(id)?.dependents.clone())
    }

    /// Immediate upstream nodes of `id`.
    pub fn get_dependencies(&self, id: &str) -> Result<Vec<NodeId>> {
        Ok(self.store().entry(id)?.deps.clone())
    }

    /// Transitive downstream closure of `id`, excluding `id`.
    pub fn get_all_affected(&self, id: &str) -> Result<HashSet<NodeId>> {
        let store = self.store();
        store.entry(id)?;
        Ok(store.downstream_bfs(id).into_iter().collect())
    }

    /// The downstream closure of `id` in propagation order: breadth-first
    /// discovery order, adjusted so every edge between affected nodes points
    /// forward.
    pub fn propagation_order(&self, id: &str) -> Result<Vec<NodeId>> {
        let store = self.store();
        store.entry(id)?;
        let discovered = store.downstream_bfs(id);
        Ok(store.order_members(&discovered))
    }

    /// Flag `id` and its whole downstream closure as needing regeneration.
    ///
    /// Returns the set of flagged nodes (`id` included).
    pub fn mark_for_regeneration(&self, id: &str, reason: &str) -> Result<HashSet<NodeId>> {
        let mut store = self.store();
        store.entry(id)?;

        let mut marked: HashSet<NodeId> = store.downstream_bfs(id).into_iter().collect();
        marked.insert(id.to_string());

        for node_id in marked.iter() {
            if let Some(entry) = store.nodes.get_mut(node_id) {
                entry.node.set_regeneration_flag(reason);
            }
        }

        info!(
            node = %id,
            reason = %reason,
            marked = marked.len(),
            "marked node and downstream closure for regeneration"
        );
        Ok(marked)
    }

    /// Flag a single node, leaving its dependents alone.
    pub fn flag_node(&self, id: &str, reason: &str) -> Result<()> {
        let mut store = self.store();
        store.entry_mut(id)?.node.set_regeneration_flag(reason);
        debug!(node = %id, reason = %reason, "flagged node for regeneration");
        Ok(())
    }

    pub fn clear_regeneration_flag(&self, id: &str) -> Result<()> {
        let mut store = self.store();
        store.entry_mut(id)?.node.clear_regeneration_flag();
        debug!(node = %id, "cleared regeneration flag");
        Ok(())
    }

    /// All flagged nodes, sorted by id.
    pub fn get_nodes_needing_regeneration(&self) -> Vec<GraphNode> {
        let store = self.store();
        let mut nodes: Vec<GraphNode> = store
            .nodes
            .values()
            .filter(|e| e.node.needs_regeneration())
            .map(|e| e.node.clone())
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Nodes without dependencies, sorted by id.
    pub fn roots(&self) -> Vec<NodeId> {
        let store = self.store();
        let mut roots: Vec<NodeId> = store
            .nodes
            .values()
            .filter(|e| e.deps.is_empty())
            .map(|e| e.node.id.clone())
            .collect();
        roots.sort();
        roots
    }

    /// Every node in dependency order (upstream first), ties broken by id.
    pub fn topological_order(&self) -> Vec<NodeId> {
        self.store().full_order()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let store = self.store();
        let mut nodes: Vec<GraphNode> = store.nodes.values().map(|e| e.node.clone()).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<GraphEdge> = store.edges.values().cloned().collect();
        edges.sort_by(|a, b| {
            (a.source_id.as_str(), a.target_id.as_str())
                .cmp(&(b.source_id.as_str(), b.target_id.as_str()))
        });

        GraphSnapshot { nodes, edges }
    }
}
