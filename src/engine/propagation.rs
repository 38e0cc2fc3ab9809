// src/engine/propagation.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::dag::DependencyGraph;
use crate::engine::event::{PropagationEvent, PropagationResult};
use crate::engine::handlers::PropagationHandler;
use crate::errors::Result;
use crate::types::{ChangeType, NodeId, PropagationStrategy};

/// Computes the blast radius of a change and drives per-node reactions.
///
/// The engine never holds one of its own locks while a handler runs, and the
/// graph is only locked for the duration of individual graph calls.
pub struct PropagationEngine {
    graph: Arc<DependencyGraph>,
    default_strategy: Mutex<PropagationStrategy>,
    handlers: Mutex<HashMap<ChangeType, Arc<dyn PropagationHandler>>>,
    history: Mutex<Vec<PropagationEvent>>,
}

impl fmt::Debug for PropagationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropagationEngine")
            .field("default_strategy", &self.default_strategy())
            .field("history_len", &lock(&self.history).len())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What to do with one affected node under a given strategy.
fn should_act(
    strategy: PropagationStrategy,
    node_id: &str,
    selected: Option<&HashSet<NodeId>>,
) -> bool {
    match strategy {
        PropagationStrategy::Immediate | PropagationStrategy::Queued => true,
        PropagationStrategy::Manual => false,
        PropagationStrategy::Selective => selected.is_some_and(|s| s.contains(node_id)),
    }
}

impl PropagationEngine {
    pub fn new(graph: Arc<DependencyGraph>, default_strategy: PropagationStrategy) -> Self {
        Self {
            graph,
            default_strategy: Mutex::new(default_strategy),
            handlers: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn default_strategy(&self) -> PropagationStrategy {
        *lock(&self.default_strategy)
    }

    pub fn set_default_strategy(&self, strategy: PropagationStrategy) {
        *lock(&self.default_strategy) = strategy;
    }

    /// Register the handler for `change_type`, replacing any previous one.
    pub fn register_handler<H>(&self, change_type: ChangeType, handler: H)
    where
        H: PropagationHandler + 'static,
    {
        let replaced = lock(&self.handlers)
            .insert(change_type, Arc::new(handler))
            .is_some();
        debug!(change_type = %change_type, replaced, "registered propagation handler");
    }

    /// Downstream nodes of `node_id` in the order propagation visits them.
    ///
    /// The order is breadth-first from `node_id` and respects every edge
    /// between affected nodes, so a node is never visited before one of its
    /// affected dependencies.
    pub fn calculate_affected(&self, node_id: &str, change_type: ChangeType) -> Result<Vec<NodeId>> {
        let order = self.graph.propagation_order(node_id)?;
        debug!(
            node = %node_id,
            change_type = %change_type,
            affected = order.len(),
            "calculated affected nodes"
        );
        Ok(order)
    }

    /// Propagate `event` through the graph.
    ///
    /// `strategy` falls back to the engine default. `selected_nodes` is only
    /// consulted for [`PropagationStrategy::Selective`]; a missing selection
    /// selects nothing.
    pub fn propagate(
        &self,
        event: PropagationEvent,
        strategy: Option<PropagationStrategy>,
        selected_nodes: Option<&HashSet<NodeId>>,
    ) -> Result<PropagationResult> {
        let strategy = strategy.unwrap_or_else(|| self.default_strategy());
        lock(&self.history).push(event.clone());

        let affected = self.calculate_affected(event.source_node_id(), event.change_type())?;
        let handler = lock(&self.handlers).get(&event.change_type()).cloned();
        let mut result = PropagationResult::new(event.source_node_id(), affected.clone());

        for node_id in affected {
            if !should_act(strategy, &node_id, selected_nodes) {
                result.skipped.push(node_id);
                continue;
            }

            match self.act_on(&node_id, &event, handler.as_deref()) {
                Ok(()) => result.propagated.push(node_id),
                Err(message) => {
                    warn!(node = %node_id, error = %message, "propagation to node failed");
                    result.errors.insert(node_id.clone(), message);
                    result.failed.push(node_id);
                }
            }
        }

        info!(
            source = %result.source_node_id,
            change_type = %event.change_type(),
            ?strategy,
            affected = result.affected_nodes.len(),
            propagated = result.propagated.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            "propagation finished"
        );
        Ok(result)
    }

    /// Run the handler (or the default flagging action) for one node.
    ///
    /// Handler errors and panics are both turned into an error message.
    fn act_on(
        &self,
        node_id: &str,
        event: &PropagationEvent,
        handler: Option<&dyn PropagationHandler>,
    ) -> std::result::Result<(), String> {
        let Some(handler) = handler else {
            return self
                .graph
                .flag_node(node_id, &event.reason())
                .map_err(|e| e.to_string());
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(node_id, event))) {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err("handler reported failure".to_string()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(format!("handler panicked: {detail}"))
            }
        }
    }

    /// Copy of every event seen so far, oldest first.
    pub fn history(&self) -> Vec<PropagationEvent> {
        lock(&self.history).clone()
    }

    /// Events whose source is `node_id`, oldest first.
    pub fn history_for(&self, node_id: &str) -> Vec<PropagationEvent> {
        lock(&self.history)
            .iter()
            .filter(|e| e.source_node_id() == node_id)
            .cloned()
            .collect()
    }
}
