// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod queue;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::dag::DependencyGraph;
use crate::engine::{PropagationEngine, PropagationEvent, QueueingHandler, Selection};
use crate::exec::{FnRegenerator, WorkerPool};
use crate::queue::RegenerationQueue;
use crate::types::{ChangeType, Metadata, NodeId, Priority, PropagationStrategy};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - dependency graph construction
/// - propagation engine / regeneration queue / worker pool
/// depending on the subcommand.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;
    let graph = Arc::new(DependencyGraph::from_config(&cfg)?);

    match args.command {
        Command::Show { json } => print_graph(&graph, json)?,
        Command::Mark { node, reason } => {
            let mut marked: Vec<NodeId> = graph
                .mark_for_regeneration(&node, &reason)?
                .into_iter()
                .collect();
            marked.sort();
            println!("marked {} node(s) for regeneration:", marked.len());
            for id in marked {
                println!("  - {id}");
            }
        }
        Command::Propagate {
            node,
            change,
            strategy,
            select,
        } => propagate(&cfg, graph, &node, change, strategy, &select)?,
        Command::Regenerate {
            node,
            fail,
            priority,
        } => regenerate(&cfg, graph, node.as_deref(), &fail, priority).await?,
    }

    Ok(())
}

fn build_queue(cfg: &ConfigFile, graph: Arc<DependencyGraph>) -> Arc<RegenerationQueue> {
    Arc::new(
        RegenerationQueue::new(graph, cfg.config.max_concurrent)
            .with_max_attempts(cfg.config.max_attempts),
    )
}

fn propagate(
    cfg: &ConfigFile,
    graph: Arc<DependencyGraph>,
    node: &str,
    change: ChangeType,
    strategy: Option<PropagationStrategy>,
    select: &[String],
) -> Result<()> {
    let engine = PropagationEngine::new(Arc::clone(&graph), cfg.config.default_strategy);
    let strategy = strategy.unwrap_or(cfg.config.default_strategy);

    let queue = build_queue(cfg, graph);
    if strategy == PropagationStrategy::Queued {
        engine.register_handler(change, QueueingHandler::new(Arc::clone(&queue), Priority::Normal));
    }

    let selected: Option<HashSet<NodeId>> = if select.is_empty() {
        None
    } else {
        let selection = Selection::from_patterns(select)?;
        let affected = engine.calculate_affected(node, change)?;
        let chosen = selection.select(affected.iter());
        info!(
            patterns = ?selection.patterns(),
            selected = chosen.len(),
            affected = affected.len(),
            "resolved node selection"
        );
        Some(chosen)
    };

    let mut metadata = Metadata::new();
    metadata.insert("origin".to_string(), serde_json::Value::from("cli"));
    if !select.is_empty() {
        metadata.insert("select".to_string(), serde_json::Value::from(select.to_vec()));
    }
    let event = PropagationEvent::new(node, change).with_metadata(metadata);
    let result = engine.propagate(event, Some(strategy), selected.as_ref())?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if strategy == PropagationStrategy::Queued {
        println!("{}", serde_json::to_string_pretty(&queue.get_status())?);
    }
    Ok(())
}

async fn regenerate(
    cfg: &ConfigFile,
    graph: Arc<DependencyGraph>,
    node: Option<&str>,
    fail: &[String],
    priority: Priority,
) -> Result<()> {
    if let Some(node) = node {
        graph.mark_for_regeneration(node, "regenerate requested from cli")?;
    }

    let queue = build_queue(cfg, Arc::clone(&graph));
    let tasks = queue.enqueue_flagged(priority)?;
    info!(
        queued = tasks.len(),
        priority = priority.value(),
        "starting simulated regeneration"
    );

    let failing = Selection::from_patterns(fail)?;
    queue.set_regenerator(Arc::new(FnRegenerator::new(move |node_id, _metadata| {
        debug!(node = %node_id, "simulated regeneration");
        Ok(!failing.matches(node_id))
    })));

    let status = WorkerPool::new(Arc::clone(&queue))?.run_until_idle().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    for failure in queue.failures() {
        println!("  ! {failure}");
    }
    Ok(())
}

/// Print nodes in dependency order with their direct dependencies.
fn print_graph(graph: &DependencyGraph, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&graph.snapshot())?);
        return Ok(());
    }

    println!(
        "storydag graph ({} nodes, {} edges)",
        graph.node_count(),
        graph.edge_count()
    );
    for id in graph.topological_order() {
        let node = graph.get_node(&id)?;
        let flag = if node.needs_regeneration() { " [stale]" } else { "" };
        println!("  - {id} ({}, v{}){flag}", node.node_type, node.version);

        let deps = graph.get_dependencies(&id)?;
        if !deps.is_empty() {
            println!("      after: {:?}", deps);
        }
    }

    debug!("graph listing complete");
    Ok(())
}
