// tests/dependency_graph.rs
mod common;
use crate::common::builders::GraphBuilder;
use crate::common::init_tracing;

use std::collections::HashSet;
use std::error::Error;
use std::sync::{Arc, Barrier};
use std::thread;

use storydag::dag::DependencyGraph;
use storydag::errors::StorydagError;
use storydag::types::{EdgeType, Metadata, NodeType};

type TestResult = Result<(), Box<dyn Error>>;

fn set(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// A -> B -> D, A -> C -> D, D -> E
fn diamond() -> std::sync::Arc<DependencyGraph> {
    GraphBuilder::new()
        .scenes(&["A", "B", "C", "D", "E"])
        .edge("A", "B")
        .edge("A", "C")
        .edge("B", "D")
        .edge("C", "D")
        .edge("D", "E")
        .build()
}

#[test]
fn duplicate_node_is_rejected_and_original_kept() -> TestResult {
    init_tracing();
    let graph = DependencyGraph::new();

    let mut data = Metadata::new();
    data.insert("role".into(), "lead".into());
    graph.add_node("hero", NodeType::Character, "Hero", data)?;

    let err = graph
        .add_node("hero", NodeType::Location, "Impostor", Metadata::new())
        .unwrap_err();
    assert!(matches!(err, StorydagError::DuplicateNode(ref id) if id == "hero"));

    let node = graph.get_node("hero")?;
    assert_eq!(node.name, "Hero");
    assert_eq!(node.node_type, NodeType::Character);
    assert_eq!(node.data.get("role").and_then(|v| v.as_str()), Some("lead"));
    assert_eq!(node.version, 1);
    Ok(())
}

#[test]
fn edge_to_missing_node_fails_with_node_not_found() {
    init_tracing();
    let graph = GraphBuilder::new().scenes(&["A"]).build();

    let err = graph
        .add_edge("A", "ghost", EdgeType::DependsOn, 1.0, Metadata::new())
        .unwrap_err();
    assert!(matches!(err, StorydagError::NodeNotFound(ref id) if id == "ghost"));

    let err = graph
        .add_edge("ghost", "A", EdgeType::DependsOn, 1.0, Metadata::new())
        .unwrap_err();
    assert!(matches!(err, StorydagError::NodeNotFound(ref id) if id == "ghost"));
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn cycle_is_rejected_with_path_and_graph_unchanged() {
    init_tracing();
    let graph = GraphBuilder::new().chain(&["A", "B", "C"]).build();
    let before = graph.snapshot();

    let err = graph
        .add_edge("C", "A", EdgeType::DependsOn, 1.0, Metadata::new())
        .unwrap_err();

    match err {
        StorydagError::CyclicDependency { cycle } => {
            assert_eq!(cycle, vec!["C", "A", "B", "C"]);
        }
        other => panic!("Expected CyclicDependency, got: {other:?}"),
    }

    assert_eq!(graph.snapshot(), before);
    assert_eq!(graph.edge_count(), 2);
    assert!(graph.get_dependents("C").unwrap().is_empty());
    assert!(graph.get_dependencies("A").unwrap().is_empty());
}

#[test]
fn self_edge_is_a_cycle() {
    init_tracing();
    let graph = GraphBuilder::new().scenes(&["A"]).build();

    let err = graph
        .add_edge("A", "A", EdgeType::DependsOn, 1.0, Metadata::new())
        .unwrap_err();
    match err {
        StorydagError::CyclicDependency { cycle } => assert_eq!(cycle, vec!["A", "A"]),
        other => panic!("Expected CyclicDependency, got: {other:?}"),
    }
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn re_adding_an_edge_refreshes_attributes() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new().chain(&["A", "B"]).build();

    graph.add_edge("A", "B", EdgeType::Produces, 2.5, Metadata::new())?;

    assert_eq!(graph.edge_count(), 1);
    let edge = graph.get_edge("A", "B")?;
    assert_eq!(edge.edge_type, EdgeType::Produces);
    assert_eq!(edge.weight, 2.5);
    assert_eq!(graph.get_dependents("A")?, vec!["B"]);
    Ok(())
}

#[test]
fn direct_neighbours_and_missing_ids() -> TestResult {
    init_tracing();
    let graph = diamond();

    let mut dependents = graph.get_dependents("A")?;
    dependents.sort();
    assert_eq!(dependents, vec!["B", "C"]);

    let mut deps = graph.get_dependencies("D")?;
    deps.sort();
    assert_eq!(deps, vec!["B", "C"]);

    assert!(matches!(
        graph.get_dependents("nope"),
        Err(StorydagError::NodeNotFound(_))
    ));
    assert!(matches!(
        graph.get_dependencies("nope"),
        Err(StorydagError::NodeNotFound(_))
    ));
    assert!(matches!(
        graph.get_node("nope"),
        Err(StorydagError::NodeNotFound(_))
    ));
    Ok(())
}

#[test]
fn all_affected_is_downstream_closure_without_source() -> TestResult {
    init_tracing();
    let graph = diamond();

    assert_eq!(graph.get_all_affected("A")?, set(&["B", "C", "D", "E"]));
    assert_eq!(graph.get_all_affected("C")?, set(&["D", "E"]));
    assert!(graph.get_all_affected("E")?.is_empty());

    // Idempotent without intervening mutation.
    assert_eq!(graph.get_all_affected("A")?, graph.get_all_affected("A")?);
    Ok(())
}

#[test]
fn propagation_order_respects_every_edge() -> TestResult {
    init_tracing();
    // C is discovered before B but depends on it.
    let graph = GraphBuilder::new()
        .scenes(&["A", "B", "C"])
        .edge("A", "C")
        .edge("A", "B")
        .edge("B", "C")
        .build();

    assert_eq!(graph.propagation_order("A")?, vec!["B", "C"]);

    let order = diamond().propagation_order("A")?;
    let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
    assert!(pos("B") < pos("D"));
    assert!(pos("C") < pos("D"));
    assert!(pos("D") < pos("E"));
    Ok(())
}

#[test]
fn mark_flags_exactly_node_and_closure_and_clear_is_local() -> TestResult {
    init_tracing();
    let graph = diamond();

    let marked = graph.mark_for_regeneration("C", "edited scene")?;
    assert_eq!(marked, set(&["C", "D", "E"]));

    let flagged: HashSet<String> = graph
        .get_nodes_needing_regeneration()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(flagged, marked);

    let d = graph.get_node("D")?;
    assert!(d.needs_regeneration());
    assert_eq!(d.regeneration_reason(), Some("edited scene"));
    assert!(!graph.get_node("A")?.needs_regeneration());

    graph.clear_regeneration_flag("D")?;
    let flagged: HashSet<String> = graph
        .get_nodes_needing_regeneration()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(flagged, set(&["C", "E"]));
    assert_eq!(graph.get_node("D")?.regeneration_reason(), None);
    Ok(())
}

#[test]
fn removing_a_node_drops_incident_edges() -> TestResult {
    init_tracing();
    let graph = diamond();

    let removed = graph.remove_node("D")?;
    assert_eq!(removed.id, "D");
    assert!(!graph.contains_node("D"));
    assert_eq!(graph.edge_count(), 2);
    assert!(graph.get_dependencies("E")?.is_empty());
    assert!(graph.get_dependents("B")?.is_empty());
    assert_eq!(graph.get_all_affected("A")?, set(&["B", "C"]));

    // The id may be reused explicitly.
    graph.add_node("D", NodeType::Shot, "D again", Metadata::new())?;
    assert_eq!(graph.get_node("D")?.node_type, NodeType::Shot);
    assert!(graph.get_dependencies("D")?.is_empty());
    Ok(())
}

#[test]
fn removing_an_edge_unlinks_both_sides() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new().chain(&["A", "B"]).build();

    graph.remove_edge("A", "B")?;
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.get_dependents("A")?.is_empty());
    assert!(graph.get_dependencies("B")?.is_empty());

    assert!(matches!(
        graph.remove_edge("A", "B"),
        Err(StorydagError::EdgeNotFound { .. })
    ));

    // Once unlinked, the reverse edge is legal.
    graph.add_edge("B", "A", EdgeType::DependsOn, 1.0, Metadata::new())?;
    Ok(())
}

#[test]
fn version_moves_only_on_content_change() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new().scenes(&["S"]).build();

    let mut patch = Metadata::new();
    patch.insert("summary".into(), "the heist".into());
    assert_eq!(graph.update_node("S", None, patch.clone())?.version, 2);

    // Same content again: no bump.
    assert_eq!(graph.update_node("S", None, patch)?.version, 2);

    // Flagging is not a content change either.
    graph.mark_for_regeneration("S", "upstream edit")?;
    assert_eq!(graph.get_node("S")?.version, 2);

    let renamed = graph.update_node("S", Some("Opening"), Metadata::new())?;
    assert_eq!(renamed.version, 3);
    assert_eq!(renamed.name, "Opening");
    Ok(())
}

#[test]
fn topological_order_and_roots() {
    init_tracing();
    let graph = diamond();

    assert_eq!(graph.roots(), vec!["A"]);
    assert_eq!(graph.topological_order(), vec!["A", "B", "C", "D", "E"]);
}

#[test]
fn snapshot_serialises_all_fields() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new()
        .node("pitch", NodeType::Pitch)
        .node("script", NodeType::Script)
        .edge_typed("pitch", "script", EdgeType::DerivedFrom)
        .build();

    let json = serde_json::to_value(graph.snapshot())?;
    let node = &json["nodes"][0];
    assert_eq!(node["id"], "pitch");
    assert_eq!(node["type"], "pitch");
    assert_eq!(node["version"], 1);
    assert!(node.get("created_at").is_some());
    assert!(node.get("updated_at").is_some());

    let edge = &json["edges"][0];
    assert_eq!(edge["source_id"], "pitch");
    assert_eq!(edge["target_id"], "script");
    assert_eq!(edge["type"], "derived_from");
    assert_eq!(edge["weight"], 1.0);

    let back: storydag::dag::GraphSnapshot = serde_json::from_value(json)?;
    assert_eq!(back, graph.snapshot());
    Ok(())
}

#[test]
fn concurrent_opposite_edges_admit_exactly_one() -> TestResult {
    init_tracing();

    for run in 0..500 {
        let graph = GraphBuilder::new().scenes(&["a", "b"]).build();
        let barrier = Arc::new(Barrier::new(2));

        let racers: Vec<_> = [("a", "b"), ("b", "a")]
            .into_iter()
            .map(|(source, target)| {
                let graph = Arc::clone(&graph);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    graph.add_edge(source, target, EdgeType::DependsOn, 1.0, Metadata::new())
                })
            })
            .collect();

        let outcomes: Vec<_> = racers
            .into_iter()
            .map(|h| h.join().expect("racer panicked"))
            .collect();

        let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1, "run {run}: {outcomes:?}");
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(StorydagError::CyclicDependency { .. }))),
            "run {run}: {outcomes:?}"
        );
        assert_eq!(graph.edge_count(), 1, "run {run}");
        assert_eq!(graph.topological_order().len(), 2);
    }
    Ok(())
}
