// tests/regeneration_queue.rs
mod common;
use crate::common::builders::GraphBuilder;
use crate::common::init_tracing;

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::thread;

use storydag::errors::StorydagError;
use storydag::queue::RegenerationQueue;
use storydag::types::{Metadata, Priority, TaskStatus};

type TestResult = Result<(), Box<dyn Error>>;

fn queue_over(ids: &[&str], max_concurrent: usize) -> RegenerationQueue {
    let graph = GraphBuilder::new().scenes(ids).build();
    RegenerationQueue::new(graph, max_concurrent)
}

fn add(queue: &RegenerationQueue, id: &str, priority: Priority) {
    queue
        .add(id, priority, "test", Metadata::new())
        .expect("add should succeed");
}

#[test]
fn dispatch_follows_priority_then_insertion_order() -> TestResult {
    init_tracing();
    let queue = queue_over(&["n1", "n2", "n3", "n4"], 4);

    add(&queue, "n1", Priority::Background);
    add(&queue, "n2", Priority::Critical);
    add(&queue, "n3", Priority::Normal);
    add(&queue, "n4", Priority::Critical);

    let mut dispatched = Vec::new();
    while let Some(task) = queue.get_next() {
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.attempts, 1);
        dispatched.push((task.node_id, task.priority.value()));
    }

    assert_eq!(
        dispatched,
        vec![
            ("n2".to_string(), 1),
            ("n4".to_string(), 1),
            ("n3".to_string(), 3),
            ("n1".to_string(), 5),
        ]
    );
    Ok(())
}

#[test]
fn dependent_waits_for_its_dependency() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new().chain(&["A", "B"]).build();
    let queue = RegenerationQueue::new(graph, 4);

    // B is more urgent but must still wait for A.
    add(&queue, "B", Priority::Critical);
    add(&queue, "A", Priority::Low);

    let first = queue.get_next().expect("A should be ready");
    assert_eq!(first.node_id, "A");

    // A is in progress: B is blocked.
    assert!(queue.get_next().is_none());
    let b = queue.pending_task("B").expect("B still pending");
    assert!(b.priority > Priority::Critical, "blocked task is demoted");

    assert_eq!(queue.complete("A", true)?, TaskStatus::Completed);

    let second = queue.get_next().expect("B should be ready now");
    assert_eq!(second.node_id, "B");
    Ok(())
}

#[test]
fn dependency_outside_the_queue_does_not_block() {
    init_tracing();
    let graph = GraphBuilder::new().chain(&["A", "B"]).build();
    let queue = RegenerationQueue::new(graph, 1);

    add(&queue, "B", Priority::Normal);
    assert_eq!(queue.get_next().map(|t| t.node_id), Some("B".to_string()));
}

#[test]
fn failing_task_is_retried_until_max_attempts() -> TestResult {
    init_tracing();
    let queue = queue_over(&["flaky"], 1);
    assert_eq!(queue.max_attempts(), 3);
    add(&queue, "flaky", Priority::High);

    let mut priorities = Vec::new();
    for attempt in 1..=3u32 {
        let task = queue.get_next().expect("flaky should be dispatched");
        assert_eq!(task.attempts, attempt);
        priorities.push(task.priority);

        let status = queue.complete("flaky", false)?;
        if attempt < 3 {
            assert_eq!(status, TaskStatus::Pending);
        } else {
            assert_eq!(status, TaskStatus::Failed);
        }
    }

    assert_eq!(priorities, vec![Priority::High, Priority::Normal, Priority::Low]);
    assert!(queue.get_next().is_none());
    assert!(queue.is_idle());

    let finished = queue.finished_task("flaky").expect("terminal record");
    assert_eq!(finished.status, TaskStatus::Failed);
    assert_eq!(finished.attempts, 3);

    let failures = queue.failures();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        StorydagError::RegenerationFailed { node_id, attempts: 3 } if node_id == "flaky"
    ));

    let status = queue.get_status();
    assert_eq!(status.failed, 1);
    assert_eq!(status.failed_nodes, vec!["flaky"]);
    Ok(())
}

#[test]
fn max_attempts_is_configurable() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new().scenes(&["once"]).build();
    let queue = RegenerationQueue::new(graph, 1).with_max_attempts(1);
    add(&queue, "once", Priority::Normal);

    queue.get_next().expect("dispatched");
    assert_eq!(queue.complete("once", false)?, TaskStatus::Failed);
    Ok(())
}

#[test]
fn re_adding_pending_node_only_raises_priority() -> TestResult {
    init_tracing();
    let queue = queue_over(&["scene"], 2);

    let first = queue.add("scene", Priority::Low, "first", Metadata::new())?;
    let raised = queue.add("scene", Priority::Critical, "second", Metadata::new())?;
    assert_eq!(raised.priority, Priority::Critical);
    assert_eq!(raised.sequence, first.sequence);
    assert_eq!(raised.reason, "first");

    let kept = queue.add("scene", Priority::Background, "third", Metadata::new())?;
    assert_eq!(kept.priority, Priority::Critical);

    assert_eq!(queue.get_status().pending, 1);
    let task = queue.get_next().expect("dispatched");
    assert_eq!(task.priority, Priority::Critical);
    assert!(queue.get_next().is_none(), "stale heap slots are not dispatched");
    Ok(())
}

#[test]
fn concurrency_budget_is_respected() -> TestResult {
    init_tracing();
    let queue = queue_over(&["a", "b", "c"], 2);
    queue.add_batch(&["a", "b", "c"], Priority::Normal, "batch")?;

    let a = queue.get_next().expect("a");
    let b = queue.get_next().expect("b");
    assert!(queue.get_next().is_none());

    let status = queue.get_status();
    assert_eq!(status.in_progress, 2);
    assert_eq!(status.pending, 1);
    assert_eq!(status.max_concurrent, 2);
    assert_eq!(status.in_progress_nodes, vec![a.node_id.clone(), b.node_id]);

    queue.complete(&a.node_id, true)?;
    assert_eq!(queue.get_next().map(|t| t.node_id), Some("c".to_string()));
    Ok(())
}

#[test]
fn zero_concurrency_is_clamped_to_one() {
    init_tracing();
    let queue = queue_over(&["a"], 0);
    assert_eq!(queue.max_concurrent(), 1);
    add(&queue, "a", Priority::Normal);
    assert!(queue.get_next().is_some());
}

#[test]
fn cancel_only_affects_pending_tasks() -> TestResult {
    init_tracing();
    let queue = queue_over(&["a", "b"], 2);
    add(&queue, "a", Priority::Normal);
    add(&queue, "b", Priority::Normal);

    let running = queue.get_next().expect("a dispatched");
    assert_eq!(running.node_id, "a");

    assert!(!queue.cancel("a"), "in-progress task cannot be cancelled");
    assert!(queue.cancel("b"));
    assert!(!queue.cancel("b"));
    assert!(!queue.cancel("unknown"));

    assert_eq!(
        queue.finished_task("b").map(|t| t.status),
        Some(TaskStatus::Cancelled)
    );
    assert!(queue.get_next().is_none());

    let status = queue.get_status();
    assert_eq!(status.cancelled, 1);
    assert_eq!(status.in_progress, 1);
    Ok(())
}

#[test]
fn completion_clears_the_regeneration_flag() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new().chain(&["outline", "scene"]).build();
    let queue = RegenerationQueue::new(Arc::clone(&graph), 2);

    graph.mark_for_regeneration("outline", "rewrite")?;
    let tasks = queue.enqueue_flagged(Priority::High)?;
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.reason == "rewrite"));

    let outline = queue.get_next().expect("outline first");
    assert_eq!(outline.node_id, "outline");
    queue.complete("outline", true)?;
    assert!(!graph.get_node("outline")?.needs_regeneration());
    assert!(graph.get_node("scene")?.needs_regeneration());

    let scene = queue.get_next().expect("scene next");
    queue.complete(&scene.node_id, false)?;
    assert!(
        graph.get_node("scene")?.needs_regeneration(),
        "a failed attempt leaves the flag set"
    );

    queue.get_next().expect("scene retried");
    queue.complete("scene", true)?;
    assert!(graph.get_nodes_needing_regeneration().is_empty());
    assert!(queue.is_idle());
    assert_eq!(queue.get_status().completed, 2);
    Ok(())
}

#[test]
fn completing_unknown_task_is_an_error() {
    init_tracing();
    let queue = queue_over(&["a"], 1);
    add(&queue, "a", Priority::Normal);

    let err = queue.complete("a", true).unwrap_err();
    assert!(matches!(err, StorydagError::TaskNotInProgress(ref id) if id == "a"));
}

#[test]
fn adding_unknown_node_is_rejected() {
    init_tracing();
    let queue = queue_over(&["a"], 1);
    let err = queue
        .add("ghost", Priority::Normal, "test", Metadata::new())
        .unwrap_err();
    assert!(matches!(err, StorydagError::NodeNotFound(ref id) if id == "ghost"));
    assert!(queue.is_idle());
}

#[test]
fn task_for_removed_node_is_cancelled() -> TestResult {
    init_tracing();
    let graph = GraphBuilder::new().scenes(&["gone", "stays"]).build();
    let queue = RegenerationQueue::new(Arc::clone(&graph), 2);
    add(&queue, "gone", Priority::Critical);
    add(&queue, "stays", Priority::Low);

    graph.remove_node("gone")?;

    assert_eq!(queue.get_next().map(|t| t.node_id), Some("stays".to_string()));
    assert_eq!(
        queue.finished_task("gone").map(|t| t.status),
        Some(TaskStatus::Cancelled)
    );
    Ok(())
}

#[test]
fn node_can_be_requeued_while_in_progress() -> TestResult {
    init_tracing();
    let queue = queue_over(&["scene"], 2);
    add(&queue, "scene", Priority::Normal);
    queue.get_next().expect("dispatched");

    // A fresh edit arrives mid-regeneration.
    add(&queue, "scene", Priority::High);
    assert!(queue.get_next().is_none(), "same node never runs twice at once");

    queue.complete("scene", true)?;
    let again = queue.get_next().expect("requeued edit");
    assert_eq!(again.attempts, 1);
    Ok(())
}

#[test]
fn completion_keeps_flag_while_newer_request_is_pending() -> TestResult {
    init_tracing();
    let queue = queue_over(&["scene"], 2);
    let graph = Arc::clone(queue.graph());

    graph.flag_node("scene", "first edit")?;
    add(&queue, "scene", Priority::Normal);
    let running = queue.get_next().expect("dispatched");
    assert_eq!(queue.in_progress_task("scene"), Some(running));

    graph.flag_node("scene", "second edit")?;
    add(&queue, "scene", Priority::Normal);
    assert_eq!(queue.complete("scene", true)?, TaskStatus::Completed);

    assert!(queue.in_progress_task("scene").is_none());
    assert!(queue.pending_task("scene").is_some());
    assert!(graph.get_node("scene")?.needs_regeneration());
    let flagged: Vec<String> = graph
        .get_nodes_needing_regeneration()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(flagged, vec!["scene"]);

    // Re-enqueueing the flagged nodes folds into the pending task.
    assert_eq!(queue.enqueue_flagged(Priority::Low)?.len(), 1);
    assert_eq!(queue.get_status().pending, 1);

    queue.get_next().expect("second edit dispatched");
    queue.complete("scene", true)?;
    assert!(!graph.get_node("scene")?.needs_regeneration());
    assert!(queue.is_idle());
    Ok(())
}

#[test]
fn concurrent_workers_never_share_a_node() -> TestResult {
    init_tracing();
    const NODES: usize = 40;
    const WORKERS: usize = 8;
    const MAX_CONCURRENT: usize = 4;

    let ids: Vec<String> = (0..NODES).map(|i| format!("scene_{i:02}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let queue = Arc::new(queue_over(&id_refs, MAX_CONCURRENT));

    let in_flight: Arc<Mutex<HashSet<String>>> = Arc::default();
    let dispatches: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            let in_flight = Arc::clone(&in_flight);
            let dispatches = Arc::clone(&dispatches);
            let ids = ids.clone();
            thread::spawn(move || {
                // Each worker also feeds part of the backlog while others drain it.
                for id in ids.iter().skip(worker).step_by(WORKERS) {
                    queue
                        .add(id, Priority::Normal, "edit", Metadata::new())
                        .expect("add should succeed");
                }

                loop {
                    let Some(task) = queue.get_next() else {
                        if queue.is_idle() {
                            break;
                        }
                        thread::yield_now();
                        continue;
                    };

                    assert!(
                        in_flight.lock().unwrap().insert(task.node_id.clone()),
                        "{} handed out while already in progress",
                        task.node_id
                    );
                    assert!(queue.get_status().in_progress <= MAX_CONCURRENT);
                    *dispatches
                        .lock()
                        .unwrap()
                        .entry(task.node_id.clone())
                        .or_default() += 1;

                    thread::yield_now();
                    in_flight.lock().unwrap().remove(&task.node_id);
                    queue
                        .complete(&task.node_id, true)
                        .expect("task should be in progress");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    let dispatches = dispatches.lock().unwrap();
    assert_eq!(dispatches.len(), NODES);
    assert!(dispatches.values().all(|&n| n == 1), "{dispatches:?}");

    let status = queue.get_status();
    assert!(status.is_idle());
    assert_eq!(status.completed, NODES);
    Ok(())
}
