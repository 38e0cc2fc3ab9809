// src/queue/regen_queue.rs

use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::{debug, error, info, warn};

use crate::dag::DependencyGraph;
use crate::errors::{Result, StorydagError};
use crate::exec::Regenerator;
use crate::queue::status::QueueStatus;
use crate::queue::task::{DEFAULT_MAX_ATTEMPTS, HeapEntry, RegenerationTask};
use crate::types::{Metadata, NodeId, Priority, TaskStatus};

#[derive(Debug)]
struct PendingTask {
    task: RegenerationTask,
    /// Generation of the heap slot that currently represents this task.
    generation: u64,
}

/// Mutable queue state, only ever touched under the queue mutex.
#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<HeapEntry>,
    pending: HashMap<NodeId, PendingTask>,
    in_progress: HashMap<NodeId, RegenerationTask>,
    /// Terminal record per node: completed, failed or cancelled.
    finished: HashMap<NodeId, RegenerationTask>,
    next_sequence: u64,
    next_generation: u64,
}

impl QueueState {
    /// (Re)insert `task` as pending with a fresh heap slot.
    fn push_pending(&mut self, task: RegenerationTask) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.heap.push(HeapEntry {
            priority: task.priority,
            sequence: task.sequence,
            generation,
            node_id: task.node_id.clone(),
        });
        self.pending
            .insert(task.node_id.clone(), PendingTask { task, generation });
    }

    /// Pop the next live heap slot, discarding stale ones.
    fn pop_live(&mut self) -> Option<HeapEntry> {
        while let Some(entry) = self.heap.pop() {
            match self.pending.get(&entry.node_id) {
                Some(p) if p.generation == entry.generation => return Some(entry),
                _ => continue,
            }
        }
        None
    }

    fn is_busy(&self, node_id: &str) -> bool {
        self.pending.contains_key(node_id) || self.in_progress.contains_key(node_id)
    }

    fn count_finished(&self, status: TaskStatus) -> usize {
        self.finished.values().filter(|t| t.status == status).count()
    }
}

/// Readiness of a popped task.
enum Gate {
    Ready,
    Blocked,
    /// The node vanished from the graph; the task can never run.
    Orphaned,
}

/// Priority queue of regeneration work with dependency gating and retries.
///
/// Ordering is `(priority, insertion sequence)`: a more urgent band always
/// wins, and within a band the oldest task wins. A task is only handed out
/// once none of its direct dependencies is pending or in progress, and at
/// most `max_concurrent` tasks are in progress at any time.
///
/// The queue does not run anything itself: workers call [`get_next`], do the
/// work outside the queue, then report back through [`complete`].
///
/// Lock order is queue, then graph. The graph never calls into the queue.
///
/// [`get_next`]: RegenerationQueue::get_next
/// [`complete`]: RegenerationQueue::complete
pub struct RegenerationQueue {
    graph: Arc<DependencyGraph>,
    max_concurrent: usize,
    max_attempts: u32,
    state: Mutex<QueueState>,
    regenerator: Mutex<Option<Arc<dyn Regenerator>>>,
    changed: Notify,
}

impl fmt::Debug for RegenerationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegenerationQueue")
            .field("max_concurrent", &self.max_concurrent)
            .field("max_attempts", &self.max_attempts)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

impl RegenerationQueue {
    /// Create a queue gated on `graph`.
    ///
    /// `max_concurrent` is clamped to at least 1; a zero budget would never
    /// hand out work.
    pub fn new(graph: Arc<DependencyGraph>, max_concurrent: usize) -> Self {
        Self {
            graph,
            max_concurrent: max_concurrent.max(1),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            state: Mutex::new(QueueState::default()),
            regenerator: Mutex::new(None),
            changed: Notify::new(),
        }
    }

    /// Attempts granted to tasks created from now on (clamped to at least 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn set_regenerator(&self, regenerator: Arc<dyn Regenerator>) {
        *self
            .regenerator
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(regenerator);
    }

    pub fn regenerator(&self) -> Option<Arc<dyn Regenerator>> {
        self.regenerator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolves the next time work is added, finished or cancelled.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }

    /// Queue `node_id` for regeneration.
    ///
    /// If the node already has a pending task, that task is returned and its
    /// priority becomes the more urgent of the two; it is never downgraded.
    pub fn add(
        &self,
        node_id: &str,
        priority: Priority,
        reason: &str,
        metadata: Metadata,
    ) -> Result<RegenerationTask> {
        if !self.graph.contains_node(node_id) {
            return Err(StorydagError::NodeNotFound(node_id.to_string()));
        }

        let task = {
            let mut state = self.state();

            if let Some(existing) = state.pending.get(node_id) {
                let mut task = existing.task.clone();
                if priority < task.priority {
                    debug!(
                        node = %node_id,
                        from = ?task.priority,
                        to = ?priority,
                        "raising priority of pending task"
                    );
                    task.priority = priority;
                    state.push_pending(task.clone());
                }
                task
            } else {
                state.next_sequence += 1;
                let task = RegenerationTask::new(
                    node_id,
                    priority,
                    reason,
                    metadata,
                    state.next_sequence,
                    self.max_attempts,
                );
                state.push_pending(task.clone());
                debug!(node = %node_id, ?priority, reason = %reason, "queued regeneration task");
                task
            }
        };

        self.changed.notify_waiters();
        Ok(task)
    }

    /// Queue several nodes with the same priority and reason.
    pub fn add_batch<S: AsRef<str>>(
        &self,
        node_ids: &[S],
        priority: Priority,
        reason: &str,
    ) -> Result<Vec<RegenerationTask>> {
        node_ids
            .iter()
            .map(|id| self.add(id.as_ref(), priority, reason, Metadata::new()))
            .collect()
    }

    /// Queue every node currently flagged on the graph, using each node's
    /// recorded regeneration reason.
    pub fn enqueue_flagged(&self, priority: Priority) -> Result<Vec<RegenerationTask>> {
        let flagged = self.graph.get_nodes_needing_regeneration();
        let mut tasks = Vec::with_capacity(flagged.len());
        for node in flagged {
            let reason = node.regeneration_reason().unwrap_or("flagged").to_string();
            tasks.push(self.add(&node.id, priority, &reason, Metadata::new())?);
        }
        info!(queued = tasks.len(), "queued flagged nodes");
        Ok(tasks)
    }

    /// Hand out the most urgent ready task, if any.
    ///
    /// Returns `None` when the concurrency budget is used up or no pending
    /// task is ready. Every pending task is inspected at most once per call;
    /// blocked tasks are demoted one band and re-queued afterwards.
    pub fn get_next(&self) -> Option<RegenerationTask> {
        let mut state = self.state();

        if state.in_progress.len() >= self.max_concurrent {
            debug!(
                in_progress = state.in_progress.len(),
                max_concurrent = self.max_concurrent,
                "concurrency budget exhausted"
            );
            return None;
        }

        let mut blocked: Vec<NodeId> = Vec::new();
        let mut orphaned: Vec<NodeId> = Vec::new();
        let mut ready: Option<NodeId> = None;

        while let Some(entry) = state.pop_live() {
            match self.gate(&state, &entry.node_id) {
                Gate::Ready => {
                    ready = Some(entry.node_id);
                    break;
                }
                Gate::Blocked => blocked.push(entry.node_id),
                Gate::Orphaned => orphaned.push(entry.node_id),
            }
        }

        for node_id in blocked {
            if let Some(pending) = state.pending.remove(&node_id) {
                let mut task = pending.task;
                task.priority = task.priority.demoted();
                debug!(node = %node_id, priority = ?task.priority, "dependencies not settled; demoting");
                state.push_pending(task);
            }
        }

        for node_id in orphaned {
            if let Some(pending) = state.pending.remove(&node_id) {
                warn!(node = %node_id, "node no longer in graph; cancelling its task");
                let mut task = pending.task;
                task.status = TaskStatus::Cancelled;
                state.finished.insert(node_id, task);
            }
        }

        let node_id = ready?;
        let mut task = state.pending.remove(&node_id)?.task;
        task.status = TaskStatus::InProgress;
        task.attempts += 1;
        state.in_progress.insert(node_id.clone(), task.clone());

        info!(
            node = %node_id,
            attempt = task.attempts,
            max_attempts = task.max_attempts,
            priority = ?task.priority,
            "dispatching regeneration task"
        );
        Some(task)
    }

    fn gate(&self, state: &QueueState, node_id: &str) -> Gate {
        if state.in_progress.contains_key(node_id) {
            return Gate::Blocked;
        }
        match self.graph.get_dependencies(node_id) {
            Ok(deps) if deps.iter().any(|d| state.is_busy(d)) => Gate::Blocked,
            Ok(_) => Gate::Ready,
            Err(_) => Gate::Orphaned,
        }
    }

    /// Report the outcome of an in-progress task.
    ///
    /// Success records the task as completed and clears the node's
    /// regeneration flag, unless a newer request for the node is still
    /// pending. Failure re-queues the task one band less urgent
    /// while attempts remain, and records it as permanently failed otherwise.
    /// Returns the task's resulting status.
    pub fn complete(&self, node_id: &str, success: bool) -> Result<TaskStatus> {
        let status = {
            let mut state = self.state();
            let mut task = state
                .in_progress
                .remove(node_id)
                .ok_or_else(|| StorydagError::TaskNotInProgress(node_id.to_string()))?;

            let status = if success {
                task.status = TaskStatus::Completed;
                info!(node = %node_id, attempts = task.attempts, "regeneration completed");
                state.finished.insert(node_id.to_string(), task);
                TaskStatus::Completed
            } else if task.can_retry() {
                task.status = TaskStatus::Pending;
                task.priority = task.priority.demoted();
                warn!(
                    node = %node_id,
                    attempt = task.attempts,
                    max_attempts = task.max_attempts,
                    priority = ?task.priority,
                    "regeneration failed; retrying"
                );
                if let Some(existing) = state.pending.get(node_id) {
                    // A newer request for the same node is already waiting and
                    // covers the retry.
                    let mut newer = existing.task.clone();
                    if task.priority < newer.priority {
                        newer.priority = task.priority;
                        state.push_pending(newer);
                    }
                } else {
                    state.push_pending(task);
                }
                TaskStatus::Pending
            } else {
                task.status = TaskStatus::Failed;
                error!(
                    node = %node_id,
                    attempts = task.attempts,
                    reason = %task.reason,
                    "regeneration failed permanently"
                );
                state.finished.insert(node_id.to_string(), task);
                TaskStatus::Failed
            };

            // Cleared under the queue lock so an `add` for this node cannot
            // land between the pending check and the clear.
            if status == TaskStatus::Completed {
                if state.pending.contains_key(node_id) {
                    debug!(node = %node_id, "newer request pending; keeping regeneration flag");
                } else if let Err(e) = self.graph.clear_regeneration_flag(node_id) {
                    warn!(node = %node_id, error = %e, "could not clear regeneration flag");
                }
            }
            status
        };

        self.changed.notify_waiters();
        Ok(status)
    }

    /// Drop a pending task. In-progress tasks are not affected.
    pub fn cancel(&self, node_id: &str) -> bool {
        let cancelled = {
            let mut state = self.state();
            match state.pending.remove(node_id) {
                Some(pending) => {
                    let mut task = pending.task;
                    task.status = TaskStatus::Cancelled;
                    state.finished.insert(node_id.to_string(), task);
                    true
                }
                None => false,
            }
        };

        if cancelled {
            debug!(node = %node_id, "cancelled pending task");
            self.changed.notify_waiters();
        }
        cancelled
    }

    pub fn get_status(&self) -> QueueStatus {
        let state = self.state();

        let mut in_progress_nodes: Vec<NodeId> = state.in_progress.keys().cloned().collect();
        in_progress_nodes.sort();

        let mut failed_nodes: Vec<NodeId> = state
            .finished
            .values()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| t.node_id.clone())
            .collect();
        failed_nodes.sort();

        QueueStatus {
            pending: state.pending.len(),
            in_progress: state.in_progress.len(),
            completed: state.count_finished(TaskStatus::Completed),
            failed: failed_nodes.len(),
            cancelled: state.count_finished(TaskStatus::Cancelled),
            max_concurrent: self.max_concurrent,
            in_progress_nodes,
            failed_nodes,
        }
    }

    pub fn is_idle(&self) -> bool {
        let state = self.state();
        state.pending.is_empty() && state.in_progress.is_empty()
    }

    pub fn pending_task(&self, node_id: &str) -> Option<RegenerationTask> {
        self.state().pending.get(node_id).map(|p| p.task.clone())
    }

    pub fn in_progress_task(&self, node_id: &str) -> Option<RegenerationTask> {
        self.state().in_progress.get(node_id).cloned()
    }

    /// Terminal record (completed, failed or cancelled) for `node_id`.
    pub fn finished_task(&self, node_id: &str) -> Option<RegenerationTask> {
        self.state().finished.get(node_id).cloned()
    }

    /// One `RegenerationFailed` per permanently failed node, sorted by node.
    pub fn failures(&self) -> Vec<StorydagError> {
        let state = self.state();
        let mut failed: Vec<&RegenerationTask> = state
            .finished
            .values()
            .filter(|t| t.status == TaskStatus::Failed)
            .collect();
        failed.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        failed
            .into_iter()
            .map(|t| StorydagError::RegenerationFailed {
                node_id: t.node_id.clone(),
                attempts: t.attempts,
            })
            .collect()
    }
}
