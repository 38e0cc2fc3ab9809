// src/exec/worker_pool.rs

//! Worker driver for the regeneration queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::{Result, StorydagError};
use crate::exec::backend::Regenerator;
use crate::queue::{QueueStatus, RegenerationQueue, RegenerationTask};

/// How long an idle worker sleeps before polling again when no change
/// notification arrives.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs up to `max_concurrent` workers against a [`RegenerationQueue`].
///
/// Each worker loops: `get_next()`, call the regenerator with no lock held,
/// `complete()`. Workers park on the queue's change notification when nothing
/// is ready and stop once nothing is pending or in progress.
pub struct WorkerPool {
    queue: Arc<RegenerationQueue>,
    regenerator: Arc<dyn Regenerator>,
    workers: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    /// Build a pool using the regenerator registered on the queue.
    pub fn new(queue: Arc<RegenerationQueue>) -> Result<Self> {
        let regenerator = queue.regenerator().ok_or_else(|| {
            StorydagError::ConfigError("no regenerator registered on the queue".to_string())
        })?;
        Ok(Self::with_regenerator(queue, regenerator))
    }

    pub fn with_regenerator(queue: Arc<RegenerationQueue>, regenerator: Arc<dyn Regenerator>) -> Self {
        let workers = queue.max_concurrent();
        Self {
            queue,
            regenerator,
            workers,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Drain the queue and return its final status.
    pub async fn run_until_idle(self) -> Result<QueueStatus> {
        info!(workers = self.workers, "starting regeneration workers");

        let mut set = JoinSet::new();
        for worker_id in 0..self.workers {
            let queue = Arc::clone(&self.queue);
            let regenerator = Arc::clone(&self.regenerator);
            let poll_interval = self.poll_interval;
            set.spawn(async move { worker_loop(worker_id, queue, regenerator, poll_interval).await });
        }

        while let Some(joined) = set.join_next().await {
            joined.map_err(|e| anyhow!("regeneration worker crashed: {e}"))??;
        }

        let status = self.queue.get_status();
        info!(
            completed = status.completed,
            failed = status.failed,
            cancelled = status.cancelled,
            "regeneration workers finished"
        );
        Ok(status)
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<RegenerationQueue>,
    regenerator: Arc<dyn Regenerator>,
    poll_interval: Duration,
) -> Result<()> {
    debug!(worker_id, "worker started");

    loop {
        // Register interest before polling so a completion between
        // `get_next` and the wait is not missed.
        let notified = queue.changed();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match queue.get_next() {
            Some(task) => {
                let success = run_one(worker_id, &regenerator, &task).await;
                queue.complete(&task.node_id, success)?;
            }
            None => {
                if queue.is_idle() {
                    break;
                }
                let _ = tokio::time::timeout(poll_interval, notified).await;
            }
        }
    }

    debug!(worker_id, "worker finished");
    Ok(())
}

/// Invoke the regenerator for one task on its own Tokio task, so a panicking
/// generator is reported as a failed attempt instead of killing the worker.
async fn run_one(worker_id: usize, regenerator: &Arc<dyn Regenerator>, task: &RegenerationTask) -> bool {
    let regenerator = Arc::clone(regenerator);
    let node_id = task.node_id.clone();
    let metadata = task.metadata.clone();

    let outcome = tokio::spawn(async move { regenerator.regenerate(&node_id, &metadata).await }).await;

    match outcome {
        Ok(Ok(success)) => {
            debug!(worker_id, node = %task.node_id, success, "regenerator returned");
            success
        }
        Ok(Err(e)) => {
            warn!(worker_id, node = %task.node_id, error = %format!("{e:#}"), "regenerator errored");
            false
        }
        Err(e) => {
            warn!(worker_id, node = %task.node_id, error = %e, "regenerator panicked");
            false
        }
    }
}
