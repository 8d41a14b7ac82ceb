//! In-process Tokio work queue and its worker.
//!
//! `TokioWorkQueue` implements the engine's `WorkQueue` contract over an
//! unbounded mpsc channel; retry delays are enforced here by a spawned
//! sleep, so a failing unit's handler never blocks a worker slot. The
//! worker drains jobs under a semaphore so unit parallelism is bounded by
//! configuration, not by the engine.
//!
//! Each job is delivered exactly once (single consumer), which carries the
//! at-most-once dispatch assumption `process_execution` relies on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};

use skillrun_core::engine::ExecutionOrchestrator;
use skillrun_core::engine::queue::{QueueError, WorkQueue};
use skillrun_core::engine::workload::WorkloadEngine;
use skillrun_core::repository::{CatalogRepository, ExecutionRepository};
use skillrun_types::job::Job;

// ---------------------------------------------------------------------------
// TokioWorkQueue
// ---------------------------------------------------------------------------

/// Sender side of the in-process queue.
#[derive(Clone)]
pub struct TokioWorkQueue {
    tx: mpsc::UnboundedSender<Job>,
}

/// Create a queue and the receiver its worker will drain.
pub fn work_queue() -> (TokioWorkQueue, mpsc::UnboundedReceiver<Job>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TokioWorkQueue { tx }, rx)
}

impl WorkQueue for TokioWorkQueue {
    async fn enqueue(&self, job: Job, delay: Option<Duration>) -> Result<(), QueueError> {
        match delay {
            None => self.tx.send(job).map_err(|_| QueueError::Closed),
            Some(delay) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if tx.send(job).is_err() {
                        tracing::warn!("queue closed before delayed job could be enqueued");
                    }
                });
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Drain the queue, dispatching each job to the orchestrator on its own
/// task under a permit-bounded semaphore.
///
/// Runs until the sender side is dropped. Job handler errors are logged,
/// never propagated: a failing job must not take the worker down.
pub async fn run_worker<R, C, Q, W>(
    orchestrator: Arc<ExecutionOrchestrator<R, C, Q, W>>,
    mut rx: mpsc::UnboundedReceiver<Job>,
    concurrency: u32,
) where
    R: ExecutionRepository + 'static,
    C: CatalogRepository + 'static,
    Q: WorkQueue + 'static,
    W: WorkloadEngine + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1) as usize));
    tracing::info!(concurrency, "queue worker started");

    while let Some(job) = rx.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = orchestrator.handle_job(job.clone()).await {
                tracing::error!(error = %e, job = ?job, "job handler failed");
            }
        });
    }

    tracing::info!("queue worker stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
