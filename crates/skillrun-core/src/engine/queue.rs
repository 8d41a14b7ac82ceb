//! Work queue collaborator contract.
//!
//! The engine enqueues two job kinds (whole-skill, single-unit) and never
//! consumes them itself; an external worker drains the queue and invokes
//! the orchestrator's entry points. Retry delays are enforced here, by the
//! queue, so a failing unit's handler returns immediately instead of
//! sleeping in a worker slot.

use std::time::Duration;

use skillrun_types::job::Job;

/// Errors from queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("enqueue failed: {0}")]
    Enqueue(String),

    #[error("queue is shut down")]
    Closed,
}

/// Contract for the job queue the engine dispatches onto.
///
/// At-most-once dispatch of the top-level `ExecuteSkill` job is an external
/// contract this engine relies on; see DESIGN.md.
pub trait WorkQueue: Send + Sync {
    /// Enqueue a job, optionally delayed.
    fn enqueue(
        &self,
        job: Job,
        delay: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<(), QueueError>> + Send;
}
