//! Work-queue job payloads.
//!
//! Two job kinds drive the engine: one per whole-skill execution and one
//! per individual unit execution. Jobs are serializable so an external
//! queue can carry them across processes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A job consumed by the queue worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    /// Drive one skill execution level-by-level.
    ExecuteSkill { execution_id: Uuid },
    /// Run a single unit row against the workload engine.
    ExecuteUnit {
        execution_unit_id: Uuid,
        execution_id: Uuid,
    },
}

impl Job {
    /// The execution this job belongs to (both kinds carry one).
    pub fn execution_id(&self) -> Uuid {
        match self {
            Job::ExecuteSkill { execution_id } => *execution_id,
            Job::ExecuteUnit { execution_id, .. } => *execution_id,
        }
    }
}
