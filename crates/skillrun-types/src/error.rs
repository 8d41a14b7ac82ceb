//! Error taxonomy for the execution engine.
//!
//! `EngineError` covers every failure the engine surfaces; each variant maps
//! to a stable machine code consumed by the retry allow-list and the API
//! error payloads. `RepositoryError` is the storage-facing family used by
//! trait definitions in skillrun-core.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("skill is not ready to run: {0}")]
    SkillNotReady(String),

    #[error("unit '{0}' has no bound target in this installation")]
    WorkflowNotBound(String),

    #[error("unit '{unit_id}' timed out after {timeout_secs}s")]
    WorkflowTimeout { unit_id: String, timeout_secs: u64 },

    #[error("circular dependency among units: {}", unresolved.join(", "))]
    CircularDependency { unresolved: Vec<String> },

    #[error("unit '{unit_id}' depends on unknown unit '{dependency_id}'")]
    UnknownDependency {
        unit_id: String,
        dependency_id: String,
    },

    #[error("data mapping failed for unit '{unit_id}': {reason}")]
    MappingFailed { unit_id: String, reason: String },

    #[error("condition evaluation failed for unit '{unit_id}': {reason}")]
    ConditionEvalFailed { unit_id: String, reason: String },

    #[error("no running executions for installation {0}")]
    NoRunningExecutions(Uuid),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("workload engine error: {0}")]
    Workload(String),

    #[error("work queue error: {0}")]
    Queue(String),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl EngineError {
    /// Stable machine code for this error.
    ///
    /// Codes are part of the configuration surface (`retryable_error_codes`)
    /// and of API error payloads; renaming one is a breaking change.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ExecutionNotFound(_) => "EXECUTION_NOT_FOUND",
            Self::SkillNotReady(_) => "SKILL_NOT_READY",
            Self::WorkflowNotBound(_) => "WORKFLOW_NOT_BOUND",
            Self::WorkflowTimeout { .. } => "WORKFLOW_TIMEOUT",
            Self::CircularDependency { .. } => "CIRCULAR_DEPENDENCY",
            Self::UnknownDependency { .. } => "UNKNOWN_DEPENDENCY",
            Self::MappingFailed { .. } => "MAPPING_FAILED",
            Self::ConditionEvalFailed { .. } => "CONDITION_EVAL_FAILED",
            Self::NoRunningExecutions(_) => "NO_RUNNING_EXECUTIONS",
            Self::Repository(_) => "REPOSITORY_ERROR",
            Self::Workload(_) => "WORKLOAD_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
