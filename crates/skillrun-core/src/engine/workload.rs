//! Workload engine collaborator contract and variable merging.
//!
//! The workload engine is the external system that actually runs one
//! concrete workflow unit. The orchestrator hands it a resolved variable
//! set, polls for terminal status, and aborts best-effort on cancellation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillrun_types::skill::OwnerContext;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A named variable declared on a target workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadVariable {
    /// Stable identity on the workload engine side.
    pub id: String,
    /// Variable name.
    pub key: String,
    /// Current value.
    pub value: Value,
}

/// Terminal-or-not status of one workload execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkloadStatus {
    Pending,
    Executing,
    Finished { output: Value },
    Failed { error: String },
}

impl WorkloadStatus {
    /// Whether the workload has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }
}

/// Options passed when starting a workload execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadOptions {
    /// Hint for the engine-side execution timeout, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Errors from workload engine operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("workload engine request failed: {0}")]
    Request(String),

    #[error("target workflow not found: {0}")]
    TargetNotFound(String),
}

// ---------------------------------------------------------------------------
// WorkloadEngine trait
// ---------------------------------------------------------------------------

/// Contract for the external workload-execution engine.
///
/// Uses native async fn in traits (Rust 2024), consistent with the
/// repository traits.
pub trait WorkloadEngine: Send + Sync {
    /// Variables currently declared on a target workflow.
    fn variables(
        &self,
        owner: &OwnerContext,
        target_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<WorkloadVariable>, WorkloadError>> + Send;

    /// Start executing a target with the resolved variable set.
    /// Returns an opaque execution handle.
    fn initialize(
        &self,
        owner: &OwnerContext,
        target_id: &str,
        variables: &[WorkloadVariable],
        options: &WorkloadOptions,
    ) -> impl std::future::Future<Output = Result<String, WorkloadError>> + Send;

    /// Current status of an execution handle.
    fn status(
        &self,
        handle: &str,
    ) -> impl std::future::Future<Output = Result<WorkloadStatus, WorkloadError>> + Send;

    /// Best-effort abort of an in-flight execution.
    fn abort(
        &self,
        owner: &OwnerContext,
        handle: &str,
    ) -> impl std::future::Future<Output = Result<(), WorkloadError>> + Send;
}

// ---------------------------------------------------------------------------
// Variable merging
// ---------------------------------------------------------------------------

/// Merge a resolved input object into a target's declared variables.
///
/// - Key present in both: the declared variable's value is overridden in
///   place, its identity preserved.
/// - Key only in the target declaration: kept unchanged.
/// - Key only in the input: appended as a new variable.
///
/// A non-object input is treated as a single `input` variable.
pub fn merge_variables(declared: Vec<WorkloadVariable>, input: &Value) -> Vec<WorkloadVariable> {
    let entries: Vec<(String, Value)> = match input.as_object() {
        Some(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        None if input.is_null() => Vec::new(),
        None => vec![("input".to_string(), input.clone())],
    };

    let mut merged = declared;
    for (key, value) in entries {
        match merged.iter_mut().find(|v| v.key == key) {
            Some(existing) => existing.value = value,
            None => merged.push(WorkloadVariable {
                id: Uuid::now_v7().to_string(),
                key,
                value,
            }),
        }
    }

    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
