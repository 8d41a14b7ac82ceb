//! Execution tracking types: skill executions and per-unit executions.
//!
//! One `SkillExecution` row is created per run request and mutated only by
//! the orchestrator; it is an audit record and is never physically deleted.
//! One `SkillExecutionUnit` row exists per materialized plan entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Overall status of a skill execution.
///
/// `pending -> running -> {success | failed | partial_failed}`, with an
/// externally triggered `* -> cancelled` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    PartialFailed,
    Cancelled,
}

impl SkillExecutionStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::PartialFailed | Self::Cancelled
        )
    }
}

/// Status of an individual unit execution.
///
/// `pending -> queued -> running -> {success | failed | skipped | blocked}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitExecutionStatus {
    Pending,
    Queued,
    Running,
    Success,
    Failed,
    Skipped,
    Blocked,
}

impl UnitExecutionStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Skipped | Self::Blocked
        )
    }
}

// ---------------------------------------------------------------------------
// Execution records
// ---------------------------------------------------------------------------

/// A single run of an installed skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillExecution {
    /// UUIDv7 execution ID.
    pub execution_id: Uuid,
    /// Installation this run belongs to.
    pub installation_id: Uuid,
    /// Skill being executed (denormalized for listing).
    pub skill_id: Uuid,
    /// Owner of the installation.
    pub owner_id: Uuid,
    /// Current status.
    pub status: SkillExecutionStatus,
    /// Caller-supplied input payload.
    pub input: Value,
    /// Aggregated output: unit ID -> captured output. Present once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Human-readable failure summary (failed unit IDs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the orchestrator began processing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// When the run request was accepted.
    pub created_at: DateTime<Utc>,
}

/// One unit's execution state within a skill execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillExecutionUnit {
    /// UUIDv7 row ID.
    pub execution_unit_id: Uuid,
    /// Parent execution.
    pub execution_id: Uuid,
    /// Unit ID from the skill definition.
    pub unit_id: String,
    /// Concrete target resolved through the installation's binding table.
    pub target_unit_id: String,
    /// Plan level assigned at materialization time.
    pub execution_level: u32,
    /// Current status.
    pub status: UnitExecutionStatus,
    /// Resolved input handed to the workload engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Output captured on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Error text on terminal failure (drill-down detail).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Retries performed so far (0 on first attempt).
    pub retry_count: u32,
    /// Opaque workload-engine handle, persisted so stop() can abort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_ref: Option<String>,
    /// When the unit began running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the unit reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Query views
// ---------------------------------------------------------------------------

/// Per-unit status line in an execution status view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStatusView {
    pub unit_id: String,
    pub target_unit_id: String,
    pub execution_level: u32,
    pub status: UnitExecutionStatus,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&SkillExecutionUnit> for UnitStatusView {
    fn from(unit: &SkillExecutionUnit) -> Self {
        Self {
            unit_id: unit.unit_id.clone(),
            target_unit_id: unit.target_unit_id.clone(),
            execution_level: unit.execution_level,
            status: unit.status,
            retry_count: unit.retry_count,
            error_message: unit.error_message.clone(),
        }
    }
}

/// Full status view returned by the status surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatusView {
    pub execution_id: Uuid,
    pub status: SkillExecutionStatus,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub unit_statuses: Vec<UnitStatusView>,
}

/// Page of executions returned by the listing surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPage {
    pub executions: Vec<SkillExecution>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    /// Total matching rows across all pages.
    pub total: u64,
}

/// Summary of one stopped execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoppedExecution {
    pub execution_id: Uuid,
    pub units_aborted: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
