//! Execution repository trait definition.
//!
//! Durable storage for skill executions and their per-unit rows. The
//! orchestrator is the only writer; status surfaces read through the same
//! interface.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

use chrono::{DateTime, Utc};
use serde_json::Value;
use skillrun_types::error::RepositoryError;
use skillrun_types::execution::{
    ExecutionPage, SkillExecution, SkillExecutionStatus, SkillExecutionUnit, UnitExecutionStatus,
};
use uuid::Uuid;

/// Repository trait for execution persistence.
///
/// Covers two entity families:
/// - **Executions:** one row per run request, audit record, never deleted.
/// - **Units:** one row per materialized plan entry.
pub trait ExecutionRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// Create a new execution record.
    fn create_execution(
        &self,
        execution: &SkillExecution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an execution by ID.
    fn get_execution(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<SkillExecution>, RepositoryError>> + Send;

    /// Transition an execution to `running` and stamp `started_at`.
    fn mark_execution_running(
        &self,
        execution_id: &Uuid,
        started_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Write the terminal status, aggregated output, and error summary.
    fn finish_execution(
        &self,
        execution_id: &Uuid,
        status: SkillExecutionStatus,
        output: Option<&Value>,
        error: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Page through executions of a skill, newest first, optionally
    /// filtered by status.
    fn list_executions(
        &self,
        skill_id: &Uuid,
        status: Option<SkillExecutionStatus>,
        page: u32,
        per_page: u32,
    ) -> impl std::future::Future<Output = Result<ExecutionPage, RepositoryError>> + Send;

    /// Executions of an installation still in `pending` or `running`.
    fn list_active_executions(
        &self,
        installation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<SkillExecution>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    /// Create a new unit row.
    fn create_unit(
        &self,
        unit: &SkillExecutionUnit,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a unit row by ID.
    fn get_unit(
        &self,
        execution_unit_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<SkillExecutionUnit>, RepositoryError>> + Send;

    /// All unit rows for an execution, ordered by level ascending.
    fn list_units(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<SkillExecutionUnit>, RepositoryError>> + Send;

    /// Unit rows for an execution at one level.
    fn list_units_at_level(
        &self,
        execution_id: &Uuid,
        level: u32,
    ) -> impl std::future::Future<Output = Result<Vec<SkillExecutionUnit>, RepositoryError>> + Send;

    /// Unit rows for an execution not yet in a terminal status.
    fn list_unfinished_units(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<SkillExecutionUnit>, RepositoryError>> + Send;

    /// Transition a unit to `queued` and persist its resolved input.
    fn mark_unit_queued(
        &self,
        execution_unit_id: &Uuid,
        input: &Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Transition a unit to `running` and stamp `started_at`.
    fn mark_unit_running(
        &self,
        execution_unit_id: &Uuid,
        started_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Update a unit's status and optionally its output/error/completion.
    fn update_unit_status(
        &self,
        execution_unit_id: &Uuid,
        status: UnitExecutionStatus,
        output: Option<&Value>,
        error: Option<&str>,
        completed_at: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Persist the opaque workload handle for a running unit.
    fn set_unit_workload_ref(
        &self,
        execution_unit_id: &Uuid,
        workload_ref: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Increment a unit's retry counter; returns the new count.
    fn increment_unit_retry(
        &self,
        execution_unit_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;
}
