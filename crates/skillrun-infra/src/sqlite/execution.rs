//! SQLite execution repository implementation.
//!
//! Implements `ExecutionRepository` from `skillrun-core` using sqlx with
//! split read/write pools. JSON payloads (input, output) are stored as text
//! columns; timestamps as RFC 3339 strings; statuses as their snake_case
//! serde names.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use skillrun_core::repository::execution::ExecutionRepository;
use skillrun_types::error::RepositoryError;
use skillrun_types::execution::{
    ExecutionPage, SkillExecution, SkillExecutionStatus, SkillExecutionUnit, UnitExecutionStatus,
};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ExecutionRepository`.
pub struct SqliteExecutionRepository {
    pool: DatabasePool,
}

impl SqliteExecutionRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct ExecutionRow {
    id: String,
    installation_id: String,
    skill_id: String,
    owner_id: String,
    status: String,
    input: String,
    output: Option<String>,
    error: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    created_at: String,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            installation_id: row.try_get("installation_id")?,
            skill_id: row.try_get("skill_id")?,
            owner_id: row.try_get("owner_id")?,
            status: row.try_get("status")?,
            input: row.try_get("input")?,
            output: row.try_get("output")?,
            error: row.try_get("error")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_execution(self) -> Result<SkillExecution, RepositoryError> {
        let status: SkillExecutionStatus = parse_status(&self.status)?;
        let input: Value = parse_json(&self.input)?;
        let output = self.output.as_deref().map(parse_json).transpose()?;

        Ok(SkillExecution {
            execution_id: parse_uuid(&self.id)?,
            installation_id: parse_uuid(&self.installation_id)?,
            skill_id: parse_uuid(&self.skill_id)?,
            owner_id: parse_uuid(&self.owner_id)?,
            status,
            input,
            output,
            error_message: self.error,
            started_at: self.started_at.as_deref().map(parse_datetime).transpose()?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct UnitRow {
    id: String,
    execution_id: String,
    unit_id: String,
    target_unit_id: String,
    execution_level: i64,
    status: String,
    input: Option<String>,
    output: Option<String>,
    error: Option<String>,
    retry_count: i64,
    workload_ref: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl UnitRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            execution_id: row.try_get("execution_id")?,
            unit_id: row.try_get("unit_id")?,
            target_unit_id: row.try_get("target_unit_id")?,
            execution_level: row.try_get("execution_level")?,
            status: row.try_get("status")?,
            input: row.try_get("input")?,
            output: row.try_get("output")?,
            error: row.try_get("error")?,
            retry_count: row.try_get("retry_count")?,
            workload_ref: row.try_get("workload_ref")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_unit(self) -> Result<SkillExecutionUnit, RepositoryError> {
        let status: UnitExecutionStatus = parse_status(&self.status)?;

        Ok(SkillExecutionUnit {
            execution_unit_id: parse_uuid(&self.id)?,
            execution_id: parse_uuid(&self.execution_id)?,
            unit_id: self.unit_id,
            target_unit_id: self.target_unit_id,
            execution_level: self.execution_level as u32,
            status,
            input: self.input.as_deref().map(parse_json).transpose()?,
            output: self.output.as_deref().map(parse_json).transpose()?,
            error_message: self.error,
            retry_count: self.retry_count as u32,
            workload_ref: self.workload_ref,
            started_at: self.started_at.as_deref().map(parse_datetime).transpose()?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid timestamp: {e}")))
}

fn parse_json(s: &str) -> Result<Value, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid JSON: {e}")))
}

fn parse_status<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, RepositoryError> {
    serde_json::from_value(Value::String(s.to_string()))
        .map_err(|_| RepositoryError::Query(format!("invalid status: {s}")))
}

fn status_str<T: serde::Serialize>(status: &T) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

fn json_str(value: &Value) -> String {
    value.to_string()
}

fn map_sqlx(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// ExecutionRepository implementation
// ---------------------------------------------------------------------------

impl ExecutionRepository for SqliteExecutionRepository {
    async fn create_execution(&self, execution: &SkillExecution) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO skill_executions
                (id, installation_id, skill_id, owner_id, status, input,
                 output, error, started_at, completed_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(execution.execution_id.to_string())
        .bind(execution.installation_id.to_string())
        .bind(execution.skill_id.to_string())
        .bind(execution.owner_id.to_string())
        .bind(status_str(&execution.status))
        .bind(json_str(&execution.input))
        .bind(execution.output.as_ref().map(json_str))
        .bind(execution.error_message.as_deref())
        .bind(execution.started_at.map(|t| t.to_rfc3339()))
        .bind(execution.completed_at.map(|t| t.to_rfc3339()))
        .bind(execution.created_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<Option<SkillExecution>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM skill_executions WHERE id = ?")
            .bind(execution_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx)?;

        row.map(|r| ExecutionRow::from_row(&r).map_err(map_sqlx)?.into_execution())
            .transpose()
    }

    async fn mark_execution_running(
        &self,
        execution_id: &Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE skill_executions SET status = ?, started_at = ? WHERE id = ?")
            .bind(status_str(&SkillExecutionStatus::Running))
            .bind(started_at.to_rfc3339())
            .bind(execution_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn finish_execution(
        &self,
        execution_id: &Uuid,
        status: SkillExecutionStatus,
        output: Option<&Value>,
        error: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE skill_executions
             SET status = ?, output = ?, error = ?, completed_at = ?
             WHERE id = ?",
        )
        .bind(status_str(&status))
        .bind(output.map(json_str))
        .bind(error)
        .bind(completed_at.to_rfc3339())
        .bind(execution_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list_executions(
        &self,
        skill_id: &Uuid,
        status: Option<SkillExecutionStatus>,
        page: u32,
        per_page: u32,
    ) -> Result<ExecutionPage, RepositoryError> {
        let status_filter = status.map(|s| status_str(&s));
        let offset = (page.saturating_sub(1)) * per_page;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM skill_executions
             WHERE skill_id = ? AND (? IS NULL OR status = ?)",
        )
        .bind(skill_id.to_string())
        .bind(status_filter.as_deref())
        .bind(status_filter.as_deref())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(map_sqlx)?;

        let rows = sqlx::query(
            "SELECT * FROM skill_executions
             WHERE skill_id = ? AND (? IS NULL OR status = ?)
             ORDER BY created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(skill_id.to_string())
        .bind(status_filter.as_deref())
        .bind(status_filter.as_deref())
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx)?;

        let executions = rows
            .iter()
            .map(|r| ExecutionRow::from_row(r).map_err(map_sqlx)?.into_execution())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ExecutionPage {
            executions,
            page,
            per_page,
            total: total as u64,
        })
    }

    async fn list_active_executions(
        &self,
        installation_id: &Uuid,
    ) -> Result<Vec<SkillExecution>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM skill_executions
             WHERE installation_id = ? AND status IN ('pending', 'running')
             ORDER BY created_at ASC",
        )
        .bind(installation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx)?;

        rows.iter()
            .map(|r| ExecutionRow::from_row(r).map_err(map_sqlx)?.into_execution())
            .collect()
    }

    async fn create_unit(&self, unit: &SkillExecutionUnit) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO skill_execution_units
                (id, execution_id, unit_id, target_unit_id, execution_level,
                 status, input, output, error, retry_count, workload_ref,
                 started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(unit.execution_unit_id.to_string())
        .bind(unit.execution_id.to_string())
        .bind(&unit.unit_id)
        .bind(&unit.target_unit_id)
        .bind(unit.execution_level as i64)
        .bind(status_str(&unit.status))
        .bind(unit.input.as_ref().map(json_str))
        .bind(unit.output.as_ref().map(json_str))
        .bind(unit.error_message.as_deref())
        .bind(unit.retry_count as i64)
        .bind(unit.workload_ref.as_deref())
        .bind(unit.started_at.map(|t| t.to_rfc3339()))
        .bind(unit.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_unit(
        &self,
        execution_unit_id: &Uuid,
    ) -> Result<Option<SkillExecutionUnit>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM skill_execution_units WHERE id = ?")
            .bind(execution_unit_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx)?;

        row.map(|r| UnitRow::from_row(&r).map_err(map_sqlx)?.into_unit())
            .transpose()
    }

    async fn list_units(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<SkillExecutionUnit>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM skill_execution_units
             WHERE execution_id = ?
             ORDER BY execution_level ASC, unit_id ASC",
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx)?;

        rows.iter()
            .map(|r| UnitRow::from_row(r).map_err(map_sqlx)?.into_unit())
            .collect()
    }

    async fn list_units_at_level(
        &self,
        execution_id: &Uuid,
        level: u32,
    ) -> Result<Vec<SkillExecutionUnit>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM skill_execution_units
             WHERE execution_id = ? AND execution_level = ?
             ORDER BY unit_id ASC",
        )
        .bind(execution_id.to_string())
        .bind(level as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx)?;

        rows.iter()
            .map(|r| UnitRow::from_row(r).map_err(map_sqlx)?.into_unit())
            .collect()
    }

    async fn list_unfinished_units(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<SkillExecutionUnit>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM skill_execution_units
             WHERE execution_id = ?
               AND status NOT IN ('success', 'failed', 'skipped', 'blocked')
             ORDER BY execution_level ASC, unit_id ASC",
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx)?;

        rows.iter()
            .map(|r| UnitRow::from_row(r).map_err(map_sqlx)?.into_unit())
            .collect()
    }

    async fn mark_unit_queued(
        &self,
        execution_unit_id: &Uuid,
        input: &Value,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE skill_execution_units SET status = ?, input = ? WHERE id = ?")
            .bind(status_str(&UnitExecutionStatus::Queued))
            .bind(json_str(input))
            .bind(execution_unit_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn mark_unit_running(
        &self,
        execution_unit_id: &Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE skill_execution_units SET status = ?, started_at = ? WHERE id = ?")
            .bind(status_str(&UnitExecutionStatus::Running))
            .bind(started_at.to_rfc3339())
            .bind(execution_unit_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_unit_status(
        &self,
        execution_unit_id: &Uuid,
        status: UnitExecutionStatus,
        output: Option<&Value>,
        error: Option<&str>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE skill_execution_units
             SET status = ?,
                 output = COALESCE(?, output),
                 error = COALESCE(?, error),
                 completed_at = COALESCE(?, completed_at)
             WHERE id = ?",
        )
        .bind(status_str(&status))
        .bind(output.map(json_str))
        .bind(error)
        .bind(completed_at.map(|t| t.to_rfc3339()))
        .bind(execution_unit_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn set_unit_workload_ref(
        &self,
        execution_unit_id: &Uuid,
        workload_ref: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE skill_execution_units SET workload_ref = ? WHERE id = ?")
            .bind(workload_ref)
            .bind(execution_unit_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn increment_unit_retry(
        &self,
        execution_unit_id: &Uuid,
    ) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE skill_execution_units
             SET retry_count = retry_count + 1
             WHERE id = ?
             RETURNING retry_count",
        )
        .bind(execution_unit_id.to_string())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(map_sqlx)?
        .ok_or(RepositoryError::NotFound)?;
        Ok(count as u32)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
