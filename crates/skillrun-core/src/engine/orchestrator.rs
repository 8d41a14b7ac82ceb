//! Execution orchestrator: the stateful coordinator of a skill run.
//!
//! Drives the whole lifecycle: builds the plan at `start`, materializes
//! execution and unit rows, dispatches level-by-level onto the work queue,
//! waits for level completion (signal-first, store poll as fallback),
//! applies the data mapper and dependency conditions, cascades blocking
//! through failed units' dependents, retries failing units with backoff,
//! and aggregates the final status and output.
//!
//! # Control flow
//!
//! caller -> `start` -> plan -> rows -> queue (one execute-skill job) ->
//! worker -> `process_execution` -> per level: queue (N execute-unit jobs)
//! -> worker -> `process_workflow` -> workload engine -> terminal row write
//! -> completion signal -> next level -> aggregate.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tokio::time::Instant;
use uuid::Uuid;

use skillrun_types::config::EngineConfig;
use skillrun_types::error::EngineError;
use skillrun_types::execution::{
    ExecutionPage, ExecutionStatusView, SkillExecution, SkillExecutionStatus, SkillExecutionUnit,
    StoppedExecution, UnitExecutionStatus, UnitStatusView,
};
use skillrun_types::job::Job;
use skillrun_types::skill::{OwnerContext, UnitDependency};

use crate::repository::{CatalogRepository, ExecutionRepository};

use super::condition::ConditionEvaluator;
use super::mapper;
use super::plan;
use super::queue::WorkQueue;
use super::retry;
use super::signal::CompletionSignals;
use super::workload::{self, WorkloadEngine, WorkloadOptions, WorkloadStatus};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Cap on `per_page` for execution listings.
pub const MAX_PAGE_SIZE: u32 = 100;

// ---------------------------------------------------------------------------
// ExecutionOrchestrator
// ---------------------------------------------------------------------------

/// The execution engine's coordinator.
///
/// Generic over its four collaborators: execution store, catalog, work
/// queue, and workload engine.
pub struct ExecutionOrchestrator<R, C, Q, W> {
    repo: Arc<R>,
    catalog: Arc<C>,
    queue: Arc<Q>,
    workload: Arc<W>,
    config: EngineConfig,
    evaluator: ConditionEvaluator,
    signals: CompletionSignals,
}

/// Outcome of evaluating a unit's dependency conditions before dispatch.
enum ConditionOutcome {
    Run,
    Skip,
    Error(String),
}

impl<R, C, Q, W> ExecutionOrchestrator<R, C, Q, W>
where
    R: ExecutionRepository,
    C: CatalogRepository,
    Q: WorkQueue,
    W: WorkloadEngine,
{
    pub fn new(
        repo: Arc<R>,
        catalog: Arc<C>,
        queue: Arc<Q>,
        workload: Arc<W>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repo,
            catalog,
            queue,
            workload,
            config,
            evaluator: ConditionEvaluator::new(),
            signals: CompletionSignals::new(),
        }
    }

    /// Dispatch a queue job to the matching entry point.
    pub async fn handle_job(&self, job: Job) -> Result<(), EngineError> {
        match job {
            Job::ExecuteSkill { execution_id } => self.process_execution(execution_id).await,
            Job::ExecuteUnit {
                execution_unit_id,
                execution_id,
            } => self.process_workflow(execution_unit_id, execution_id).await,
        }
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    /// Accept a run request for an installation.
    ///
    /// Builds the plan (cycle errors surface synchronously, before any row
    /// exists), creates the execution and its bound unit rows, enqueues one
    /// execute-skill job, and returns the execution ID immediately.
    pub async fn start(&self, installation_id: Uuid, input: Value) -> Result<Uuid, EngineError> {
        let installation = self
            .catalog
            .get_installation(&installation_id)
            .await?
            .ok_or_else(|| {
                EngineError::SkillNotReady(format!("installation {installation_id} not found"))
            })?;

        if !installation.status.is_runnable() {
            return Err(EngineError::SkillNotReady(format!(
                "installation {installation_id} is not ready to run"
            )));
        }

        let skill = self
            .catalog
            .get_skill(&installation.skill_id)
            .await?
            .ok_or_else(|| {
                EngineError::SkillNotReady(format!("skill {} not found", installation.skill_id))
            })?;

        if skill.units.is_empty() {
            return Err(EngineError::SkillNotReady(
                "skill has no workflow units".to_string(),
            ));
        }

        let plan = plan::build_plan(&skill.units)?;

        // Resolve bindings before creating anything: a run with zero bound
        // units must fail without leaving rows behind.
        let mut bound: Vec<(String, String, u32)> = Vec::new();
        for level in &plan.levels {
            for unit in &level.units {
                match installation.bound_target(&unit.id) {
                    Some(target) => bound.push((unit.id.clone(), target.to_string(), level.level)),
                    None => tracing::warn!(
                        unit_id = unit.id.as_str(),
                        installation_id = %installation_id,
                        "unit has no bound target, excluded from this run"
                    ),
                }
            }
        }
        if bound.is_empty() {
            return Err(EngineError::SkillNotReady(
                "no units with resolved bindings".to_string(),
            ));
        }

        let execution_id = Uuid::now_v7();
        let execution = SkillExecution {
            execution_id,
            installation_id,
            skill_id: skill.skill_id,
            owner_id: installation.owner_id,
            status: SkillExecutionStatus::Pending,
            input,
            output: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        self.repo.create_execution(&execution).await?;

        let materialized = bound.len();
        for (unit_id, target_unit_id, execution_level) in bound {
            let unit = SkillExecutionUnit {
                execution_unit_id: Uuid::now_v7(),
                execution_id,
                unit_id,
                target_unit_id,
                execution_level,
                status: UnitExecutionStatus::Pending,
                input: None,
                output: None,
                error_message: None,
                retry_count: 0,
                workload_ref: None,
                started_at: None,
                completed_at: None,
            };
            self.repo.create_unit(&unit).await?;
        }

        self.queue
            .enqueue(Job::ExecuteSkill { execution_id }, None)
            .await
            .map_err(|e| EngineError::Queue(e.to_string()))?;

        tracing::info!(
            execution_id = %execution_id,
            installation_id = %installation_id,
            skill = skill.name.as_str(),
            units = materialized,
            levels = plan.levels.len(),
            "accepted skill execution"
        );

        Ok(execution_id)
    }

    // -----------------------------------------------------------------------
    // process_execution
    // -----------------------------------------------------------------------

    /// Drive one skill execution level-by-level. Invoked by a queue worker.
    ///
    /// Unit-level failures are absorbed into row state and the aggregate
    /// status; the only error raised here is a missing execution record.
    pub async fn process_execution(&self, execution_id: Uuid) -> Result<(), EngineError> {
        let execution = self
            .repo
            .get_execution(&execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;

        let skill = self
            .catalog
            .get_skill(&execution.skill_id)
            .await?
            .ok_or_else(|| {
                EngineError::Unknown(format!(
                    "skill {} missing for execution {execution_id}",
                    execution.skill_id
                ))
            })?;

        let plan = plan::build_plan(&skill.units)?;
        let deps_by_unit: HashMap<&str, &[UnitDependency]> = skill
            .units
            .iter()
            .map(|u| (u.id.as_str(), u.dependencies.as_slice()))
            .collect();

        self.repo
            .mark_execution_running(&execution_id, Utc::now())
            .await?;
        let signal = self.signals.register(execution_id);

        let all_units = self.repo.list_units(&execution_id).await?;
        let unit_row_ids: HashMap<String, Uuid> = all_units
            .iter()
            .map(|u| (u.unit_id.clone(), u.execution_unit_id))
            .collect();
        let mut levels: BTreeMap<u32, Vec<SkillExecutionUnit>> = BTreeMap::new();
        for unit in all_units {
            levels.entry(unit.execution_level).or_default().push(unit);
        }

        let mut completed_outputs: HashMap<String, Value> = HashMap::new();
        let mut failed: Vec<String> = Vec::new();
        let mut blocked: HashSet<String> = HashSet::new();

        let deadline = Instant::now() + Duration::from_secs(self.config.skill_timeout_secs);

        for (level, rows) in &levels {
            let mut dispatched = 0usize;
            for row in rows {
                if row.status.is_terminal() || blocked.contains(&row.unit_id) {
                    continue;
                }

                let configs = deps_by_unit
                    .get(row.unit_id.as_str())
                    .copied()
                    .unwrap_or(&[]);

                match self.check_conditions(configs, &completed_outputs, &execution.input) {
                    ConditionOutcome::Run => {}
                    ConditionOutcome::Skip => {
                        tracing::debug!(
                            execution_id = %execution_id,
                            unit_id = row.unit_id.as_str(),
                            "dependency condition is false, skipping unit"
                        );
                        self.repo
                            .update_unit_status(
                                &row.execution_unit_id,
                                UnitExecutionStatus::Skipped,
                                None,
                                None,
                                Some(Utc::now()),
                            )
                            .await?;
                        continue;
                    }
                    ConditionOutcome::Error(reason) => {
                        let err = EngineError::ConditionEvalFailed {
                            unit_id: row.unit_id.clone(),
                            reason,
                        };
                        tracing::warn!(
                            execution_id = %execution_id,
                            unit_id = row.unit_id.as_str(),
                            error = %err,
                            "condition evaluation failed, skipping unit"
                        );
                        self.repo
                            .update_unit_status(
                                &row.execution_unit_id,
                                UnitExecutionStatus::Skipped,
                                None,
                                Some(&err.to_string()),
                                Some(Utc::now()),
                            )
                            .await?;
                        continue;
                    }
                }

                let input = mapper::process_data_mapping(
                    &row.unit_id,
                    &execution.input,
                    &completed_outputs,
                    configs,
                );
                self.repo
                    .mark_unit_queued(&row.execution_unit_id, &input)
                    .await?;
                self.queue
                    .enqueue(
                        Job::ExecuteUnit {
                            execution_unit_id: row.execution_unit_id,
                            execution_id,
                        },
                        None,
                    )
                    .await
                    .map_err(|e| EngineError::Queue(e.to_string()))?;
                dispatched += 1;
            }

            tracing::debug!(
                execution_id = %execution_id,
                level,
                dispatched,
                "dispatched execution level"
            );

            // Wait for every row at this level to reach a terminal status.
            // Signal-first; the store poll covers restarts and lost signals.
            let final_rows = loop {
                let rows = self.repo.list_units_at_level(&execution_id, *level).await?;
                if rows.iter().all(|r| r.status.is_terminal()) {
                    break rows;
                }
                if Instant::now() >= deadline {
                    tracing::warn!(
                        execution_id = %execution_id,
                        level,
                        "skill timeout elapsed waiting for level, proceeding with observed state"
                    );
                    break rows;
                }
                tokio::select! {
                    _ = signal.notified() => {}
                    _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
                }
            };

            for row in &final_rows {
                match row.status {
                    UnitExecutionStatus::Success => {
                        completed_outputs.insert(
                            row.unit_id.clone(),
                            row.output.clone().unwrap_or(Value::Null),
                        );
                    }
                    UnitExecutionStatus::Failed => {
                        failed.push(row.unit_id.clone());
                        for blocked_id in plan.blocked_units(&row.unit_id, &blocked) {
                            if let Some(row_id) = unit_row_ids.get(&blocked_id) {
                                self.repo
                                    .update_unit_status(
                                        row_id,
                                        UnitExecutionStatus::Blocked,
                                        None,
                                        Some(&format!(
                                            "blocked by failed unit '{}'",
                                            row.unit_id
                                        )),
                                        Some(Utc::now()),
                                    )
                                    .await?;
                            }
                            blocked.insert(blocked_id);
                        }
                    }
                    _ => {}
                }
            }
        }

        let status = if failed.is_empty() {
            SkillExecutionStatus::Success
        } else if completed_outputs.is_empty() {
            SkillExecutionStatus::Failed
        } else {
            SkillExecutionStatus::PartialFailed
        };

        // An externally triggered cancellation wins over the aggregate.
        let current = self
            .repo
            .get_execution(&execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;
        let final_status = if current.status == SkillExecutionStatus::Cancelled {
            SkillExecutionStatus::Cancelled
        } else {
            status
        };

        let output = Value::Object(
            completed_outputs
                .into_iter()
                .collect::<Map<String, Value>>(),
        );
        let error_message = if failed.is_empty() {
            None
        } else {
            Some(format!("units failed: {}", failed.join(", ")))
        };

        self.repo
            .finish_execution(
                &execution_id,
                final_status,
                Some(&output),
                error_message.as_deref(),
                Utc::now(),
            )
            .await?;
        self.signals.remove(execution_id);

        tracing::info!(
            execution_id = %execution_id,
            status = ?final_status,
            failed = failed.len(),
            "skill execution finished"
        );

        Ok(())
    }

    // -----------------------------------------------------------------------
    // process_workflow
    // -----------------------------------------------------------------------

    /// Run a single unit row against the workload engine. Invoked by a
    /// queue worker, once per execute-unit job.
    ///
    /// Failures never propagate: they are retried per policy or recorded
    /// terminally on the row, isolating the unit from its level siblings.
    pub async fn process_workflow(
        &self,
        execution_unit_id: Uuid,
        execution_id: Uuid,
    ) -> Result<(), EngineError> {
        let unit = self
            .repo
            .get_unit(&execution_unit_id)
            .await?
            .ok_or_else(|| {
                EngineError::Unknown(format!(
                    "unit row {execution_unit_id} missing for execution {execution_id}"
                ))
            })?;

        if unit.status.is_terminal() {
            tracing::debug!(
                execution_unit_id = %execution_unit_id,
                status = ?unit.status,
                "unit already terminal, nothing to do"
            );
            return Ok(());
        }

        let execution = self
            .repo
            .get_execution(&execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;
        let owner = OwnerContext {
            owner_id: execution.owner_id,
            installation_id: execution.installation_id,
        };
        let input = unit.input.clone().unwrap_or_else(|| json!({}));

        self.repo
            .mark_unit_running(&execution_unit_id, Utc::now())
            .await?;

        match self.run_workload(&owner, &unit, &input).await {
            Ok(output) => {
                self.repo
                    .update_unit_status(
                        &execution_unit_id,
                        UnitExecutionStatus::Success,
                        Some(&output),
                        None,
                        Some(Utc::now()),
                    )
                    .await?;
                tracing::info!(
                    execution_id = %execution_id,
                    unit_id = unit.unit_id.as_str(),
                    "unit finished successfully"
                );
            }
            Err(err) => {
                let code = err.code();
                if retry::should_retry(unit.retry_count, code, &self.config.retry) {
                    let delay = retry::backoff_delay(unit.retry_count, &self.config.retry);
                    let attempt = self.repo.increment_unit_retry(&execution_unit_id).await?;
                    self.repo
                        .update_unit_status(
                            &execution_unit_id,
                            UnitExecutionStatus::Queued,
                            None,
                            Some(&err.to_string()),
                            None,
                        )
                        .await?;
                    tracing::warn!(
                        execution_id = %execution_id,
                        unit_id = unit.unit_id.as_str(),
                        retry = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "unit failed, retry scheduled"
                    );
                    self.queue
                        .enqueue(
                            Job::ExecuteUnit {
                                execution_unit_id,
                                execution_id,
                            },
                            Some(delay),
                        )
                        .await
                        .map_err(|e| EngineError::Queue(e.to_string()))?;
                    // The delayed job owns the unit now; no completion signal.
                    return Ok(());
                }

                self.repo
                    .update_unit_status(
                        &execution_unit_id,
                        UnitExecutionStatus::Failed,
                        None,
                        Some(&err.to_string()),
                        Some(Utc::now()),
                    )
                    .await?;
                tracing::warn!(
                    execution_id = %execution_id,
                    unit_id = unit.unit_id.as_str(),
                    retries = unit.retry_count,
                    error = %err,
                    "unit failed terminally"
                );
            }
        }

        self.signals.notify(execution_id);
        Ok(())
    }

    /// Merge variables, start the workload, and poll until terminal.
    async fn run_workload(
        &self,
        owner: &OwnerContext,
        unit: &SkillExecutionUnit,
        input: &Value,
    ) -> Result<Value, EngineError> {
        let declared = self
            .workload
            .variables(owner, &unit.target_unit_id)
            .await
            .map_err(|e| EngineError::Workload(e.to_string()))?;
        let variables = workload::merge_variables(declared, input);

        let options = WorkloadOptions {
            timeout_secs: Some(self.config.unit_timeout_secs),
        };
        let handle = self
            .workload
            .initialize(owner, &unit.target_unit_id, &variables, &options)
            .await
            .map_err(|e| EngineError::Workload(e.to_string()))?;
        self.repo
            .set_unit_workload_ref(&unit.execution_unit_id, &handle)
            .await?;

        let deadline = Instant::now() + Duration::from_secs(self.config.unit_timeout_secs);
        loop {
            let status = self
                .workload
                .status(&handle)
                .await
                .map_err(|e| EngineError::Workload(e.to_string()))?;
            match status {
                WorkloadStatus::Finished { output } => return Ok(output),
                WorkloadStatus::Failed { error } => return Err(EngineError::Workload(error)),
                WorkloadStatus::Pending | WorkloadStatus::Executing => {
                    if Instant::now() >= deadline {
                        return Err(EngineError::WorkflowTimeout {
                            unit_id: unit.unit_id.clone(),
                            timeout_secs: self.config.unit_timeout_secs,
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // stop
    // -----------------------------------------------------------------------

    /// Cancel every pending/running execution of an installation.
    ///
    /// Aborts in-flight workload handles best-effort (a worker mid-step is
    /// not preempted), marks non-terminal unit rows failed, and the
    /// executions cancelled.
    pub async fn stop_running_executions(
        &self,
        installation_id: Uuid,
    ) -> Result<Vec<StoppedExecution>, EngineError> {
        let active = self.repo.list_active_executions(&installation_id).await?;
        if active.is_empty() {
            return Err(EngineError::NoRunningExecutions(installation_id));
        }

        let mut stopped = Vec::new();
        for execution in active {
            let owner = OwnerContext {
                owner_id: execution.owner_id,
                installation_id,
            };
            let mut units_aborted = 0u32;

            for unit in self
                .repo
                .list_unfinished_units(&execution.execution_id)
                .await?
            {
                if let Some(handle) = &unit.workload_ref {
                    if let Err(e) = self.workload.abort(&owner, handle).await {
                        tracing::warn!(
                            execution_id = %execution.execution_id,
                            unit_id = unit.unit_id.as_str(),
                            error = %e,
                            "workload abort failed (best effort)"
                        );
                    }
                }
                self.repo
                    .update_unit_status(
                        &unit.execution_unit_id,
                        UnitExecutionStatus::Failed,
                        None,
                        Some("cancelled by user"),
                        Some(Utc::now()),
                    )
                    .await?;
                units_aborted += 1;
            }

            self.repo
                .finish_execution(
                    &execution.execution_id,
                    SkillExecutionStatus::Cancelled,
                    None,
                    Some("cancelled by user"),
                    Utc::now(),
                )
                .await?;
            self.signals.notify(execution.execution_id);

            tracing::info!(
                execution_id = %execution.execution_id,
                units_aborted,
                "execution cancelled"
            );
            stopped.push(StoppedExecution {
                execution_id: execution.execution_id,
                units_aborted,
            });
        }

        Ok(stopped)
    }

    // -----------------------------------------------------------------------
    // Status surfaces
    // -----------------------------------------------------------------------

    /// Full status view of one execution, including per-unit lines.
    pub async fn get_status(&self, execution_id: Uuid) -> Result<ExecutionStatusView, EngineError> {
        let execution = self
            .repo
            .get_execution(&execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;
        let units = self.repo.list_units(&execution_id).await?;

        Ok(ExecutionStatusView {
            execution_id,
            status: execution.status,
            input: execution.input,
            output: execution.output,
            error_message: execution.error_message,
            unit_statuses: units.iter().map(UnitStatusView::from).collect(),
        })
    }

    /// Paginated execution listing for a skill.
    pub async fn list_executions(
        &self,
        skill_id: Uuid,
        status: Option<SkillExecutionStatus>,
        page: u32,
        per_page: u32,
    ) -> Result<ExecutionPage, EngineError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        Ok(self
            .repo
            .list_executions(&skill_id, status, page, per_page)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Evaluate every dependency condition of a unit.
    ///
    /// A dependency that left no output evaluates against `Null`; the first
    /// false condition skips the unit, the first evaluation error records
    /// it. Units are never silently run past a broken condition.
    fn check_conditions(
        &self,
        configs: &[UnitDependency],
        completed_outputs: &HashMap<String, Value>,
        input: &Value,
    ) -> ConditionOutcome {
        for config in configs {
            let Some(condition) = &config.condition else {
                continue;
            };
            let output = completed_outputs
                .get(&config.dependency_id)
                .cloned()
                .unwrap_or(Value::Null);
            match self.evaluator.evaluate(condition, &output, input) {
                Ok(true) => {}
                Ok(false) => return ConditionOutcome::Skip,
                Err(e) => return ConditionOutcome::Error(e.to_string()),
            }
        }
        ConditionOutcome::Run
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    use skillrun_types::skill::{
        BindingStatus, Installation, InstallationStatus, SkillDefinition, UnitBinding,
        WorkflowUnitInfo,
    };

    use crate::engine::queue::QueueError;
    use crate::engine::workload::{WorkloadError, WorkloadVariable};

    // -----------------------------------------------------------------------
    // In-memory repository
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryRepo {
        executions: Mutex<HashMap<Uuid, SkillExecution>>,
        units: Mutex<HashMap<Uuid, SkillExecutionUnit>>,
    }

    impl MemoryRepo {
        fn unit_by_id(&self, unit_id: &str) -> Option<SkillExecutionUnit> {
            self.units
                .lock()
                .unwrap()
                .values()
                .find(|u| u.unit_id == unit_id)
                .cloned()
        }
    }

    impl ExecutionRepository for MemoryRepo {
        async fn create_execution(
            &self,
            execution: &SkillExecution,
        ) -> Result<(), skillrun_types::error::RepositoryError> {
            self.executions
                .lock()
                .unwrap()
                .insert(execution.execution_id, execution.clone());
            Ok(())
        }

        async fn get_execution(
            &self,
            execution_id: &Uuid,
        ) -> Result<Option<SkillExecution>, skillrun_types::error::RepositoryError> {
            Ok(self.executions.lock().unwrap().get(execution_id).cloned())
        }

        async fn mark_execution_running(
            &self,
            execution_id: &Uuid,
            started_at: chrono::DateTime<Utc>,
        ) -> Result<(), skillrun_types::error::RepositoryError> {
            if let Some(e) = self.executions.lock().unwrap().get_mut(execution_id) {
                e.status = SkillExecutionStatus::Running;
                e.started_at = Some(started_at);
            }
            Ok(())
        }

        async fn finish_execution(
            &self,
            execution_id: &Uuid,
            status: SkillExecutionStatus,
            output: Option<&Value>,
            error: Option<&str>,
            completed_at: chrono::DateTime<Utc>,
        ) -> Result<(), skillrun_types::error::RepositoryError> {
            if let Some(e) = self.executions.lock().unwrap().get_mut(execution_id) {
                e.status = status;
                e.output = output.cloned();
                e.error_message = error.map(String::from);
                e.completed_at = Some(completed_at);
            }
            Ok(())
        }

        async fn list_executions(
            &self,
            skill_id: &Uuid,
            status: Option<SkillExecutionStatus>,
            page: u32,
            per_page: u32,
        ) -> Result<ExecutionPage, skillrun_types::error::RepositoryError> {
            let mut matching: Vec<SkillExecution> = self
                .executions
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.skill_id == *skill_id)
                .filter(|e| status.is_none_or(|s| e.status == s))
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let total = matching.len() as u64;
            let start = ((page - 1) * per_page) as usize;
            let executions = matching
                .into_iter()
                .skip(start)
                .take(per_page as usize)
                .collect();
            Ok(ExecutionPage {
                executions,
                page,
                per_page,
                total,
            })
        }

        async fn list_active_executions(
            &self,
            installation_id: &Uuid,
        ) -> Result<Vec<SkillExecution>, skillrun_types::error::RepositoryError> {
            Ok(self
                .executions
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.installation_id == *installation_id)
                .filter(|e| {
                    matches!(
                        e.status,
                        SkillExecutionStatus::Pending | SkillExecutionStatus::Running
                    )
                })
                .cloned()
                .collect())
        }

        async fn create_unit(
            &self,
            unit: &SkillExecutionUnit,
        ) -> Result<(), skillrun_types::error::RepositoryError> {
            self.units
                .lock()
                .unwrap()
                .insert(unit.execution_unit_id, unit.clone());
            Ok(())
        }

        async fn get_unit(
            &self,
            execution_unit_id: &Uuid,
        ) -> Result<Option<SkillExecutionUnit>, skillrun_types::error::RepositoryError> {
            Ok(self.units.lock().unwrap().get(execution_unit_id).cloned())
        }

        async fn list_units(
            &self,
            execution_id: &Uuid,
        ) -> Result<Vec<SkillExecutionUnit>, skillrun_types::error::RepositoryError> {
            let mut units: Vec<SkillExecutionUnit> = self
                .units
                .lock()
                .unwrap()
                .values()
                .filter(|u| u.execution_id == *execution_id)
                .cloned()
                .collect();
            units.sort_by(|a, b| {
                a.execution_level
                    .cmp(&b.execution_level)
                    .then(a.unit_id.cmp(&b.unit_id))
            });
            Ok(units)
        }

        async fn list_units_at_level(
            &self,
            execution_id: &Uuid,
            level: u32,
        ) -> Result<Vec<SkillExecutionUnit>, skillrun_types::error::RepositoryError> {
            Ok(self
                .units
                .lock()
                .unwrap()
                .values()
                .filter(|u| u.execution_id == *execution_id && u.execution_level == level)
                .cloned()
                .collect())
        }

        async fn list_unfinished_units(
            &self,
            execution_id: &Uuid,
        ) -> Result<Vec<SkillExecutionUnit>, skillrun_types::error::RepositoryError> {
            Ok(self
                .units
                .lock()
                .unwrap()
                .values()
                .filter(|u| u.execution_id == *execution_id && !u.status.is_terminal())
                .cloned()
                .collect())
        }

        async fn mark_unit_queued(
            &self,
            execution_unit_id: &Uuid,
            input: &Value,
        ) -> Result<(), skillrun_types::error::RepositoryError> {
            if let Some(u) = self.units.lock().unwrap().get_mut(execution_unit_id) {
                u.status = UnitExecutionStatus::Queued;
                u.input = Some(input.clone());
            }
            Ok(())
        }

        async fn mark_unit_running(
            &self,
            execution_unit_id: &Uuid,
            started_at: chrono::DateTime<Utc>,
        ) -> Result<(), skillrun_types::error::RepositoryError> {
            if let Some(u) = self.units.lock().unwrap().get_mut(execution_unit_id) {
                u.status = UnitExecutionStatus::Running;
                u.started_at = Some(started_at);
            }
            Ok(())
        }

        async fn update_unit_status(
            &self,
            execution_unit_id: &Uuid,
            status: UnitExecutionStatus,
            output: Option<&Value>,
            error: Option<&str>,
            completed_at: Option<chrono::DateTime<Utc>>,
        ) -> Result<(), skillrun_types::error::RepositoryError> {
            if let Some(u) = self.units.lock().unwrap().get_mut(execution_unit_id) {
                u.status = status;
                if output.is_some() {
                    u.output = output.cloned();
                }
                if error.is_some() {
                    u.error_message = error.map(String::from);
                }
                if completed_at.is_some() {
                    u.completed_at = completed_at;
                }
            }
            Ok(())
        }

        async fn set_unit_workload_ref(
            &self,
            execution_unit_id: &Uuid,
            workload_ref: &str,
        ) -> Result<(), skillrun_types::error::RepositoryError> {
            if let Some(u) = self.units.lock().unwrap().get_mut(execution_unit_id) {
                u.workload_ref = Some(workload_ref.to_string());
            }
            Ok(())
        }

        async fn increment_unit_retry(
            &self,
            execution_unit_id: &Uuid,
        ) -> Result<u32, skillrun_types::error::RepositoryError> {
            let mut units = self.units.lock().unwrap();
            let unit = units
                .get_mut(execution_unit_id)
                .ok_or(skillrun_types::error::RepositoryError::NotFound)?;
            unit.retry_count += 1;
            Ok(unit.retry_count)
        }
    }

    // -----------------------------------------------------------------------
    // In-memory catalog
    // -----------------------------------------------------------------------

    struct MemoryCatalog {
        installation: Installation,
        skill: SkillDefinition,
    }

    impl CatalogRepository for MemoryCatalog {
        async fn get_installation(
            &self,
            installation_id: &Uuid,
        ) -> Result<Option<Installation>, skillrun_types::error::RepositoryError> {
            Ok((self.installation.installation_id == *installation_id)
                .then(|| self.installation.clone()))
        }

        async fn get_skill(
            &self,
            skill_id: &Uuid,
        ) -> Result<Option<SkillDefinition>, skillrun_types::error::RepositoryError> {
            Ok((self.skill.skill_id == *skill_id).then(|| self.skill.clone()))
        }
    }

    // -----------------------------------------------------------------------
    // Queues
    // -----------------------------------------------------------------------

    /// Records enqueued jobs without executing anything.
    #[derive(Default)]
    struct RecordingQueue {
        jobs: Mutex<Vec<(Job, Option<StdDuration>)>>,
    }

    impl WorkQueue for RecordingQueue {
        async fn enqueue(
            &self,
            job: Job,
            delay: Option<StdDuration>,
        ) -> Result<(), QueueError> {
            self.jobs.lock().unwrap().push((job, delay));
            Ok(())
        }
    }

    /// Simulates workers: execute-unit jobs write their scripted terminal
    /// status straight to the repository.
    struct InlineWorkerQueue {
        repo: Arc<MemoryRepo>,
        // unit_id -> Ok(output) | Err(error message)
        outcomes: HashMap<String, Result<Value, String>>,
    }

    impl WorkQueue for InlineWorkerQueue {
        async fn enqueue(
            &self,
            job: Job,
            _delay: Option<StdDuration>,
        ) -> Result<(), QueueError> {
            if let Job::ExecuteUnit {
                execution_unit_id, ..
            } = job
            {
                let unit_id = {
                    let units = self.repo.units.lock().unwrap();
                    units[&execution_unit_id].unit_id.clone()
                };
                let outcome = self.outcomes.get(&unit_id).cloned().unwrap_or_else(|| {
                    Ok(json!({ "echo": unit_id }))
                });
                let mut units = self.repo.units.lock().unwrap();
                let unit = units.get_mut(&execution_unit_id).unwrap();
                match outcome {
                    Ok(output) => {
                        unit.status = UnitExecutionStatus::Success;
                        unit.output = Some(output);
                    }
                    Err(error) => {
                        unit.status = UnitExecutionStatus::Failed;
                        unit.error_message = Some(error);
                    }
                }
                unit.completed_at = Some(Utc::now());
            }
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Scripted workload engine
    // -----------------------------------------------------------------------

    /// Workload engine with a scripted outcome per target and an optional
    /// number of leading failures (for retry tests).
    struct ScriptedWorkload {
        outcomes: HashMap<String, Result<Value, String>>,
        failures_before_success: Mutex<HashMap<String, u32>>,
        declared: HashMap<String, Vec<WorkloadVariable>>,
        aborted: Mutex<Vec<String>>,
    }

    impl ScriptedWorkload {
        fn succeeding(target: &str, output: Value) -> Self {
            Self {
                outcomes: HashMap::from([(target.to_string(), Ok(output))]),
                failures_before_success: Mutex::new(HashMap::new()),
                declared: HashMap::new(),
                aborted: Mutex::new(Vec::new()),
            }
        }

        fn failing(target: &str, error: &str) -> Self {
            Self {
                outcomes: HashMap::from([(target.to_string(), Err(error.to_string()))]),
                failures_before_success: Mutex::new(HashMap::new()),
                declared: HashMap::new(),
                aborted: Mutex::new(Vec::new()),
            }
        }
    }

    impl WorkloadEngine for ScriptedWorkload {
        async fn variables(
            &self,
            _owner: &OwnerContext,
            target_id: &str,
        ) -> Result<Vec<WorkloadVariable>, WorkloadError> {
            Ok(self.declared.get(target_id).cloned().unwrap_or_default())
        }

        async fn initialize(
            &self,
            _owner: &OwnerContext,
            target_id: &str,
            _variables: &[WorkloadVariable],
            _options: &WorkloadOptions,
        ) -> Result<String, WorkloadError> {
            Ok(format!("h-{target_id}"))
        }

        async fn status(&self, handle: &str) -> Result<WorkloadStatus, WorkloadError> {
            let target = handle.strip_prefix("h-").unwrap_or(handle);
            {
                let mut remaining = self.failures_before_success.lock().unwrap();
                if let Some(count) = remaining.get_mut(target) {
                    if *count > 0 {
                        *count -= 1;
                        return Ok(WorkloadStatus::Failed {
                            error: "transient failure".to_string(),
                        });
                    }
                }
            }
            match self.outcomes.get(target) {
                Some(Ok(output)) => Ok(WorkloadStatus::Finished {
                    output: output.clone(),
                }),
                Some(Err(error)) => Ok(WorkloadStatus::Failed {
                    error: error.clone(),
                }),
                None => Ok(WorkloadStatus::Finished {
                    output: json!({}),
                }),
            }
        }

        async fn abort(
            &self,
            _owner: &OwnerContext,
            handle: &str,
        ) -> Result<(), WorkloadError> {
            self.aborted.lock().unwrap().push(handle.to_string());
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------------

    fn unit(id: &str, deps: Vec<UnitDependency>) -> WorkflowUnitInfo {
        WorkflowUnitInfo {
            id: id.to_string(),
            name: id.to_string(),
            dependencies: deps,
        }
    }

    fn edge(dep: &str) -> UnitDependency {
        UnitDependency {
            dependency_id: dep.to_string(),
            condition: None,
            input_mapping: None,
            output_selector: None,
            merge_strategy: None,
        }
    }

    fn catalog(units: Vec<WorkflowUnitInfo>, bound: &[&str]) -> MemoryCatalog {
        let skill_id = Uuid::now_v7();
        let unit_bindings = units
            .iter()
            .filter(|u| bound.contains(&u.id.as_str()))
            .map(|u| {
                (
                    u.id.clone(),
                    UnitBinding {
                        target_id: format!("wf-{}", u.id),
                        status: BindingStatus::Bound,
                    },
                )
            })
            .collect();

        MemoryCatalog {
            installation: Installation {
                installation_id: Uuid::now_v7(),
                skill_id,
                owner_id: Uuid::now_v7(),
                status: InstallationStatus::Ready,
                unit_bindings,
            },
            skill: SkillDefinition {
                skill_id,
                name: "test-skill".to_string(),
                version: "1.0.0".to_string(),
                description: None,
                units,
            },
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            poll_interval_ms: 10,
            unit_timeout_secs: 2,
            skill_timeout_secs: 5,
            queue_concurrency: 4,
            retry: skillrun_types::config::RetryPolicy {
                max_retries: 2,
                backoff_ms: 50,
                backoff_multiplier: 2.0,
                max_backoff_ms: 500,
                retryable_error_codes: Vec::new(),
            },
        }
    }

    type TestOrchestrator<Q, W> =
        ExecutionOrchestrator<MemoryRepo, MemoryCatalog, Q, W>;

    fn orchestrator<Q: WorkQueue, W: WorkloadEngine>(
        repo: Arc<MemoryRepo>,
        cat: MemoryCatalog,
        queue: Arc<Q>,
        wl: Arc<W>,
    ) -> TestOrchestrator<Q, W> {
        ExecutionOrchestrator::new(repo, Arc::new(cat), queue, wl, test_config())
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_creates_rows_and_enqueues_one_job() {
        let cat = catalog(
            vec![unit("a", vec![]), unit("b", vec![edge("a")])],
            &["a", "b"],
        );
        let installation_id = cat.installation.installation_id;
        let repo = Arc::new(MemoryRepo::default());
        let queue = Arc::new(RecordingQueue::default());
        let wl = Arc::new(ScriptedWorkload::succeeding("wf-a", json!({})));
        let orch = orchestrator(Arc::clone(&repo), cat, Arc::clone(&queue), wl);

        let execution_id = orch
            .start(installation_id, json!({"query": "x"}))
            .await
            .unwrap();

        let execution = repo.get_execution(&execution_id).await.unwrap().unwrap();
        assert_eq!(execution.status, SkillExecutionStatus::Pending);
        assert_eq!(execution.input, json!({"query": "x"}));

        let units = repo.list_units(&execution_id).await.unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].unit_id, "a");
        assert_eq!(units[0].execution_level, 0);
        assert_eq!(units[0].target_unit_id, "wf-a");
        assert_eq!(units[1].execution_level, 1);
        assert!(units.iter().all(|u| u.status == UnitExecutionStatus::Pending));

        let jobs = queue.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, Job::ExecuteSkill { execution_id });
    }

    #[tokio::test]
    async fn test_start_rejects_unready_installation() {
        let mut cat = catalog(vec![unit("a", vec![])], &["a"]);
        cat.installation.status = InstallationStatus::Pending;
        let installation_id = cat.installation.installation_id;
        let repo = Arc::new(MemoryRepo::default());
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            Arc::new(ScriptedWorkload::succeeding("wf-a", json!({}))),
        );

        let err = orch.start(installation_id, json!({})).await.unwrap_err();
        assert_eq!(err.code(), "SKILL_NOT_READY");
        assert!(repo.executions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_zero_bound_units_creates_nothing() {
        let cat = catalog(vec![unit("a", vec![]), unit("b", vec![])], &[]);
        let installation_id = cat.installation.installation_id;
        let repo = Arc::new(MemoryRepo::default());
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            Arc::new(ScriptedWorkload::succeeding("wf-a", json!({}))),
        );

        let err = orch.start(installation_id, json!({})).await.unwrap_err();
        assert_eq!(err.code(), "SKILL_NOT_READY");
        assert!(repo.executions.lock().unwrap().is_empty());
        assert!(repo.units.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_surfaces_cycle_synchronously() {
        let cat = catalog(
            vec![unit("a", vec![edge("b")]), unit("b", vec![edge("a")])],
            &["a", "b"],
        );
        let installation_id = cat.installation.installation_id;
        let repo = Arc::new(MemoryRepo::default());
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            Arc::new(ScriptedWorkload::succeeding("wf-a", json!({}))),
        );

        let err = orch.start(installation_id, json!({})).await.unwrap_err();
        assert_eq!(err.code(), "CIRCULAR_DEPENDENCY");
        assert!(repo.executions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_excludes_unbound_units() {
        let cat = catalog(vec![unit("a", vec![]), unit("b", vec![])], &["a"]);
        let installation_id = cat.installation.installation_id;
        let repo = Arc::new(MemoryRepo::default());
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            Arc::new(ScriptedWorkload::succeeding("wf-a", json!({}))),
        );

        let execution_id = orch.start(installation_id, json!({})).await.unwrap();
        let units = repo.list_units(&execution_id).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_id, "a");
    }

    // -----------------------------------------------------------------------
    // process_execution
    // -----------------------------------------------------------------------

    /// Run start + process_execution with scripted per-unit outcomes.
    async fn run_to_completion(
        units: Vec<WorkflowUnitInfo>,
        bound: &[&str],
        outcomes: HashMap<String, Result<Value, String>>,
        input: Value,
    ) -> (Arc<MemoryRepo>, Uuid, SkillExecution) {
        let cat = catalog(units, bound);
        let installation_id = cat.installation.installation_id;
        let repo = Arc::new(MemoryRepo::default());
        let queue = Arc::new(InlineWorkerQueue {
            repo: Arc::clone(&repo),
            outcomes,
        });
        let wl = Arc::new(ScriptedWorkload::succeeding("unused", json!({})));
        let orch = orchestrator(Arc::clone(&repo), cat, queue, wl);

        let execution_id = orch.start(installation_id, input).await.unwrap();
        orch.process_execution(execution_id).await.unwrap();
        let execution = repo.get_execution(&execution_id).await.unwrap().unwrap();
        (repo, execution_id, execution)
    }

    #[tokio::test]
    async fn test_process_execution_chain_success_and_mapping() {
        let units = vec![
            unit("a", vec![]),
            unit("b", vec![edge("a")]),
        ];
        let outcomes = HashMap::from([
            ("a".to_string(), Ok(json!({"count": 2}))),
            ("b".to_string(), Ok(json!({"done": true}))),
        ]);

        let (repo, _execution_id, execution) =
            run_to_completion(units, &["a", "b"], outcomes, json!({"base": 1})).await;

        assert_eq!(execution.status, SkillExecutionStatus::Success);
        assert!(execution.error_message.is_none());
        let output = execution.output.unwrap();
        assert_eq!(output["a"], json!({"count": 2}));
        assert_eq!(output["b"], json!({"done": true}));

        // b's input was mapped from the base input plus a's output
        let b = repo.unit_by_id("b").unwrap();
        assert_eq!(b.input, Some(json!({"base": 1, "count": 2})));
    }

    #[tokio::test]
    async fn test_process_execution_partial_failure() {
        // Two level-0 units: one succeeds, one fails terminally
        let units = vec![unit("ok", vec![]), unit("bad", vec![])];
        let outcomes = HashMap::from([
            ("ok".to_string(), Ok(json!({"v": 1}))),
            ("bad".to_string(), Err("boom".to_string())),
        ]);

        let (repo, _execution_id, execution) =
            run_to_completion(units, &["ok", "bad"], outcomes, json!({})).await;

        assert_eq!(execution.status, SkillExecutionStatus::PartialFailed);
        let output = execution.output.unwrap();
        assert_eq!(output["ok"], json!({"v": 1}));
        assert!(output.get("bad").is_none(), "failed units leave no output");
        assert_eq!(
            execution.error_message.as_deref(),
            Some("units failed: bad")
        );
        assert_eq!(
            repo.unit_by_id("bad").unwrap().status,
            UnitExecutionStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_process_execution_cascades_blocking() {
        // a -> b -> c; a fails, so b and c are blocked and nothing succeeds
        let units = vec![
            unit("a", vec![]),
            unit("b", vec![edge("a")]),
            unit("c", vec![edge("b")]),
        ];
        let outcomes = HashMap::from([("a".to_string(), Err("boom".to_string()))]);

        let (repo, _execution_id, execution) =
            run_to_completion(units, &["a", "b", "c"], outcomes, json!({})).await;

        assert_eq!(execution.status, SkillExecutionStatus::Failed);
        assert_eq!(
            repo.unit_by_id("b").unwrap().status,
            UnitExecutionStatus::Blocked
        );
        assert_eq!(
            repo.unit_by_id("c").unwrap().status,
            UnitExecutionStatus::Blocked
        );
        assert!(
            repo.unit_by_id("b")
                .unwrap()
                .error_message
                .unwrap()
                .contains("blocked by failed unit 'a'")
        );
    }

    #[tokio::test]
    async fn test_process_execution_condition_false_skips_unit() {
        let mut gate = edge("a");
        gate.condition = Some("dependency.output.count > 0".to_string());
        let units = vec![unit("a", vec![]), unit("b", vec![gate])];
        let outcomes = HashMap::from([("a".to_string(), Ok(json!({"count": 0})))]);

        let (repo, _execution_id, execution) =
            run_to_completion(units, &["a", "b"], outcomes, json!({})).await;

        assert_eq!(execution.status, SkillExecutionStatus::Success);
        assert_eq!(
            repo.unit_by_id("b").unwrap().status,
            UnitExecutionStatus::Skipped
        );
        let output = execution.output.unwrap();
        assert!(output.get("b").is_none());
    }

    #[tokio::test]
    async fn test_process_execution_condition_error_records_and_skips() {
        let mut gate = edge("a");
        gate.condition = Some("dependency.output.count >".to_string()); // malformed
        let units = vec![unit("a", vec![]), unit("b", vec![gate])];
        let outcomes = HashMap::from([("a".to_string(), Ok(json!({"count": 1})))]);

        let (repo, _execution_id, _execution) =
            run_to_completion(units, &["a", "b"], outcomes, json!({})).await;

        let b = repo.unit_by_id("b").unwrap();
        assert_eq!(b.status, UnitExecutionStatus::Skipped);
        assert!(
            b.error_message
                .unwrap()
                .contains("condition evaluation failed")
        );
    }

    #[tokio::test]
    async fn test_process_execution_missing_record_is_fatal() {
        let cat = catalog(vec![unit("a", vec![])], &["a"]);
        let repo = Arc::new(MemoryRepo::default());
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            Arc::new(ScriptedWorkload::succeeding("wf-a", json!({}))),
        );

        let err = orch.process_execution(Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code(), "EXECUTION_NOT_FOUND");
    }

    // -----------------------------------------------------------------------
    // process_workflow
    // -----------------------------------------------------------------------

    /// Materialize a single queued unit row ready for process_workflow.
    async fn queued_unit(
        repo: &MemoryRepo,
        target: &str,
        input: Value,
    ) -> (Uuid, Uuid) {
        let execution_id = Uuid::now_v7();
        let execution = SkillExecution {
            execution_id,
            installation_id: Uuid::now_v7(),
            skill_id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            status: SkillExecutionStatus::Running,
            input: json!({}),
            output: None,
            error_message: None,
            started_at: Some(Utc::now()),
            completed_at: None,
            created_at: Utc::now(),
        };
        repo.create_execution(&execution).await.unwrap();

        let execution_unit_id = Uuid::now_v7();
        let unit = SkillExecutionUnit {
            execution_unit_id,
            execution_id,
            unit_id: "work".to_string(),
            target_unit_id: target.to_string(),
            execution_level: 0,
            status: UnitExecutionStatus::Queued,
            input: Some(input),
            output: None,
            error_message: None,
            retry_count: 0,
            workload_ref: None,
            started_at: None,
            completed_at: None,
        };
        repo.create_unit(&unit).await.unwrap();
        (execution_unit_id, execution_id)
    }

    #[tokio::test]
    async fn test_process_workflow_success_captures_output() {
        let cat = catalog(vec![unit("work", vec![])], &["work"]);
        let repo = Arc::new(MemoryRepo::default());
        let wl = Arc::new(ScriptedWorkload::succeeding("wf-1", json!({"n": 5})));
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            wl,
        );

        let (unit_id, execution_id) = queued_unit(&repo, "wf-1", json!({"q": 1})).await;
        orch.process_workflow(unit_id, execution_id).await.unwrap();

        let row = repo.get_unit(&unit_id).await.unwrap().unwrap();
        assert_eq!(row.status, UnitExecutionStatus::Success);
        assert_eq!(row.output, Some(json!({"n": 5})));
        assert_eq!(row.workload_ref.as_deref(), Some("h-wf-1"));
        assert!(row.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_process_workflow_schedules_retry_with_backoff() {
        let cat = catalog(vec![unit("work", vec![])], &["work"]);
        let repo = Arc::new(MemoryRepo::default());
        let queue = Arc::new(RecordingQueue::default());
        let wl = Arc::new(ScriptedWorkload::failing("wf-1", "engine exploded"));
        let orch = orchestrator(Arc::clone(&repo), cat, Arc::clone(&queue), wl);

        let (unit_id, execution_id) = queued_unit(&repo, "wf-1", json!({})).await;

        // First attempt: retry 1 scheduled at base backoff
        orch.process_workflow(unit_id, execution_id).await.unwrap();
        let row = repo.get_unit(&unit_id).await.unwrap().unwrap();
        assert_eq!(row.status, UnitExecutionStatus::Queued);
        assert_eq!(row.retry_count, 1);
        {
            let jobs = queue.jobs.lock().unwrap();
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].1, Some(StdDuration::from_millis(50)));
        }

        // Second attempt: retry 2 at doubled backoff
        orch.process_workflow(unit_id, execution_id).await.unwrap();
        let row = repo.get_unit(&unit_id).await.unwrap().unwrap();
        assert_eq!(row.retry_count, 2);
        {
            let jobs = queue.jobs.lock().unwrap();
            assert_eq!(jobs[1].1, Some(StdDuration::from_millis(100)));
        }

        // Third attempt: retries exhausted, terminal failure
        orch.process_workflow(unit_id, execution_id).await.unwrap();
        let row = repo.get_unit(&unit_id).await.unwrap().unwrap();
        assert_eq!(row.status, UnitExecutionStatus::Failed);
        assert!(row.error_message.unwrap().contains("engine exploded"));
        assert_eq!(queue.jobs.lock().unwrap().len(), 2, "no further re-enqueue");
    }

    #[tokio::test]
    async fn test_process_workflow_allow_list_fails_fast() {
        let cat = catalog(vec![unit("work", vec![])], &["work"]);
        let repo = Arc::new(MemoryRepo::default());
        let queue = Arc::new(RecordingQueue::default());
        let wl = Arc::new(ScriptedWorkload::failing("wf-1", "hard failure"));
        let mut config = test_config();
        config.retry.retryable_error_codes = vec!["WORKFLOW_TIMEOUT".to_string()];
        let orch = ExecutionOrchestrator::new(
            Arc::clone(&repo),
            Arc::new(cat),
            Arc::clone(&queue),
            wl,
            config,
        );

        let (unit_id, execution_id) = queued_unit(&repo, "wf-1", json!({})).await;
        orch.process_workflow(unit_id, execution_id).await.unwrap();

        // WORKLOAD_ERROR is not allow-listed: terminal on the first attempt
        let row = repo.get_unit(&unit_id).await.unwrap().unwrap();
        assert_eq!(row.status, UnitExecutionStatus::Failed);
        assert_eq!(row.retry_count, 0);
        assert!(queue.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_workflow_retries_then_succeeds() {
        let cat = catalog(vec![unit("work", vec![])], &["work"]);
        let repo = Arc::new(MemoryRepo::default());
        let queue = Arc::new(RecordingQueue::default());
        let mut wl = ScriptedWorkload::succeeding("wf-1", json!({"ok": true}));
        wl.failures_before_success =
            Mutex::new(HashMap::from([("wf-1".to_string(), 1)]));
        let orch = orchestrator(Arc::clone(&repo), cat, Arc::clone(&queue), Arc::new(wl));

        let (unit_id, execution_id) = queued_unit(&repo, "wf-1", json!({})).await;

        orch.process_workflow(unit_id, execution_id).await.unwrap();
        assert_eq!(
            repo.get_unit(&unit_id).await.unwrap().unwrap().status,
            UnitExecutionStatus::Queued
        );

        orch.process_workflow(unit_id, execution_id).await.unwrap();
        let row = repo.get_unit(&unit_id).await.unwrap().unwrap();
        assert_eq!(row.status, UnitExecutionStatus::Success);
        assert_eq!(row.output, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_process_workflow_merges_declared_variables() {
        let cat = catalog(vec![unit("work", vec![])], &["work"]);
        let repo = Arc::new(MemoryRepo::default());
        let mut wl = ScriptedWorkload::succeeding("wf-1", json!({}));
        wl.declared = HashMap::from([(
            "wf-1".to_string(),
            vec![WorkloadVariable {
                id: "v1".to_string(),
                key: "query".to_string(),
                value: json!("stale"),
            }],
        )]);
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            Arc::new(wl),
        );

        let (unit_id, execution_id) =
            queued_unit(&repo, "wf-1", json!({"query": "fresh"})).await;
        orch.process_workflow(unit_id, execution_id).await.unwrap();

        let row = repo.get_unit(&unit_id).await.unwrap().unwrap();
        assert_eq!(row.status, UnitExecutionStatus::Success);
    }

    // -----------------------------------------------------------------------
    // stop
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_stop_cancels_running_executions() {
        let cat = catalog(vec![unit("work", vec![])], &["work"]);
        let installation_id = cat.installation.installation_id;
        let repo = Arc::new(MemoryRepo::default());
        let wl = Arc::new(ScriptedWorkload::succeeding("wf-1", json!({})));
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            Arc::clone(&wl),
        );

        // A running execution with one in-flight unit
        let execution_id = Uuid::now_v7();
        let execution = SkillExecution {
            execution_id,
            installation_id,
            skill_id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            status: SkillExecutionStatus::Running,
            input: json!({}),
            output: None,
            error_message: None,
            started_at: Some(Utc::now()),
            completed_at: None,
            created_at: Utc::now(),
        };
        repo.create_execution(&execution).await.unwrap();
        let unit_row = SkillExecutionUnit {
            execution_unit_id: Uuid::now_v7(),
            execution_id,
            unit_id: "work".to_string(),
            target_unit_id: "wf-1".to_string(),
            execution_level: 0,
            status: UnitExecutionStatus::Running,
            input: Some(json!({})),
            output: None,
            error_message: None,
            retry_count: 0,
            workload_ref: Some("h-wf-1".to_string()),
            started_at: Some(Utc::now()),
            completed_at: None,
        };
        repo.create_unit(&unit_row).await.unwrap();

        let stopped = orch.stop_running_executions(installation_id).await.unwrap();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].execution_id, execution_id);
        assert_eq!(stopped[0].units_aborted, 1);

        let execution = repo.get_execution(&execution_id).await.unwrap().unwrap();
        assert_eq!(execution.status, SkillExecutionStatus::Cancelled);
        let row = repo
            .get_unit(&unit_row.execution_unit_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, UnitExecutionStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some("cancelled by user"));
        assert_eq!(wl.aborted.lock().unwrap().as_slice(), ["h-wf-1"]);
    }

    #[tokio::test]
    async fn test_stop_without_active_executions_errors() {
        let cat = catalog(vec![unit("work", vec![])], &["work"]);
        let installation_id = cat.installation.installation_id;
        let repo = Arc::new(MemoryRepo::default());
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            Arc::new(ScriptedWorkload::succeeding("wf-1", json!({}))),
        );

        let err = orch
            .stop_running_executions(installation_id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NO_RUNNING_EXECUTIONS");
    }

    // -----------------------------------------------------------------------
    // Status surfaces
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_status_view() {
        let cat = catalog(vec![unit("a", vec![]), unit("b", vec![edge("a")])], &["a", "b"]);
        let installation_id = cat.installation.installation_id;
        let repo = Arc::new(MemoryRepo::default());
        let queue = Arc::new(InlineWorkerQueue {
            repo: Arc::clone(&repo),
            outcomes: HashMap::from([
                ("a".to_string(), Ok(json!({"v": 1}))),
                ("b".to_string(), Err("boom".to_string())),
            ]),
        });
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            queue,
            Arc::new(ScriptedWorkload::succeeding("unused", json!({}))),
        );

        let execution_id = orch.start(installation_id, json!({"in": true})).await.unwrap();
        orch.process_execution(execution_id).await.unwrap();

        let view = orch.get_status(execution_id).await.unwrap();
        assert_eq!(view.status, SkillExecutionStatus::PartialFailed);
        assert_eq!(view.input, json!({"in": true}));
        assert_eq!(view.unit_statuses.len(), 2);
        let b = view
            .unit_statuses
            .iter()
            .find(|u| u.unit_id == "b")
            .unwrap();
        assert_eq!(b.status, UnitExecutionStatus::Failed);
        assert_eq!(b.error_message.as_deref(), Some("boom"));

        let err = orch.get_status(Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code(), "EXECUTION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_executions_clamps_pagination() {
        let cat = catalog(vec![unit("a", vec![])], &["a"]);
        let skill_id = cat.skill.skill_id;
        let repo = Arc::new(MemoryRepo::default());
        let orch = orchestrator(
            Arc::clone(&repo),
            cat,
            Arc::new(RecordingQueue::default()),
            Arc::new(ScriptedWorkload::succeeding("wf-a", json!({}))),
        );

        let page = orch
            .list_executions(skill_id, None, 0, 10_000)
            .await
            .unwrap();
        assert_eq!(page.page, 1, "page 0 clamps to 1");
        assert_eq!(page.per_page, MAX_PAGE_SIZE);
        assert_eq!(page.total, 0);
    }
}
