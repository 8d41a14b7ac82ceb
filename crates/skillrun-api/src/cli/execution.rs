//! CLI execution subcommand handlers.
//!
//! Register skill bundles into the catalog, start runs, inspect status,
//! list executions, and stop an installation's runs.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use skillrun_types::execution::{SkillExecutionStatus, UnitExecutionStatus};
use skillrun_types::skill::{
    BindingStatus, Installation, InstallationStatus, SkillDefinition, UnitBinding,
};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Bundle file
// ---------------------------------------------------------------------------

/// A registerable bundle: the skill package plus its unit bindings.
#[derive(Debug, Deserialize)]
pub struct SkillBundle {
    pub skill: SkillDefinition,
    /// Installation ID (generated when omitted).
    #[serde(default)]
    pub installation_id: Option<Uuid>,
    /// Owner ID (generated when omitted).
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    /// Unit ID -> target workflow ID on the workload engine.
    #[serde(default)]
    pub bindings: HashMap<String, String>,
}

/// Load and validate a bundle YAML file.
pub fn load_bundle(path: &Path) -> Result<SkillBundle> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading bundle file {}", path.display()))?;
    let bundle: SkillBundle =
        serde_yaml_ng::from_str(&content).context("parsing bundle YAML")?;
    if bundle.skill.units.is_empty() {
        bail!("bundle skill '{}' declares no units", bundle.skill.name);
    }
    Ok(bundle)
}

/// Register a bundle into the catalog; returns the installation ID.
fn register_bundle(state: &AppState, bundle: SkillBundle) -> Uuid {
    let installation_id = bundle.installation_id.unwrap_or_else(Uuid::now_v7);
    let installation = Installation {
        installation_id,
        skill_id: bundle.skill.skill_id,
        owner_id: bundle.owner_id.unwrap_or_else(Uuid::now_v7),
        status: InstallationStatus::Ready,
        unit_bindings: bundle
            .bindings
            .into_iter()
            .map(|(unit_id, target_id)| {
                (
                    unit_id,
                    UnitBinding {
                        target_id,
                        status: BindingStatus::Bound,
                    },
                )
            })
            .collect(),
    };
    state.catalog.register_skill(bundle.skill);
    state.catalog.register_installation(installation);
    installation_id
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub async fn handle_register(state: &AppState, file: &Path, json: bool) -> Result<()> {
    let bundle = load_bundle(file)?;
    let skill_id = bundle.skill.skill_id;
    let name = bundle.skill.name.clone();
    let installation_id = register_bundle(state, bundle);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "skill_id": skill_id,
                "installation_id": installation_id,
            })
        );
    } else {
        println!(
            "{} skill '{}' registered (installation {})",
            style("ok").green(),
            name,
            installation_id
        );
    }
    Ok(())
}

pub async fn handle_run(
    state: &AppState,
    installation_id: Option<Uuid>,
    bundle_path: Option<&Path>,
    input: Option<&str>,
    no_wait: bool,
    json: bool,
) -> Result<()> {
    let installation_id = match (installation_id, bundle_path) {
        (Some(id), None) => id,
        (None, Some(path)) => register_bundle(state, load_bundle(path)?),
        (Some(_), Some(_)) => bail!("pass either an installation ID or --bundle, not both"),
        (None, None) => bail!("an installation ID or --bundle is required"),
    };

    let input: Value = match input {
        Some(raw) => serde_json::from_str(raw).context("parsing --input JSON")?,
        None => serde_json::json!({}),
    };

    let execution_id = state.orchestrator.start(installation_id, input).await?;

    if no_wait {
        if json {
            println!("{}", serde_json::json!({ "execution_id": execution_id }));
        } else {
            println!("execution {execution_id} started");
        }
        return Ok(());
    }

    // Poll until terminal; the worker runs in this process.
    let view = loop {
        let view = state.orchestrator.get_status(execution_id).await?;
        if view.status.is_terminal() {
            break view;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_status_view(&view);
    }
    Ok(())
}

pub async fn handle_status(state: &AppState, execution_id: Uuid, json: bool) -> Result<()> {
    let view = state.orchestrator.get_status(execution_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_status_view(&view);
    }
    Ok(())
}

pub async fn handle_list(
    state: &AppState,
    skill_id: Uuid,
    status: Option<&str>,
    page: u32,
    per_page: u32,
    json: bool,
) -> Result<()> {
    let status = status
        .map(|s| {
            serde_json::from_value::<SkillExecutionStatus>(Value::String(s.to_string()))
                .map_err(|_| anyhow::anyhow!("unknown status '{s}'"))
        })
        .transpose()?;

    let result = state
        .orchestrator
        .list_executions(skill_id, status, page, per_page)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Execution", "Status", "Created", "Error"]);
    for execution in &result.executions {
        table.add_row(vec![
            Cell::new(execution.execution_id),
            execution_status_cell(execution.status),
            Cell::new(execution.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(execution.error_message.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
    println!(
        "page {}/{} ({} total)",
        result.page,
        result.total.div_ceil(result.per_page as u64).max(1),
        result.total
    );
    Ok(())
}

pub async fn handle_stop(state: &AppState, installation_id: Uuid, json: bool) -> Result<()> {
    let stopped = state
        .orchestrator
        .stop_running_executions(installation_id)
        .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "stopped_executions": stopped })
        );
    } else {
        for entry in &stopped {
            println!(
                "{} execution {} cancelled ({} units aborted)",
                style("ok").green(),
                entry.execution_id,
                entry.units_aborted
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn print_status_view(view: &skillrun_types::execution::ExecutionStatusView) {
    println!(
        "execution {} -- {}",
        view.execution_id,
        styled_execution_status(view.status)
    );
    if let Some(error) = &view.error_message {
        println!("  {}", style(error).red());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Unit", "Level", "Status", "Retries", "Error"]);
    for unit in &view.unit_statuses {
        table.add_row(vec![
            Cell::new(&unit.unit_id),
            Cell::new(unit.execution_level),
            unit_status_cell(unit.status),
            Cell::new(unit.retry_count),
            Cell::new(unit.error_message.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn styled_execution_status(status: SkillExecutionStatus) -> console::StyledObject<&'static str> {
    match status {
        SkillExecutionStatus::Success => style("success").green(),
        SkillExecutionStatus::Failed => style("failed").red(),
        SkillExecutionStatus::PartialFailed => style("partial_failed").yellow(),
        SkillExecutionStatus::Cancelled => style("cancelled").dim(),
        SkillExecutionStatus::Running => style("running").cyan(),
        SkillExecutionStatus::Pending => style("pending").dim(),
    }
}

fn execution_status_cell(status: SkillExecutionStatus) -> Cell {
    let (text, color) = match status {
        SkillExecutionStatus::Success => ("success", Color::Green),
        SkillExecutionStatus::Failed => ("failed", Color::Red),
        SkillExecutionStatus::PartialFailed => ("partial_failed", Color::Yellow),
        SkillExecutionStatus::Cancelled => ("cancelled", Color::Grey),
        SkillExecutionStatus::Running => ("running", Color::Cyan),
        SkillExecutionStatus::Pending => ("pending", Color::Grey),
    };
    Cell::new(text).fg(color)
}

fn unit_status_cell(status: UnitExecutionStatus) -> Cell {
    let (text, color) = match status {
        UnitExecutionStatus::Success => ("success", Color::Green),
        UnitExecutionStatus::Failed => ("failed", Color::Red),
        UnitExecutionStatus::Blocked => ("blocked", Color::Yellow),
        UnitExecutionStatus::Skipped => ("skipped", Color::Grey),
        UnitExecutionStatus::Running => ("running", Color::Cyan),
        UnitExecutionStatus::Queued => ("queued", Color::Cyan),
        UnitExecutionStatus::Pending => ("pending", Color::Grey),
    };
    Cell::new(text).fg(color)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
