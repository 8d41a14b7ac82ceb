//! Execution plan builder: DAG leveling, cycle detection, and cascade lookup.
//!
//! Uses `petgraph` to model unit dependencies as a directed graph. Levels
//! are computed by layered peeling (Kahn-style): units whose dependencies
//! are all assigned join the next level, so every unit lands at
//! `1 + max(level of its dependencies)` and independent units share a
//! level. Units left unassigned when no further progress is possible are
//! exactly the cycle members plus anything depending only on them.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use skillrun_types::error::EngineError;
use skillrun_types::skill::WorkflowUnitInfo;

// ---------------------------------------------------------------------------
// ExecutionPlan
// ---------------------------------------------------------------------------

/// One parallel-execution level of the plan.
#[derive(Debug, Clone)]
pub struct PlanLevel {
    /// Level index, 0-based.
    pub level: u32,
    /// Units eligible to run concurrently at this level.
    pub units: Vec<WorkflowUnitInfo>,
}

/// The leveled DAG derived from a skill's units and dependency edges.
///
/// Recomputed per run and never persisted as-is; only the per-unit level
/// assignment lands on execution-unit rows.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Levels sorted ascending.
    pub levels: Vec<PlanLevel>,
    /// Unit ID -> assigned level. Has exactly `total_units` entries.
    pub unit_level_map: HashMap<String, u32>,
    /// Unit ID -> IDs it depends on.
    pub dependency_map: HashMap<String, Vec<String>>,
    /// Unit ID -> IDs that depend on it (reverse adjacency, built once).
    pub dependents_map: HashMap<String, Vec<String>>,
    /// Number of units in the plan.
    pub total_units: usize,
}

impl ExecutionPlan {
    /// Units eligible for dispatch: not completed, not running, and with
    /// every dependency completed.
    ///
    /// The orchestrator drives level-by-level and does not need this, but
    /// callers doing finer-grained event-driven dispatch do. Idempotent for
    /// unchanged inputs.
    pub fn ready_units(
        &self,
        completed: &HashSet<String>,
        running: &HashSet<String>,
    ) -> Vec<&WorkflowUnitInfo> {
        self.levels
            .iter()
            .flat_map(|l| l.units.iter())
            .filter(|u| !completed.contains(&u.id) && !running.contains(&u.id))
            .filter(|u| {
                self.dependency_map
                    .get(&u.id)
                    .map(|deps| deps.iter().all(|d| completed.contains(d)))
                    .unwrap_or(true)
            })
            .collect()
    }

    /// Whether the run is finished: every unit is either completed or blocked.
    pub fn is_complete(&self, completed: &HashSet<String>, blocked: &HashSet<String>) -> bool {
        completed.len() + blocked.len() >= self.total_units
    }

    /// Transitive closure of dependents of `failed_id`, excluding IDs
    /// already in `already_blocked`.
    ///
    /// BFS over the precomputed reverse adjacency list, so a cascade lookup
    /// is O(V+E) regardless of how often it is called.
    pub fn blocked_units(
        &self,
        failed_id: &str,
        already_blocked: &HashSet<String>,
    ) -> Vec<String> {
        let mut blocked = Vec::new();
        let mut seen: HashSet<&str> = already_blocked.iter().map(String::as_str).collect();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(failed_id);

        while let Some(current) = queue.pop_front() {
            if let Some(dependents) = self.dependents_map.get(current) {
                for dep in dependents {
                    if seen.insert(dep.as_str()) {
                        blocked.push(dep.clone());
                        queue.push_back(dep.as_str());
                    }
                }
            }
        }

        blocked
    }

    /// Level assigned to a unit, if it is part of the plan.
    pub fn level_of(&self, unit_id: &str) -> Option<u32> {
        self.unit_level_map.get(unit_id).copied()
    }
}

// ---------------------------------------------------------------------------
// Level computation
// ---------------------------------------------------------------------------

/// Group units into parallel-execution levels.
///
/// Units with no dependencies seed level 0; each pass assigns
/// `level(u) = 1 + max(level(d))` once every dependency of `u` has a level.
/// If units remain unassigned when no pass makes progress, fails with
/// `CircularDependency` listing every unresolved unit ID.
pub fn compute_levels(
    units: &[WorkflowUnitInfo],
) -> Result<Vec<Vec<&WorkflowUnitInfo>>, EngineError> {
    if units.is_empty() {
        return Ok(vec![]);
    }

    let (graph, node_indices) = build_graph(units)?;

    // Layered peeling: a node is assignable once all predecessors have levels.
    let mut levels: HashMap<NodeIndex, u32> = HashMap::new();
    let mut current: Vec<NodeIndex> = node_indices
        .iter()
        .enumerate()
        .filter(|(i, _)| units[*i].dependencies.is_empty())
        .map(|(_, idx)| *idx)
        .collect();
    for idx in &current {
        levels.insert(*idx, 0);
    }

    let mut remaining: usize = units.len() - current.len();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &node in &current {
            for succ in graph.neighbors_directed(node, Direction::Outgoing) {
                if levels.contains_key(&succ) {
                    continue;
                }
                let preds: Vec<NodeIndex> =
                    graph.neighbors_directed(succ, Direction::Incoming).collect();
                if let Some(max_pred) = preds
                    .iter()
                    .map(|p| levels.get(p).copied())
                    .collect::<Option<Vec<u32>>>()
                    .and_then(|ls| ls.into_iter().max())
                {
                    levels.insert(succ, max_pred + 1);
                    next.push(succ);
                    remaining -= 1;
                }
            }
        }
        current = next;
    }

    if remaining > 0 {
        let mut unresolved: Vec<String> = node_indices
            .iter()
            .filter(|idx| !levels.contains_key(idx))
            .map(|idx| graph[*idx].to_string())
            .collect();
        unresolved.sort();
        return Err(EngineError::CircularDependency { unresolved });
    }

    // Group by level, ascending
    let max_level = levels.values().copied().max().unwrap_or(0) as usize;
    let mut grouped: Vec<Vec<&WorkflowUnitInfo>> = vec![vec![]; max_level + 1];
    for (i, unit) in units.iter().enumerate() {
        let level = levels[&node_indices[i]] as usize;
        grouped[level].push(unit);
    }

    Ok(grouped)
}

/// Build the dependency graph with an edge from each dependency to its
/// dependent. Fails on references to unknown unit IDs.
fn build_graph(
    units: &[WorkflowUnitInfo],
) -> Result<(DiGraph<&str, ()>, Vec<NodeIndex>), EngineError> {
    let id_to_idx: HashMap<&str, usize> = units
        .iter()
        .enumerate()
        .map(|(i, u)| (u.id.as_str(), i))
        .collect();

    let mut graph = DiGraph::<&str, ()>::new();
    let node_indices: Vec<_> = units.iter().map(|u| graph.add_node(u.id.as_str())).collect();

    for unit in units {
        let to_idx = id_to_idx[unit.id.as_str()];
        for dep in &unit.dependencies {
            let from_idx = id_to_idx.get(dep.dependency_id.as_str()).ok_or_else(|| {
                EngineError::UnknownDependency {
                    unit_id: unit.id.clone(),
                    dependency_id: dep.dependency_id.clone(),
                }
            })?;
            graph.add_edge(node_indices[*from_idx], node_indices[to_idx], ());
        }
    }

    Ok((graph, node_indices))
}

// ---------------------------------------------------------------------------
// Plan building
// ---------------------------------------------------------------------------

/// Build the full execution plan for a unit set.
pub fn build_plan(units: &[WorkflowUnitInfo]) -> Result<ExecutionPlan, EngineError> {
    let leveled = compute_levels(units)?;

    let levels: Vec<PlanLevel> = leveled
        .into_iter()
        .enumerate()
        .map(|(i, units)| PlanLevel {
            level: i as u32,
            units: units.into_iter().cloned().collect(),
        })
        .collect();

    let mut unit_level_map = HashMap::new();
    for level in &levels {
        for unit in &level.units {
            unit_level_map.insert(unit.id.clone(), level.level);
        }
    }

    let mut dependency_map: HashMap<String, Vec<String>> = HashMap::new();
    let mut dependents_map: HashMap<String, Vec<String>> = HashMap::new();
    for unit in units {
        let deps: Vec<String> = unit
            .dependencies
            .iter()
            .map(|d| d.dependency_id.clone())
            .collect();
        for dep in &deps {
            dependents_map
                .entry(dep.clone())
                .or_default()
                .push(unit.id.clone());
        }
        dependency_map.insert(unit.id.clone(), deps);
    }

    tracing::debug!(
        units = units.len(),
        levels = levels.len(),
        "built execution plan"
    );

    Ok(ExecutionPlan {
        levels,
        unit_level_map,
        dependency_map,
        dependents_map,
        total_units: units.len(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
