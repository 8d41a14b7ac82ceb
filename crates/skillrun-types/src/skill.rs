//! Skill package and installation domain types.
//!
//! A skill bundles one or more workflow units into an installable, runnable
//! capability. The unit list and its dependency edges form the DAG the
//! engine levels into an execution plan. Installations bind each abstract
//! unit to a concrete target workflow on the workload engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Skill definition
// ---------------------------------------------------------------------------

/// A packaged skill: the set of workflow units and their dependency edges.
///
/// YAML skill bundles and the registry API both deserialize into this
/// struct; it is the shape the engine plans and executes against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// UUIDv7 assigned when the skill is packaged.
    pub skill_id: Uuid,
    /// Human-readable skill name.
    pub name: String,
    /// Semantic version string (e.g. "1.0.0").
    pub version: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The workflow units bundled into this skill.
    pub units: Vec<WorkflowUnitInfo>,
}

// ---------------------------------------------------------------------------
// Workflow units
// ---------------------------------------------------------------------------

/// One node in a skill's DAG.
///
/// Immutable description supplied by the package definition; at install
/// time the unit is bound to a concrete target on the workload engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowUnitInfo {
    /// Unit ID, unique within the skill (e.g. "gather-leads").
    pub id: String,
    /// Human-readable unit name.
    pub name: String,
    /// Dependency edges into this unit.
    #[serde(default)]
    pub dependencies: Vec<UnitDependency>,
}

impl WorkflowUnitInfo {
    /// IDs of the units this unit depends on.
    pub fn dependency_ids(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .map(|d| d.dependency_id.as_str())
            .collect()
    }
}

/// A dependency edge from one unit to another, with optional data-flow
/// configuration applied when the dependency's output feeds this unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDependency {
    /// ID of the unit this edge points at.
    pub dependency_id: String,
    /// Optional JEXL expression gating the dependent unit. Evaluated against
    /// the dependency's output; `false` skips the dependent unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Path-based renaming of the dependency output into the unit input:
    /// `target_key -> source_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mapping: Option<HashMap<String, String>>,
    /// Selector extracting part of the dependency output before mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_selector: Option<OutputSelector>,
    /// How this dependency's output is combined into the unit input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<MergeStrategy>,
}

/// Path expression extracting part of a unit's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSelector {
    /// Dot-notation path with bracket array indices (e.g. `items[0].email`).
    pub path: String,
    /// Value used when the path does not resolve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Policy for combining dependency outputs into one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// The last dependency's output replaces everything, base included.
    Override,
    /// Recursive deep merge over the base input (default).
    Merge,
    /// Wrap base and outputs in an envelope for bespoke downstream logic.
    Custom,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        Self::Merge
    }
}

// ---------------------------------------------------------------------------
// Installations
// ---------------------------------------------------------------------------

/// Status of a skill installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationStatus {
    Pending,
    Ready,
    PartialFailed,
    Failed,
}

impl InstallationStatus {
    /// Whether executions may be started against this installation.
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Ready | Self::PartialFailed)
    }
}

/// Status of a single unit binding inside an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingStatus {
    Bound,
    Failed,
}

/// Binding of one abstract unit to a concrete target workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitBinding {
    /// Target workflow ID on the workload engine.
    pub target_id: String,
    /// Whether the binding materialized successfully at install time.
    pub status: BindingStatus,
}

/// A user's installed instance of a skill.
///
/// The engine reads `status` and `unit_bindings`; it never mutates an
/// installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    /// UUIDv7 installation ID.
    pub installation_id: Uuid,
    /// ID of the installed skill.
    pub skill_id: Uuid,
    /// Owner of the installation.
    pub owner_id: Uuid,
    /// Installation status.
    pub status: InstallationStatus,
    /// Unit ID -> concrete target binding.
    #[serde(default)]
    pub unit_bindings: HashMap<String, UnitBinding>,
}

impl Installation {
    /// Resolve the bound target for a unit, if the binding is healthy.
    pub fn bound_target(&self, unit_id: &str) -> Option<&str> {
        self.unit_bindings
            .get(unit_id)
            .filter(|b| b.status == BindingStatus::Bound)
            .map(|b| b.target_id.as_str())
    }
}

/// Caller identity handed to the workload engine for every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerContext {
    pub owner_id: Uuid,
    pub installation_id: Uuid,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Build a skill exercising dependency configuration variants.
    fn sample_skill() -> SkillDefinition {
        SkillDefinition {
            skill_id: Uuid::now_v7(),
            name: "lead-enricher".to_string(),
            version: "1.0.0".to_string(),
            description: Some("Gather, enrich, and notify".to_string()),
            units: vec![
                WorkflowUnitInfo {
                    id: "gather".to_string(),
                    name: "Gather Leads".to_string(),
                    dependencies: vec![],
                },
                WorkflowUnitInfo {
                    id: "enrich".to_string(),
                    name: "Enrich Leads".to_string(),
                    dependencies: vec![UnitDependency {
                        dependency_id: "gather".to_string(),
                        condition: Some("dependency.output.count > 0".to_string()),
                        input_mapping: Some(HashMap::from([(
                            "leads".to_string(),
                            "items".to_string(),
                        )])),
                        output_selector: Some(OutputSelector {
                            path: "result.items".to_string(),
                            default: Some(json!([])),
                        }),
                        merge_strategy: Some(MergeStrategy::Merge),
                    }],
                },
            ],
        }
    }

    // -----------------------------------------------------------------------
    // Serde roundtrips
    // -----------------------------------------------------------------------

    #[test]
    fn test_skill_definition_yaml_roundtrip() {
        let original = sample_skill();
        let yaml = serde_yaml_ng::to_string(&original).expect("serialize to YAML");
        assert!(yaml.contains("lead-enricher"));
        assert!(yaml.contains("dependency_id: gather"));

        let parsed: SkillDefinition = serde_yaml_ng::from_str(&yaml).expect("parse YAML");
        assert_eq!(parsed.name, "lead-enricher");
        assert_eq!(parsed.units.len(), 2);
        assert_eq!(parsed.units[1].dependencies.len(), 1);
    }

    #[test]
    fn test_parse_minimal_yaml_skill() {
        let yaml = r#"
skill_id: "01938e90-0000-7000-8000-000000000001"
name: notifier
version: "0.2.0"
units:
  - id: send
    name: Send Notification
"#;
        let skill: SkillDefinition = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(skill.name, "notifier");
        assert_eq!(skill.units.len(), 1);
        assert!(skill.units[0].dependencies.is_empty());
    }

    #[test]
    fn test_merge_strategy_serde() {
        for (strategy, expected) in [
            (MergeStrategy::Override, "\"override\""),
            (MergeStrategy::Merge, "\"merge\""),
            (MergeStrategy::Custom, "\"custom\""),
        ] {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, expected);
            let parsed: MergeStrategy = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, strategy);
        }
    }

    #[test]
    fn test_merge_strategy_default_is_merge() {
        assert_eq!(MergeStrategy::default(), MergeStrategy::Merge);
    }

    // -----------------------------------------------------------------------
    // Installation helpers
    // -----------------------------------------------------------------------

    #[test]
    fn test_installation_bound_target() {
        let installation = Installation {
            installation_id: Uuid::now_v7(),
            skill_id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            status: InstallationStatus::Ready,
            unit_bindings: HashMap::from([
                (
                    "gather".to_string(),
                    UnitBinding {
                        target_id: "wf-101".to_string(),
                        status: BindingStatus::Bound,
                    },
                ),
                (
                    "enrich".to_string(),
                    UnitBinding {
                        target_id: "wf-102".to_string(),
                        status: BindingStatus::Failed,
                    },
                ),
            ]),
        };

        assert_eq!(installation.bound_target("gather"), Some("wf-101"));
        // Failed bindings never resolve
        assert_eq!(installation.bound_target("enrich"), None);
        assert_eq!(installation.bound_target("missing"), None);
    }

    #[test]
    fn test_installation_status_runnable() {
        assert!(InstallationStatus::Ready.is_runnable());
        assert!(InstallationStatus::PartialFailed.is_runnable());
        assert!(!InstallationStatus::Pending.is_runnable());
        assert!(!InstallationStatus::Failed.is_runnable());
    }

    #[test]
    fn test_dependency_ids() {
        let skill = sample_skill();
        assert!(skill.units[0].dependency_ids().is_empty());
        assert_eq!(skill.units[1].dependency_ids(), vec!["gather"]);
    }
}
