//! Data mapper: transforms dependency outputs into dependent-unit inputs.
//!
//! Three stages, all best-effort: path-based selection (`OutputSelector`),
//! key renaming (`input_mapping`), and combination (`MergeStrategy`).
//! Resolution failures are logged and defaulted, never raised; a unit input
//! is always producible from whatever its dependencies actually left behind.

use std::collections::HashMap;

use serde_json::{Map, Value, json};
use skillrun_types::skill::{MergeStrategy, OutputSelector, UnitDependency};

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// One segment of a dot-notation path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse a dot-notation path with bracket array indices: `a.b[2].c`.
///
/// Malformed bracket expressions are treated as literal keys so resolution
/// simply fails to match (and defaults apply) instead of erroring.
fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        if let Some(bracket) = rest.find('[') {
            let (key, indices) = rest.split_at(bracket);
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            rest = indices;
            let mut valid = true;
            let mut parsed = Vec::new();
            for idx_part in rest.split('[').skip(if rest.starts_with('[') { 1 } else { 0 }) {
                match idx_part.strip_suffix(']').and_then(|s| s.parse::<usize>().ok()) {
                    Some(idx) => parsed.push(PathSegment::Index(idx)),
                    None => {
                        valid = false;
                        break;
                    }
                }
            }
            if valid {
                segments.extend(parsed);
            } else {
                // Fall back to the whole part as a literal key
                if !key.is_empty() {
                    segments.pop();
                }
                segments.push(PathSegment::Key(part.to_string()));
            }
        } else if !part.is_empty() {
            segments.push(PathSegment::Key(part.to_string()));
        }
    }
    segments
}

/// Resolve a dot-notation path against a JSON value.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in parse_path(path) {
        current = match segment {
            PathSegment::Key(key) => current.get(key.as_str())?,
            PathSegment::Index(idx) => current.get(idx)?,
        };
    }
    Some(current)
}

/// Write a value at a dot-notation path, auto-creating intermediate objects
/// (and padding arrays with nulls for index segments).
fn set_path(target: &mut Value, path: &str, value: Value) {
    let segments = parse_path(path);
    if segments.is_empty() {
        return;
    }

    let mut current = target;
    for (i, segment) in segments.iter().enumerate() {
        let last = i == segments.len() - 1;
        match segment {
            PathSegment::Key(key) => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                let map = current.as_object_mut().unwrap();
                if last {
                    map.insert(key.clone(), value);
                    return;
                }
                current = map.entry(key.clone()).or_insert(Value::Null);
            }
            PathSegment::Index(idx) => {
                if !current.is_array() {
                    *current = Value::Array(Vec::new());
                }
                let arr = current.as_array_mut().unwrap();
                while arr.len() <= *idx {
                    arr.push(Value::Null);
                }
                if last {
                    arr[*idx] = value;
                    return;
                }
                current = &mut arr[*idx];
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Output selection
// ---------------------------------------------------------------------------

/// Extract part of a dependency output via its selector.
///
/// Never raises: an unresolvable path returns the configured default (or
/// `Null` when none is set), logged at debug level.
pub fn apply_output_selector(output: &Value, selector: &OutputSelector) -> Value {
    match resolve_path(output, &selector.path) {
        Some(value) => value.clone(),
        None => {
            tracing::debug!(
                path = selector.path.as_str(),
                "output selector path did not resolve, using default"
            );
            selector.default.clone().unwrap_or(Value::Null)
        }
    }
}

// ---------------------------------------------------------------------------
// Input mapping
// ---------------------------------------------------------------------------

/// Rename selected source paths into a fresh result object.
///
/// Unresolved source paths are skipped with a warning; a key never appears
/// in the result unless its source resolved.
pub fn apply_input_mapping(source: &Value, mapping: &HashMap<String, String>) -> Value {
    let mut result = Value::Object(Map::new());
    for (target_key, source_path) in mapping {
        match resolve_path(source, source_path) {
            Some(value) => set_path(&mut result, target_key, value.clone()),
            None => {
                tracing::warn!(
                    target_key = target_key.as_str(),
                    source_path = source_path.as_str(),
                    "input mapping source did not resolve, skipping key"
                );
            }
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Recursively deep-merge `overlay` into `base`.
///
/// Keys where both sides are objects merge recursively; everything else
/// (arrays and scalars included) is replaced wholesale by the overlay.
fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) if base_value.is_object() && overlay_value.is_object() => {
                        deep_merge(base_value, overlay_value);
                    }
                    _ => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Combine dependency outputs into one input per the strategy.
pub fn merge_inputs(
    base: &Value,
    outputs: &[(String, Value)],
    strategy: MergeStrategy,
) -> Value {
    match strategy {
        MergeStrategy::Override => outputs
            .last()
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| base.clone()),
        MergeStrategy::Merge => {
            let mut result = base.clone();
            for (_, output) in outputs {
                deep_merge(&mut result, output);
            }
            result
        }
        MergeStrategy::Custom => {
            let mut dependencies = Map::new();
            for (unit_id, output) in outputs {
                dependencies.insert(unit_id.clone(), output.clone());
            }
            json!({
                "_base": base,
                "_dependencies": dependencies,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Full mapping pipeline
// ---------------------------------------------------------------------------

/// Produce a unit's resolved input from its dependency outputs.
///
/// Per dependency config: fetch the raw output (absent outputs are skipped
/// with a warning, matching best-effort mapping semantics), apply the
/// output selector, wrap non-object values as `{"value": v}`, apply the
/// input mapping, accumulate. All accumulated outputs merge into
/// `base_input` using the first config's merge strategy (default `merge`);
/// a unit with heterogeneous strategies only honors the first one.
pub fn process_data_mapping(
    unit_id: &str,
    base_input: &Value,
    dependency_outputs: &HashMap<String, Value>,
    dependency_configs: &[UnitDependency],
) -> Value {
    let mut accumulated: Vec<(String, Value)> = Vec::new();

    for config in dependency_configs {
        let Some(raw) = dependency_outputs.get(&config.dependency_id) else {
            tracing::warn!(
                unit_id,
                dependency_id = config.dependency_id.as_str(),
                "dependency output unavailable, skipping mapping"
            );
            continue;
        };

        let mut selected = match &config.output_selector {
            Some(selector) => apply_output_selector(raw, selector),
            None => raw.clone(),
        };

        if !selected.is_object() {
            selected = json!({ "value": selected });
        }

        if let Some(mapping) = &config.input_mapping {
            selected = apply_input_mapping(&selected, mapping);
        }

        accumulated.push((config.dependency_id.clone(), selected));
    }

    let strategy = dependency_configs
        .first()
        .and_then(|c| c.merge_strategy)
        .unwrap_or_default();

    merge_inputs(base_input, &accumulated, strategy)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
