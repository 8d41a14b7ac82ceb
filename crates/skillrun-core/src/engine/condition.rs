//! JEXL evaluation of dependency-edge conditions.
//!
//! A `UnitDependency.condition` gates the dependent unit once the
//! dependency reaches a terminal state. The expression is evaluated against
//! a context object shaped `{dependency: {output: ...}, input: ...}`.
//!
//! Payloads are always passed as context objects, NEVER interpolated into
//! expression strings.

use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during condition evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("condition evaluation failed: {0}")]
    EvalFailed(String),

    #[error("condition did not evaluate to a boolean: got {result}")]
    NotBoolean { result: Value },
}

// ---------------------------------------------------------------------------
// ConditionEvaluator
// ---------------------------------------------------------------------------

/// JEXL evaluator with standard transforms pre-registered.
pub struct ConditionEvaluator {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl ConditionEvaluator {
    /// Create a new evaluator with the standard transforms registered.
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::String(s)) => s.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len))
            })
            .with_transform("lower", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_lowercase()))
            })
            .with_transform("contains", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let search = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.contains(search)))
            });

        Self { evaluator }
    }

    /// Evaluate a condition for a dependency edge.
    ///
    /// `dependency_output` is the terminal output of the dependency (or
    /// `Null` if it produced none); `input` is the base execution input.
    pub fn evaluate(
        &self,
        condition: &str,
        dependency_output: &Value,
        input: &Value,
    ) -> Result<bool, ConditionError> {
        let context = json!({
            "dependency": { "output": dependency_output },
            "input": input,
        });

        let result = self
            .evaluator
            .eval_in_context(condition, &context)
            .map_err(|e| ConditionError::EvalFailed(e.to_string()))?;

        match result {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(ConditionError::NotBoolean { result: other }),
        }
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
