//! Per-execution context threaded through every step of a pipeline.
//!
//! Holds free-form data, the per-step output mapping, the on-demand user
//! input (if any), and a copy of the step list so a step can look up a
//! sibling by output key or output type.

use std::collections::HashMap;

use serde_json::Value;

use crate::descriptor::StepDescriptor;
use crate::error::PipelineError;

/// Per-execution shared state.
///
/// Owned exclusively by the Pipeline Executor invocation that created it;
/// steps within one execution run strictly sequentially, so no
/// synchronization is needed around the maps below.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Free-form key/value data, populated by steps that don't write to
    /// the structured output map (or by the caller, e.g. `name = "World"`).
    pub data: HashMap<String, Value>,
    /// Step outputs keyed by each step's declared output key.
    outputs: HashMap<String, Value>,
    /// User-supplied input string, present for on-demand invocations.
    pub user_input: Option<String>,
    /// Copy of the pipeline's step list, for output-key/type lookup.
    steps: Vec<StepDescriptor>,
}

impl Context {
    /// Create a context for one execution.
    pub fn new(steps: Vec<StepDescriptor>, user_input: Option<String>) -> Self {
        Self {
            data: HashMap::new(),
            outputs: HashMap::new(),
            user_input,
            steps,
        }
    }

    /// Record a step's output at its declared output key.
    pub fn set_output(&mut self, output_key: &str, value: Value) {
        self.outputs.insert(output_key.to_string(), value);
    }

    /// Look up a value by output key, checking the structured output map
    /// first and falling back to free-form `data`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key).or_else(|| self.data.get(key))
    }

    /// Find the descriptor of the step that produces the given output key.
    pub fn step_by_output_key(&self, output_key: &str) -> Option<&StepDescriptor> {
        self.steps.iter().find(|s| s.output_key == output_key)
    }

    /// Find the descriptor of the step that produces the given output type.
    pub fn step_by_output_type(&self, output_type: &str) -> Option<&StepDescriptor> {
        self.steps.iter().find(|s| s.output_type == output_type)
    }

    /// The full step list for this execution.
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }
}

/// Convert a JSON value to its string representation for placeholder
/// substitution.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "null".to_string()),
    }
}

/// Normalize a CRLF/LF-separated `required_steps` field into an ordered
/// list of trimmed, non-blank keys.
pub fn parse_required_steps(raw: &str) -> Vec<String> {
    raw.split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Perform the single substitution pass a model-inference step runs over
/// its prompt template.
///
/// Every token `{key}` where `key` is one of `required_steps` is replaced
/// by the string form of the corresponding context value. A key listed in
/// `required_steps` but absent from the context is a fatal error for the
/// step, even if it never appears as a `{key}` token in the template.
pub fn substitute_placeholders(
    template: &str,
    required_steps: &[String],
    context: &Context,
) -> Result<String, PipelineError> {
    let mut result = template.to_string();
    for key in required_steps {
        let value = context
            .get(key)
            .ok_or_else(|| PipelineError::RequiredOutputMissing(key.clone()))?;
        let token = format!("{{{key}}}");
        result = result.replace(&token, &value_to_string(value));
    }
    Ok(result)
}

/// Concatenate the stringified outputs of `required_steps`, in order,
/// into a single payload for an action step.
pub fn concatenate_required_outputs(
    required_steps: &[String],
    context: &Context,
) -> Result<String, PipelineError> {
    let mut parts = Vec::with_capacity(required_steps.len());
    for key in required_steps {
        let value = context
            .get(key)
            .ok_or_else(|| PipelineError::RequiredOutputMissing(key.clone()))?;
        parts.push(value_to_string(value));
    }
    Ok(parts.concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with(data: &[(&str, Value)]) -> Context {
        let mut ctx = Context::new(Vec::new(), None);
        for (k, v) in data {
            ctx.data.insert(k.to_string(), v.clone());
        }
        ctx
    }

    #[test]
    fn parse_required_steps_splits_crlf_and_trims() {
        let parsed = parse_required_steps("name\r\n  age \r\n\r\ncity\n");
        assert_eq!(parsed, vec!["name", "age", "city"]);
    }

    #[test]
    fn parse_required_steps_skips_blank_lines() {
        let parsed = parse_required_steps("\r\n\r\n");
        assert!(parsed.is_empty());
    }

    #[test]
    fn substitute_replaces_known_token() {
        let ctx = ctx_with(&[("name", json!("World"))]);
        let required = vec!["name".to_string()];
        let result = substitute_placeholders("Hello, {name}!", &required, &ctx).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn substitute_missing_key_is_error() {
        let ctx = Context::new(Vec::new(), None);
        let required = vec!["missing".to_string()];
        let err = substitute_placeholders("{missing}", &required, &ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "required step output 'missing' not found in context"
        );
    }

    #[test]
    fn substitute_allows_required_key_absent_from_template() {
        // A required key that never appears as a `{key}` token is fine —
        // it's only used for dependency ordering.
        let ctx = ctx_with(&[("unused", json!("value"))]);
        let required = vec!["unused".to_string()];
        let result = substitute_placeholders("no tokens here", &required, &ctx).unwrap();
        assert_eq!(result, "no tokens here");
    }

    #[test]
    fn substitute_numeric_value_stringified() {
        let ctx = ctx_with(&[("count", json!(42))]);
        let required = vec!["count".to_string()];
        let result = substitute_placeholders("Count: {count}", &required, &ctx).unwrap();
        assert_eq!(result, "Count: 42");
    }

    #[test]
    fn concatenate_joins_in_order() {
        let ctx = ctx_with(&[("a", json!("one")), ("b", json!("two"))]);
        let required = vec!["a".to_string(), "b".to_string()];
        let result = concatenate_required_outputs(&required, &ctx).unwrap();
        assert_eq!(result, "onetwo");
    }

    #[test]
    fn concatenate_missing_key_is_error() {
        let ctx = Context::new(Vec::new(), None);
        let required = vec!["nope".to_string()];
        let err = concatenate_required_outputs(&required, &ctx).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn context_get_prefers_structured_output_over_data() {
        let mut ctx = Context::new(Vec::new(), None);
        ctx.data.insert("key".to_string(), json!("from data"));
        ctx.set_output("key", json!("from output"));
        assert_eq!(ctx.get("key"), Some(&json!("from output")));
    }

    #[test]
    fn context_falls_back_to_data() {
        let mut ctx = Context::new(Vec::new(), None);
        ctx.data.insert("key".to_string(), json!("value"));
        assert_eq!(ctx.get("key"), Some(&json!("value")));
    }
}
