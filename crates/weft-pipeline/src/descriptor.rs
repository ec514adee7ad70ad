//! Pipeline and step descriptors fetched from the host API.
//!
//! These mirror the host's JSON shapes directly (§3/§6) — they are fetched
//! fresh before each execution and discarded afterward, never persisted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::parse_required_steps;

/// A pipeline as returned by `GET /pipelines/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub steps: Vec<StepDescriptor>,
    /// Consecutive-failure counter. Authoritative on the host; the engine
    /// only reads it to decide whether to skip scheduling (§4.1).
    #[serde(default)]
    pub execution_failures: i64,
}

/// One step within a pipeline descriptor.
///
/// Steps run in declared array order — this is not a dependency graph.
/// `required_steps` names output keys a step reads from the context, used
/// purely for output lookup, not for reordering or cycle detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub weight: i64,
    pub output_key: String,
    #[serde(default)]
    pub output_type: String,
    /// Raw CRLF/LF-separated list of output keys this step reads.
    #[serde(default)]
    pub required_steps: String,
    /// Type-specific configuration (prompt template, service name, action
    /// config, etc.), interpreted by the step implementation itself.
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

impl StepDescriptor {
    /// Parse `required_steps` into a normalized, ordered list of keys.
    pub fn required_step_keys(&self) -> Vec<String> {
        parse_required_steps(&self.required_steps)
    }

    /// Read a string field out of `config`, if present.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

/// One entry in the `GET /pipelines/scheduled` response (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPipeline {
    pub id: String,
    pub label: String,
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub scheduled_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub recurring_frequency: Option<RecurringFrequency>,
    /// Time-of-day (`HH:MM`) a recurring pipeline should fire.
    #[serde(default)]
    pub recurring_time: Option<String>,
    #[serde(default)]
    pub last_run_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    OneTime,
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringFrequency {
    Daily,
    Weekly,
    Monthly,
}
