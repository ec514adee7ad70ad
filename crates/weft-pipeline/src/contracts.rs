//! Trait contracts implemented by step types and the services they call.
//!
//! These are the seams adapters (model/search/action implementations) are
//! written against; none of the concrete adapters live in this crate.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Context;
use crate::descriptor::StepDescriptor;
use crate::error::PipelineError;

/// A single step within a pipeline.
///
/// Every concrete step type is instantiated fresh per invocation, already
/// carrying its descriptor (see §9's factory-injection decision) — there is
/// no separate `configure` call.
#[async_trait]
pub trait Step: Send + Sync {
    /// Perform the step. On success the implementation writes its product
    /// into `context` at its own declared output key.
    async fn execute(&self, context: &mut Context) -> Result<(), PipelineError>;

    /// The step's type tag, for introspection.
    fn get_type(&self) -> &str;
}

/// Factory that produces a fresh, descriptor-configured step instance.
pub type StepFactory = dyn Fn(&StepDescriptor) -> Box<dyn Step> + Send + Sync;

/// A model-inference backend (e.g. an LLM provider).
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Invoke the model with a fully-substituted prompt and a
    /// service-specific configuration bag; returns the raw text response.
    async fn call(&self, config: &Value, prompt: &str) -> Result<String, anyhow::Error>;
}

/// An external side-effecting action (webhook, publish, social post, ...).
#[async_trait]
pub trait ActionService: Send + Sync {
    /// Execute the action against `payload` — the concatenated stringified
    /// outputs of the step's `required_steps`, built by `ActionStep` before
    /// this call (§4.3's "Output-key resolution for action steps").
    async fn execute(
        &self,
        action_config: &Value,
        payload: &str,
        step: &StepDescriptor,
    ) -> Result<String, anyhow::Error>;
}
