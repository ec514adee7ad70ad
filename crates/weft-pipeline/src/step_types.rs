//! Built-in step types whose substitution/concatenation semantics are part
//! of the engine's contract (§4.3), not left to external adapters.
//!
//! Concrete model and action *services* are still supplied by embedders
//! through the registry; these step types only own the generic plumbing
//! (placeholder substitution, service resolution) that every
//! model-inference or action step needs regardless of which service it
//! calls.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::{concatenate_required_outputs, substitute_placeholders, Context};
use crate::descriptor::StepDescriptor;
use crate::error::PipelineError;
use crate::registry::Registry;
use crate::contracts::Step;

/// A step that substitutes its prompt template and calls a named model
/// service.
pub struct ModelInferenceStep {
    descriptor: StepDescriptor,
    registry: Registry,
}

impl ModelInferenceStep {
    pub fn new(descriptor: StepDescriptor, registry: Registry) -> Self {
        Self { descriptor, registry }
    }
}

#[async_trait]
impl Step for ModelInferenceStep {
    async fn execute(&self, context: &mut Context) -> Result<(), PipelineError> {
        let service_name = self.descriptor.config_str("service_name").ok_or_else(|| {
            PipelineError::MissingServiceName {
                step_id: self.descriptor.id.clone(),
            }
        })?;
        let service = self.registry.model_service(service_name).ok_or_else(|| {
            PipelineError::ServiceNotFound {
                step_id: self.descriptor.id.clone(),
                service: service_name.to_string(),
            }
        })?;

        let template = self.descriptor.config_str("prompt").unwrap_or("");
        let required = self.descriptor.required_step_keys();
        let prompt = substitute_placeholders(template, &required, context)?;

        let model_config = self
            .descriptor
            .config
            .get("model_config")
            .cloned()
            .unwrap_or(Value::Null);

        let text = service
            .call(&model_config, &prompt)
            .await
            .map_err(|cause| PipelineError::ModelServiceFailed {
                step_id: self.descriptor.id.clone(),
                cause: cause.to_string(),
            })?;

        context.set_output(&self.descriptor.output_key, Value::String(text));
        Ok(())
    }

    fn get_type(&self) -> &str {
        &self.descriptor.step_type
    }
}

/// A step that hands a concatenated payload of its required outputs to a
/// named action service.
pub struct ActionStep {
    descriptor: StepDescriptor,
    registry: Registry,
}

impl ActionStep {
    pub fn new(descriptor: StepDescriptor, registry: Registry) -> Self {
        Self { descriptor, registry }
    }
}

#[async_trait]
impl Step for ActionStep {
    async fn execute(&self, context: &mut Context) -> Result<(), PipelineError> {
        let service_name = self.descriptor.config_str("service_name").ok_or_else(|| {
            PipelineError::InvalidDescriptor(format!(
                "action configuration for step {} missing service_name",
                self.descriptor.id
            ))
        })?;
        let service = self.registry.action_service(service_name).ok_or_else(|| {
            PipelineError::ServiceNotFound {
                step_id: self.descriptor.id.clone(),
                service: service_name.to_string(),
            }
        })?;

        let action_config = self
            .descriptor
            .config
            .get("action_config")
            .cloned()
            .unwrap_or(Value::Null);

        let required = self.descriptor.required_step_keys();
        let payload = concatenate_required_outputs(&required, context)?;

        let text = service
            .execute(&action_config, &payload, &self.descriptor)
            .await
            .map_err(|cause| PipelineError::ActionServiceFailed {
                step_id: self.descriptor.id.clone(),
                cause: cause.to_string(),
            })?;

        context.set_output(&self.descriptor.output_key, Value::String(text));
        Ok(())
    }

    fn get_type(&self) -> &str {
        &self.descriptor.step_type
    }
}
