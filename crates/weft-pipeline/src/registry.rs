//! Plugin registry: name lookups for step-type factories, model services,
//! and action services.
//!
//! Populated once at startup and never mutated afterward, so lookups need
//! no lock — callers only ever hold a shared reference.

use std::collections::HashMap;
use std::sync::Arc;

use crate::contracts::{ActionService, ModelService, Step, StepFactory};
use crate::descriptor::StepDescriptor;
use crate::error::PipelineError;

/// Name → implementation lookup for the three extensibility points.
#[derive(Default, Clone)]
pub struct Registry {
    step_factories: HashMap<String, Arc<StepFactory>>,
    model_services: HashMap<String, Arc<dyn ModelService>>,
    action_services: HashMap<String, Arc<dyn ActionService>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a step type tag.
    pub fn register_step_type<F>(&mut self, type_tag: impl Into<String>, factory: F)
    where
        F: Fn(&StepDescriptor) -> Box<dyn Step> + Send + Sync + 'static,
    {
        self.step_factories
            .insert(type_tag.into(), Arc::new(factory));
    }

    /// Register a model-service singleton under a service name.
    pub fn register_model_service(
        &mut self,
        name: impl Into<String>,
        service: Arc<dyn ModelService>,
    ) {
        self.model_services.insert(name.into(), service);
    }

    /// Register an action-service singleton under a service name.
    pub fn register_action_service(
        &mut self,
        name: impl Into<String>,
        service: Arc<dyn ActionService>,
    ) {
        self.action_services.insert(name.into(), service);
    }

    /// Build a fresh, descriptor-configured step instance for `descriptor`'s
    /// type tag.
    pub fn create_step(&self, descriptor: &StepDescriptor) -> Result<Box<dyn Step>, PipelineError> {
        let factory = self
            .step_factories
            .get(&descriptor.step_type)
            .ok_or_else(|| PipelineError::UnknownStepType(descriptor.step_type.clone()))?;
        Ok(factory(descriptor))
    }

    /// Look up a model service by name. "Not found" is a distinct `None`,
    /// never a stand-in no-op implementation.
    pub fn model_service(&self, name: &str) -> Option<Arc<dyn ModelService>> {
        self.model_services.get(name).cloned()
    }

    /// Look up an action service by name.
    pub fn action_service(&self, name: &str) -> Option<Arc<dyn ActionService>> {
        self.action_services.get(name).cloned()
    }
}
