//! Step Executor and Pipeline Executor (§4.2, §4.3).
//!
//! One `PipelineExecutor::run` call is the entire lifecycle of one
//! execution: it owns the `Context`, drives each step through the
//! registry in declared order, and produces the aggregate handed to the
//! Execution Store and the host callback. Steps never run concurrently
//! within one execution, so the context needs no internal locking.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::context::Context;
use crate::descriptor::PipelineDescriptor;
use crate::error::PipelineError;
use crate::registry::Registry;
use crate::store::{ExecutionStatus, StepResult};

/// Everything produced by running one pipeline to completion or failure.
pub struct PipelineRunOutcome {
    pub execution_id: Uuid,
    pub start_time: chrono::DateTime<Utc>,
    pub end_time: chrono::DateTime<Utc>,
    pub step_results: HashMap<String, StepResult>,
    /// `Some` iff the pipeline aborted on a step error (§4.2 step 7).
    pub error: Option<PipelineError>,
}

impl PipelineRunOutcome {
    pub fn status(&self) -> ExecutionStatus {
        if self.error.is_some() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        }
    }
}

/// Runs a pipeline's steps in declared order against a shared `Context`,
/// aggregating per-step results.
///
/// Stateless: a fresh `Context` is built for every call from the
/// pipeline's own step list, so one `PipelineExecutor` value may be
/// reused (or shared behind an `Arc`) across concurrent executions of
/// different pipelines.
pub struct PipelineExecutor {
    registry: Registry,
}

impl PipelineExecutor {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Run `pipeline`'s steps in order. Mirrors §4.2's algorithm exactly:
    /// each step is resolved, executed, and recorded; a step error aborts
    /// the remaining steps but the already-recorded step results are
    /// still returned so the host callback sees the partial aggregate.
    pub async fn run(
        &self,
        execution_id: Uuid,
        pipeline: &PipelineDescriptor,
        user_input: Option<String>,
    ) -> PipelineRunOutcome {
        let start_time = Utc::now();
        let mut context = Context::new(pipeline.steps.clone(), user_input);
        let mut step_results = HashMap::new();
        let mut pipeline_error = None;

        for step_descriptor in &pipeline.steps {
            let step_start = Utc::now();

            let outcome = self.execute_one(step_descriptor, &mut context).await;

            let step_end = Utc::now();
            let duration = (step_end - step_start).num_milliseconds() as f64 / 1000.0;

            let (status, error_message, abort) = match &outcome {
                Ok(()) => (ExecutionStatus::Completed, None, false),
                Err(err) => (ExecutionStatus::Failed, Some(err.to_string()), true),
            };

            let data = context
                .get(&step_descriptor.output_key)
                .cloned()
                .unwrap_or(serde_json::Value::Null);

            step_results.insert(
                step_descriptor.id.clone(),
                StepResult {
                    step_uuid: step_descriptor.id.clone(),
                    step_description: step_descriptor.step_type.clone(),
                    status,
                    start_time: step_start,
                    end_time: step_end,
                    duration,
                    step_type: step_descriptor.step_type.clone(),
                    sequence: step_descriptor.weight,
                    data,
                    output_type: step_descriptor.output_type.clone(),
                    error_message,
                },
            );

            if abort {
                pipeline_error = outcome.err();
                break;
            }
        }

        PipelineRunOutcome {
            execution_id,
            start_time,
            end_time: Utc::now(),
            step_results,
            error: pipeline_error,
        }
    }

    /// Resolve and invoke a single step (§4.3's `Step Contract`).
    async fn execute_one(
        &self,
        descriptor: &crate::descriptor::StepDescriptor,
        context: &mut Context,
    ) -> Result<(), PipelineError> {
        let step = self.registry.create_step(descriptor)?;
        step.execute(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ModelService, Step};
    use crate::step_types::ModelInferenceStep;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;

    struct EchoModel;

    #[async_trait]
    impl ModelService for EchoModel {
        async fn call(&self, _config: &Value, prompt: &str) -> Result<String, anyhow::Error> {
            Ok(format!("LLM response based on prompt: {prompt}"))
        }
    }

    struct FailingStep;

    #[async_trait]
    impl Step for FailingStep {
        async fn execute(&self, _context: &mut Context) -> Result<(), PipelineError> {
            Err(PipelineError::RequiredOutputMissing("boom".into()))
        }

        fn get_type(&self) -> &str {
            "failing"
        }
    }

    fn llm_step_descriptor(
        id: &str,
        output_key: &str,
        prompt: &str,
        required_steps: &str,
    ) -> crate::descriptor::StepDescriptor {
        let mut config = StdHashMap::new();
        config.insert("service_name".into(), Value::String("mock".into()));
        config.insert("prompt".into(), Value::String(prompt.into()));
        crate::descriptor::StepDescriptor {
            id: id.into(),
            step_type: "llm_step".into(),
            weight: 0,
            output_key: output_key.into(),
            output_type: "text".into(),
            required_steps: required_steps.into(),
            config,
        }
    }

    #[tokio::test]
    async fn s5_second_step_consumes_first_steps_output() {
        let mut registry = Registry::new();
        registry.register_model_service("mock", Arc::new(EchoModel));
        let for_factory = registry.clone();
        registry.register_step_type("llm_step", move |descriptor| {
            Box::new(ModelInferenceStep::new(descriptor.clone(), for_factory.clone()))
        });

        let name_step = llm_step_descriptor("s1", "name", "World", "");
        let greeting_step = llm_step_descriptor("s2", "greeting", "Hello, {name}!", "name");
        let pipeline = PipelineDescriptor {
            id: "p1".into(),
            label: "greeting pipeline".into(),
            steps: vec![name_step, greeting_step],
            execution_failures: 0,
        };

        let executor = PipelineExecutor::new(registry);
        let outcome = executor.run(Uuid::new_v4(), &pipeline, None).await;

        assert_eq!(outcome.status(), ExecutionStatus::Completed);
        assert_eq!(
            outcome.step_results["s2"].data,
            json!("LLM response based on prompt: Hello, LLM response based on prompt: World!")
        );
    }

    #[tokio::test]
    async fn s6_unknown_step_type_aborts_pipeline_with_message() {
        let registry = Registry::new();
        let pipeline = PipelineDescriptor {
            id: "p1".into(),
            label: "bad pipeline".into(),
            steps: vec![crate::descriptor::StepDescriptor {
                id: "s1".into(),
                step_type: "unknown_step".into(),
                weight: 0,
                output_key: "out".into(),
                output_type: "text".into(),
                required_steps: String::new(),
                config: StdHashMap::new(),
            }],
            execution_failures: 0,
        };

        let executor = PipelineExecutor::new(registry);
        let outcome = executor.run(Uuid::new_v4(), &pipeline, None).await;

        assert_eq!(outcome.status(), ExecutionStatus::Failed);
        let err = outcome.error.unwrap();
        assert_eq!(err.to_string(), "unknown step type: unknown_step");
        let result = &outcome.step_results["s1"];
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(
            result.error_message.as_deref(),
            Some("unknown step type: unknown_step")
        );
    }

    #[tokio::test]
    async fn step_error_aborts_remaining_steps() {
        let mut registry = Registry::new();
        registry.register_step_type("failing", |_d| Box::new(FailingStep));
        registry.register_step_type("failing2", |_d| Box::new(FailingStep));

        let pipeline = PipelineDescriptor {
            id: "p1".into(),
            label: "aborting pipeline".into(),
            steps: vec![
                crate::descriptor::StepDescriptor {
                    id: "s1".into(),
                    step_type: "failing".into(),
                    weight: 0,
                    output_key: "a".into(),
                    output_type: "text".into(),
                    required_steps: String::new(),
                    config: StdHashMap::new(),
                },
                crate::descriptor::StepDescriptor {
                    id: "s2".into(),
                    step_type: "failing2".into(),
                    weight: 1,
                    output_key: "b".into(),
                    output_type: "text".into(),
                    required_steps: String::new(),
                    config: StdHashMap::new(),
                },
            ],
            execution_failures: 0,
        };

        let executor = PipelineExecutor::new(registry);
        let outcome = executor.run(Uuid::new_v4(), &pipeline, None).await;

        assert_eq!(outcome.step_results.len(), 1);
        assert!(outcome.step_results.contains_key("s1"));
        assert!(!outcome.step_results.contains_key("s2"));
    }

    #[tokio::test]
    async fn ordering_start_times_non_decreasing() {
        use crate::contracts::Step as StepTrait;

        struct NoopStep;
        #[async_trait]
        impl StepTrait for NoopStep {
            async fn execute(&self, _context: &mut Context) -> Result<(), PipelineError> {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                Ok(())
            }
            fn get_type(&self) -> &str {
                "noop"
            }
        }

        let mut registry = Registry::new();
        registry.register_step_type("noop", |_d| Box::new(NoopStep));

        let steps: Vec<_> = (0..3i64)
            .map(|i| crate::descriptor::StepDescriptor {
                id: format!("s{i}"),
                step_type: "noop".into(),
                weight: i,
                output_key: format!("out{i}"),
                output_type: "text".into(),
                required_steps: String::new(),
                config: StdHashMap::new(),
            })
            .collect();

        let pipeline = PipelineDescriptor {
            id: "p1".into(),
            label: "ordering pipeline".into(),
            steps,
            execution_failures: 0,
        };

        let executor = PipelineExecutor::new(registry);
        let outcome = executor.run(Uuid::new_v4(), &pipeline, None).await;

        let times: Vec<_> = (0..3)
            .map(|i| outcome.step_results[&format!("s{i}")].start_time)
            .collect();
        let sorted = {
            let mut t = times.clone();
            t.sort();
            t
        };
        assert_eq!(times, sorted);
    }
}
