//! Scheduling and execution core for the pipeline engine.
//!
//! This crate owns *when* and *how* user-defined pipelines execute: the
//! scheduler's due-pipeline discovery and single-flight guarantee, the
//! step-graph executor that threads a shared `Context` through a
//! pipeline's steps in declared order, the extensibility registry that
//! binds step/model/action identifiers to concrete implementations, and
//! the execution-result store with TTL eviction. Concrete model/search/
//! action adapters, and the content-management host that owns pipeline
//! authoring, are external collaborators reached only through the
//! contracts and client defined here.

pub mod clock;
pub mod context;
pub mod contracts;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod host_client;
pub mod registry;
pub mod scheduler;
pub mod step_types;
pub mod store;
pub mod tasks;

pub use clock::{Clock, SystemClock, TestClock};
pub use context::{
    concatenate_required_outputs, parse_required_steps, substitute_placeholders, Context,
};
pub use contracts::{ActionService, ModelService, Step, StepFactory};
pub use descriptor::{
    PipelineDescriptor, RecurringFrequency, ScheduleType, ScheduledPipeline, StepDescriptor,
};
pub use error::{PipelineError, Result};
pub use executor::{PipelineExecutor, PipelineRunOutcome};
pub use host_client::{ExecutionResultPayload, HostClient};
pub use registry::Registry;
pub use scheduler::{should_run, RunningSet, Scheduler};
pub use step_types::{ActionStep, ModelInferenceStep};
pub use store::{EvictionHandle, ExecutionRecord, ExecutionStatus, ExecutionStore, StepResult};
pub use tasks::ExecutionTracker;
