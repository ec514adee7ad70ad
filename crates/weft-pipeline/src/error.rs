//! Error types for the pipeline engine.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur during pipeline operations.
///
/// The message text of the step-level variants is operator-facing
/// contract, not incidental `Debug` output — operators grep logs and the
/// host callback's `error_message` field for these exact strings.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A step's type tag has no matching factory in the registry.
    #[error("unknown step type: {0}")]
    UnknownStepType(String),

    /// A step's config names a model service but omits `service_name`.
    #[error("service_name not found in llm_service configuration for step {step_id}")]
    MissingServiceName { step_id: String },

    /// A step names a service that was never registered.
    #[error("service '{service}' not found in registry for step {step_id}")]
    ServiceNotFound { step_id: String, service: String },

    /// The model service call itself failed.
    #[error("error calling LLM service for step {step_id}: {cause}")]
    ModelServiceFailed { step_id: String, cause: String },

    /// The action service call itself failed.
    #[error("error executing action service for step {step_id}: {cause}")]
    ActionServiceFailed { step_id: String, cause: String },

    /// A step's `required_steps` names a key absent from the context.
    #[error("required step output '{0}' not found in context")]
    RequiredOutputMissing(String),

    /// The pipeline descriptor itself is malformed.
    #[error("invalid pipeline descriptor: {0}")]
    InvalidDescriptor(String),

    /// Fetching data from, or posting results to, the host API failed.
    #[error("host API error: {0}")]
    HostApi(String),

    /// Scheduling bookkeeping failed (e.g. a reserved pipeline id that
    /// vanished before release).
    #[error("scheduling error: {0}")]
    Scheduling(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::HostApi(err.to_string())
    }
}
