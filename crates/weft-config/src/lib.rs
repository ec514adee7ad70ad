//! Environment-driven configuration for the pipeline execution engine.
//!
//! A single flat `EngineConfig`, parsed once at process startup (§10.3).
//! There is no config file, no layering, no secret-at-rest storage — those
//! concerns belong to the content-management host this engine's process
//! treats as an external collaborator (§1).

pub mod error;
pub mod types;

pub use error::{ConfigError, Result};
pub use types::EngineConfig;
