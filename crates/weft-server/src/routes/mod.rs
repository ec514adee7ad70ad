//! HTTP routes.

pub mod health;
pub mod pipeline;

pub use health::health_routes;
pub use pipeline::{ExecuteRequest, ExecuteResponse, ExecutionLinks, ResultsResponse, StatusResponse, pipeline_routes};
