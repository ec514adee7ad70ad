//! On-demand execution routes (§4.6, §6): submit, status, results.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use weft_pipeline::{ExecutionRecord, ExecutionStatus, StepResult};

use crate::error::{Result, ServerError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub user_input: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub execution_id: Uuid,
    pub pipeline_id: String,
    pub status: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub user_input: Option<String>,
    pub links: ExecutionLinks,
}

#[derive(Debug, Serialize)]
pub struct ExecutionLinks {
    #[serde(rename = "self")]
    pub self_: String,
    pub status: String,
    pub results: String,
}

impl ExecutionLinks {
    fn new(pipeline_id: &str, execution_id: Uuid) -> Self {
        let base = format!("/pipeline/{pipeline_id}/execution/{execution_id}");
        Self {
            self_: base.clone(),
            status: format!("{base}/status"),
            results: format!("{base}/results"),
        }
    }
}

/// `POST /pipeline/{id}/execute`: fetch the full descriptor, generate an
/// execution id, write the "started" record, and launch the executor on a
/// background task. Returns immediately — it does not wait for the
/// pipeline to finish (§4.6).
async fn execute(
    State(state): State<AppState>,
    Path(pipeline_id): Path<String>,
    Json(request): Json<ExecuteRequest>,
) -> Result<(StatusCode, Json<ExecuteResponse>)> {
    let pipeline = state.host_client.fetch_pipeline(&pipeline_id).await?;

    let execution_id = Uuid::new_v4();
    let record = ExecutionRecord::started(execution_id, pipeline_id.clone(), request.user_input.clone());
    let submitted_at = record.submitted_at;
    state.store.insert(record).await;

    let executor = state.executor.clone();
    let store = state.store.clone();
    let host_client = state.host_client.clone();
    let user_input = request.user_input.clone();
    let pipeline_id_for_task = pipeline_id.clone();

    state.tracker.spawn(async move {
        let outcome = executor.run(execution_id, &pipeline, user_input).await;
        let status = outcome.status();

        store
            .update(execution_id, |record| {
                record.status = status;
                record.completed_at = Some(outcome.end_time);
                record.end_epoch = Some(outcome.end_time.timestamp());
                record.error_message = outcome.error.as_ref().map(|e| e.to_string());
                record.results = Some(outcome.step_results.clone());
            })
            .await;

        let payload = weft_pipeline::ExecutionResultPayload {
            pipeline_id: pipeline_id_for_task.clone(),
            start_time: outcome.start_time,
            end_time: outcome.end_time,
            step_results: outcome.step_results,
        };
        if let Err(err) = host_client
            .post_execution_result(&pipeline_id_for_task, &payload)
            .await
        {
            tracing::error!(pipeline_id = %pipeline_id_for_task, error = %err, "failed to post execution result");
        }
    })
    .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteResponse {
            execution_id,
            pipeline_id: pipeline_id.clone(),
            status: "started".to_string(),
            submitted_at,
            user_input: request.user_input,
            links: ExecutionLinks::new(&pipeline_id, execution_id),
        }),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub execution_id: Uuid,
    pub pipeline_id: String,
    pub status: ExecutionStatus,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `GET /pipeline/{id}/execution/{execution_id}/status`.
async fn status(
    State(state): State<AppState>,
    Path((_pipeline_id, execution_id)): Path<(String, Uuid)>,
) -> Result<Json<StatusResponse>> {
    let record = state
        .store
        .get(execution_id)
        .await
        .ok_or(ServerError::ExecutionNotFound(execution_id))?;

    Ok(Json(StatusResponse {
        execution_id: record.execution_id,
        pipeline_id: record.pipeline_id,
        status: record.status,
        submitted_at: record.submitted_at,
        completed_at: record.completed_at,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub execution_id: Uuid,
    pub pipeline_id: String,
    pub status: ExecutionStatus,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub user_input: Option<String>,
    pub results: Option<HashMap<String, StepResult>>,
    pub error_message: Option<String>,
}

/// `GET /pipeline/{id}/execution/{execution_id}/results`. `404` if the id
/// is unknown — evicted or never existed (§6).
async fn results(
    State(state): State<AppState>,
    Path((_pipeline_id, execution_id)): Path<(String, Uuid)>,
) -> Result<Json<ResultsResponse>> {
    let record = state
        .store
        .get(execution_id)
        .await
        .ok_or(ServerError::ExecutionNotFound(execution_id))?;

    Ok(Json(ResultsResponse {
        execution_id: record.execution_id,
        pipeline_id: record.pipeline_id,
        status: record.status,
        submitted_at: record.submitted_at,
        completed_at: record.completed_at,
        user_input: record.user_input,
        results: record.results,
        error_message: record.error_message,
    }))
}

pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/{id}/execute", post(execute))
        .route("/pipeline/{id}/execution/{execution_id}/status", get(status))
        .route("/pipeline/{id}/execution/{execution_id}/results", get(results))
}
