//! `reqwest`-backed client for the three host endpoints this engine
//! consumes, plus the independent cron-trigger GET.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::descriptor::{PipelineDescriptor, ScheduledPipeline};
use crate::error::PipelineError;
use crate::store::StepResult;

/// Body posted to `POST {base}/pipeline/{id}/execution-result`.
#[derive(Debug, Serialize)]
pub struct ExecutionResultPayload {
    pub pipeline_id: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub step_results: HashMap<String, StepResult>,
}

/// Client for the remote content-management host.
#[derive(Clone)]
pub struct HostClient {
    client: reqwest::Client,
    base_url: String,
    host_header: String,
}

impl HostClient {
    pub fn new(base_url: impl Into<String>, host_header: impl Into<String>) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::HostApi(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            host_header: host_header.into(),
        })
    }

    /// `GET {base}/pipelines/scheduled`.
    pub async fn fetch_scheduled(&self) -> Result<Vec<ScheduledPipeline>, PipelineError> {
        let url = format!("{}/pipelines/scheduled", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::HOST, &self.host_header)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PipelineError::HostApi(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        response
            .json::<Vec<ScheduledPipeline>>()
            .await
            .map_err(PipelineError::from)
    }

    /// `GET {base}/pipelines/{id}`.
    pub async fn fetch_pipeline(&self, id: &str) -> Result<PipelineDescriptor, PipelineError> {
        let url = format!("{}/pipelines/{id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::HOST, &self.host_header)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PipelineError::HostApi(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        response
            .json::<PipelineDescriptor>()
            .await
            .map_err(PipelineError::from)
    }

    /// `POST {base}/pipeline/{id}/execution-result`.
    pub async fn post_execution_result(
        &self,
        pipeline_id: &str,
        payload: &ExecutionResultPayload,
    ) -> Result<(), PipelineError> {
        let url = format!("{}/pipeline/{pipeline_id}/execution-result", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::HOST, &self.host_header)
            .json(payload)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(PipelineError::HostApi(format!(
                "POST {url} returned {}",
                response.status()
            )))
        }
    }

    /// Independent cron-kick GET. `200` and `204` both count as success.
    pub async fn trigger_cron(&self, url: &str) -> Result<(), PipelineError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::HOST, &self.host_header)
            .send()
            .await?;
        let status = response.status();
        if status.as_u16() == 200 || status.as_u16() == 204 {
            Ok(())
        } else {
            Err(PipelineError::HostApi(format!(
                "cron trigger GET {url} returned {status}"
            )))
        }
    }
}
