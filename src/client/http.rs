//! HTTP client for a remote job API.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::poller::JobStatusSource;
use crate::api::schemas::{CreateTrackRequest, CreateTrackResponse, ErrorResponse};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::jobs::Job;

/// Talks to `POST /create-track` and `GET /jobs/{id}`.
#[derive(Debug, Clone)]
pub struct HttpJobClient {
    http: reqwest::Client,
    base_url: String,
    base: Url,
}

impl HttpJobClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let base_url = config.orchestrator_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.clone(),
            message: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: base_url,
                message: "not a base URL".to_string(),
            });
        }
        Ok(Self {
            http,
            base_url,
            base,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a prompt; returns the server's acknowledgement.
    pub async fn create_track(
        &self,
        prompt: &str,
        reference_track_url: Option<&str>,
    ) -> Result<CreateTrackResponse, ClientError> {
        let url = self.endpoint(&["create-track"])?;
        let body = CreateTrackRequest {
            prompt: prompt.to_string(),
            reference_track_url: reference_track_url.map(str::to_string),
        };

        debug!(url = %url, "Submitting track job");
        let response = self.http.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let created: CreateTrackResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        if created.job_id.is_empty() {
            return Err(ClientError::InvalidResponse(
                "API did not return a job_id".to_string(),
            ));
        }
        Ok(created)
    }

    /// Fetch the current snapshot of a job.
    pub async fn job_status(&self, job_id: &str) -> Result<Job, ClientError> {
        let url = self.endpoint(&["jobs", job_id])?;
        let response = self.http.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                id: job_id.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Base URL extended with percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base_url.clone(),
                message: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl JobStatusSource for HttpJobClient {
    async fn job_status(&self, job_id: &str) -> Result<Job, ClientError> {
        HttpJobClient::job_status(self, job_id).await
    }
}

async fn status_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let detail = match response.json::<ErrorResponse>().await {
        Ok(body) => body.detail,
        Err(_) => format!("Server responded with status: {status}"),
    };
    ClientError::Status { status, detail }
}
