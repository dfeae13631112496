//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::jobs::{Job, JobStatus, StoreSummary};

/// Body of `POST /create-track`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrackRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_track_url: Option<String>,
}

/// Response of `POST /create-track`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTrackResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub details: String,
}

/// Response of `GET /jobs`.
#[derive(Debug, Clone, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub summary: StoreSummary,
}

/// Error body: `{"detail": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
