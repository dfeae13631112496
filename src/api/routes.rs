//! REST endpoints for submitting tracks and querying jobs.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use super::schemas::{CreateTrackRequest, CreateTrackResponse, ErrorResponse, JobListResponse};
use crate::error::JobError;
use crate::jobs::{JobService, JobStatus};

/// Shared state for job routes.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<JobService>,
}

/// Build the job API router.
pub fn job_routes(service: Arc<JobService>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/create-track", post(create_track))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_id}", get(get_job))
        .layer(CorsLayer::permissive())
        .with_state(ApiState { service })
}

/// [`JobError`] rendered as a `{"detail": ...}` response.
pub struct ApiError(JobError);

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            JobError::Validation { reason } => (StatusCode::UNPROCESSABLE_ENTITY, reason.clone()),
            JobError::NotFound { .. } => (StatusCode::NOT_FOUND, "Job not found".to_string()),
            JobError::DuplicateId { .. } => (StatusCode::CONFLICT, self.0.to_string()),
            JobError::InvalidTransition { .. } => {
                tracing::error!(error = %self.0, "Unexpected job state error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "trackgen"
    }))
}

// ── Jobs ────────────────────────────────────────────────────────────────

/// POST /create-track
async fn create_track(
    State(state): State<ApiState>,
    Json(body): Json<CreateTrackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = state
        .service
        .submit(&body.prompt, body.reference_track_url.as_deref())
        .await?;

    info!(job_id = %job_id, "Track job accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(CreateTrackResponse {
            job_id,
            status: JobStatus::Pending,
            details: "Job has been queued.".to_string(),
        }),
    ))
}

/// GET /jobs/{job_id}
async fn get_job(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.service.status(&job_id).await?;
    debug!(job_id = %job_id, status = %job.status, progress = job.result.progress, "Status query");
    Ok(Json(job))
}

/// GET /jobs
async fn list_jobs(State(state): State<ApiState>) -> impl IntoResponse {
    let jobs = state.service.list().await;
    let summary = state.service.summary().await;
    Json(JobListResponse { jobs, summary })
}
