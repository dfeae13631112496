//! Job record and its status state machine.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::jobs::stages::Stage;

/// Step label of a freshly submitted job.
pub const STEP_QUEUED: &str = "Queued";
/// Step label once a job has succeeded.
pub const STEP_COMPLETED: &str = "Completed";
/// Step label once a job has failed.
pub const STEP_FAILED: &str = "Failed";

const MAX_TRANSITIONS: usize = 200;

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Submitted, driver not started yet.
    Pending,
    /// Driver is advancing stages.
    Processing,
    /// Finished with outputs.
    Success,
    /// Finished with an error message.
    Failure,
}

impl JobStatus {
    /// Check if this status allows transitioning to another status.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Pending, Processing) | (Processing, Success) | (Processing, Failure)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        };
        write!(f, "{s}")
    }
}

/// A status transition event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: JobStatus,
    pub to: JobStatus,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Mutable progress/outcome part of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Label of the current or last stage.
    pub step: String,
    /// 0–100.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_track_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stems: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for JobResult {
    fn default() -> Self {
        Self {
            step: STEP_QUEUED.to_string(),
            progress: 0,
            final_track_url: None,
            stems: None,
            error: None,
        }
    }
}

/// Outputs attached to a successful job.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackOutputs {
    pub final_track_url: String,
    pub stems: BTreeMap<String, String>,
}

/// A generation request and its tracked progress/outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub prompt: String,
    #[serde(default)]
    pub reference_track_url: Option<String>,
    pub status: JobStatus,
    pub result: JobResult,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transitions: Vec<StatusTransition>,
}

impl Job {
    /// Create a new PENDING job.
    pub fn new(
        job_id: impl Into<String>,
        prompt: impl Into<String>,
        reference_track_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            prompt: prompt.into(),
            reference_track_url,
            status: JobStatus::Pending,
            result: JobResult::default(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            transitions: Vec::new(),
        }
    }

    pub fn has_reference(&self) -> bool {
        self.reference_track_url.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition to a new status.
    pub fn transition_to(
        &mut self,
        new_status: JobStatus,
        reason: Option<String>,
    ) -> Result<(), JobError> {
        if !self.status.can_transition_to(new_status) {
            return Err(self.invalid_transition(new_status.to_string()));
        }

        let now = Utc::now();
        self.transitions.push(StatusTransition {
            from: self.status,
            to: new_status,
            timestamp: now,
            reason,
        });
        if self.transitions.len() > MAX_TRANSITIONS {
            let drain_count = self.transitions.len() - MAX_TRANSITIONS;
            self.transitions.drain(..drain_count);
        }

        self.status = new_status;
        self.updated_at = now;
        if new_status.is_terminal() {
            self.completed_at = Some(now);
        }

        Ok(())
    }

    /// Enter a stage: set its label and progress checkpoint.
    ///
    /// Only legal while PROCESSING, and never lowers progress.
    pub fn enter_stage(&mut self, stage: &Stage) -> Result<(), JobError> {
        if self.status != JobStatus::Processing {
            return Err(self.invalid_transition(format!("stage '{}'", stage.name)));
        }
        if stage.progress < self.result.progress {
            return Err(self.invalid_transition(format!(
                "stage '{}' (progress {} < {})",
                stage.name, stage.progress, self.result.progress
            )));
        }

        self.result.step = stage.name.to_string();
        self.result.progress = stage.progress;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Finish successfully with the given outputs.
    pub fn succeed(&mut self, outputs: TrackOutputs) -> Result<(), JobError> {
        self.transition_to(JobStatus::Success, Some("All stages completed".to_string()))?;
        self.result.step = STEP_COMPLETED.to_string();
        self.result.progress = 100;
        self.result.final_track_url = Some(outputs.final_track_url);
        self.result.stems = Some(outputs.stems);
        self.result.error = None;
        Ok(())
    }

    /// Finish with a failure diagnostic.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        self.transition_to(JobStatus::Failure, Some(error.clone()))?;
        self.result.step = STEP_FAILED.to_string();
        self.result.final_track_url = None;
        self.result.stems = None;
        self.result.error = Some(error);
        Ok(())
    }

    /// Convert this snapshot into the record an observer surfaces when
    /// polling itself failed. Only ever applied to a caller-owned copy.
    pub fn into_poll_failure(mut self, reason: impl std::fmt::Display) -> Self {
        self.status = JobStatus::Failure;
        self.result.step = STEP_FAILED.to_string();
        self.result.final_track_url = None;
        self.result.stems = None;
        self.result.error = Some(format!("Polling failed: {reason}"));
        self
    }

    /// Time since creation, or total runtime once terminal.
    pub fn elapsed(&self) -> Duration {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        end.signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or_default()
    }

    fn invalid_transition(&self, target: String) -> JobError {
        JobError::InvalidTransition {
            id: self.job_id.clone(),
            state: self.status.to_string(),
            target,
        }
    }
}
