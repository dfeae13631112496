//! Per-job stage driver.
//!
//! A driver owns the [`JobWriter`] for exactly one job and walks it from
//! PENDING through the applicable stages to a terminal status.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::{ConfigError, JobError};
use crate::jobs::model::{JobStatus, TrackOutputs};
use crate::jobs::stages::StagePlan;
use crate::jobs::store::JobWriter;

/// Diagnostic recorded on jobs that hit the simulated failure.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Audio generation failed due to unexpected model error.";

/// Stems produced for every successful job.
pub const STEM_NAMES: [&str; 4] = ["drums", "bass", "synth", "lead"];

/// Decides whether a finished job is overridden to FAILURE.
pub struct FailureInjector {
    probability: f64,
    rng: Option<Mutex<StdRng>>,
}

impl FailureInjector {
    /// Fail with the given probability using the thread-local RNG.
    pub fn new(probability: f64) -> Result<Self, ConfigError> {
        Self::check(probability)?;
        Ok(Self {
            probability,
            rng: None,
        })
    }

    /// Deterministic sequence of draws from a fixed seed.
    pub fn seeded(probability: f64, seed: u64) -> Result<Self, ConfigError> {
        Self::check(probability)?;
        Ok(Self {
            probability,
            rng: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        })
    }

    pub fn never() -> Self {
        Self {
            probability: 0.0,
            rng: None,
        }
    }

    pub fn always() -> Self {
        Self {
            probability: 1.0,
            rng: None,
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// One draw. `true` means the job fails.
    pub fn roll(&self) -> bool {
        match &self.rng {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(|e| e.into_inner());
                rng.gen_bool(self.probability)
            }
            None => rand::thread_rng().gen_bool(self.probability),
        }
    }

    fn check(probability: f64) -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&probability) {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue {
                key: "failure_probability".to_string(),
                message: format!("{probability} is not within [0, 1]"),
            })
        }
    }
}

impl std::fmt::Debug for FailureInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureInjector")
            .field("probability", &self.probability)
            .field("seeded", &self.rng.is_some())
            .finish()
    }
}

/// Output links for a successful job.
pub fn track_outputs(job_id: &str) -> TrackOutputs {
    TrackOutputs {
        final_track_url: format!("/audio/final_mix_{job_id}.wav"),
        stems: STEM_NAMES
            .iter()
            .map(|name| (name.to_string(), format!("/stems/{job_id}_{name}.wav")))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Stage-progression state machine for one job.
pub struct JobDriver {
    writer: JobWriter,
    plan: Arc<StagePlan>,
    stage_gap: Duration,
    failures: Arc<FailureInjector>,
}

impl JobDriver {
    pub fn new(
        writer: JobWriter,
        plan: Arc<StagePlan>,
        stage_gap: Duration,
        failures: Arc<FailureInjector>,
    ) -> Self {
        Self {
            writer,
            plan,
            stage_gap,
            failures,
        }
    }

    pub fn job_id(&self) -> &str {
        self.writer.job_id()
    }

    /// Run the job to its terminal status.
    pub async fn run(self) -> Result<JobStatus, JobError> {
        let job_id = self.writer.job_id().to_string();

        let has_reference = self
            .writer
            .update(|job| {
                job.transition_to(JobStatus::Processing, Some("Driver started".to_string()))
                    .map(|_| job.has_reference())
            })
            .await??;

        info!(job_id = %job_id, has_reference, "Job processing started");

        for stage in self.plan.applicable(has_reference) {
            tokio::time::sleep(self.stage_gap).await;

            self.writer.update(|job| job.enter_stage(stage)).await??;
            debug!(
                job_id = %job_id,
                step = stage.name,
                progress = stage.progress,
                "Stage entered"
            );

            tokio::time::sleep(stage.duration).await;
        }

        // One draw, one terminal write.
        let failed = self.failures.roll();
        let outputs = track_outputs(&job_id);
        let (status, elapsed) = self
            .writer
            .update(|job| {
                if failed {
                    job.fail(GENERATION_FAILED_MESSAGE)?;
                } else {
                    job.succeed(outputs)?;
                }
                Ok::<_, JobError>((job.status, job.elapsed()))
            })
            .await??;

        info!(
            job_id = %job_id,
            status = %status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Job finished"
        );
        Ok(status)
    }
}
