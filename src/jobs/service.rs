//! Job service: submission, driver launch and status queries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::EngineConfig;
use crate::error::{ConfigError, JobError};
use crate::jobs::driver::{FailureInjector, JobDriver};
use crate::jobs::model::{Job, JobStatus};
use crate::jobs::stages::StagePlan;
use crate::jobs::store::{JobStore, StoreSummary};

/// Generates process-unique job ids.
///
/// Ids are `job_<counter><millis % 1_000_000>` with the clock part always six
/// digits wide, so two different counter values can never produce the same id.
#[derive(Debug, Default)]
pub struct JobIdGenerator {
    counter: AtomicU64,
}

impl JobIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = Utc::now().timestamp_millis().rem_euclid(1_000_000);
        format!("job_{n}{millis:06}")
    }
}

/// Public entry point for submitting jobs and querying their status.
pub struct JobService {
    store: Arc<JobStore>,
    ids: JobIdGenerator,
    plan: Arc<StagePlan>,
    failures: Arc<FailureInjector>,
    start_delay: Duration,
    stage_gap: Duration,
}

impl JobService {
    /// Build a service with its own empty store.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store: JobStore::new(),
            ids: JobIdGenerator::new(),
            plan: Arc::new(StagePlan::scaled(config.stage_time_scale)?),
            failures: Arc::new(FailureInjector::new(config.failure_probability)?),
            start_delay: config.start_delay,
            stage_gap: config.stage_gap,
        })
    }

    /// Replace the stage table.
    pub fn with_stage_plan(mut self, plan: StagePlan) -> Self {
        self.plan = Arc::new(plan);
        self
    }

    /// Replace the failure policy.
    pub fn with_failure_injector(mut self, failures: FailureInjector) -> Self {
        self.failures = Arc::new(failures);
        self
    }

    /// Use an externally owned store.
    pub fn with_store(mut self, store: Arc<JobStore>) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn stage_plan(&self) -> &StagePlan {
        &self.plan
    }

    /// Submit a new job and schedule its driver. Returns the new job id.
    ///
    /// A blank `reference_track_url` counts as absent.
    pub async fn submit(
        &self,
        prompt: &str,
        reference_track_url: Option<&str>,
    ) -> Result<String, JobError> {
        self.submit_tracked(prompt, reference_track_url)
            .await
            .map(|(job_id, _)| job_id)
    }

    /// Like [`submit`](Self::submit), also returning the driver task handle.
    pub async fn submit_tracked(
        &self,
        prompt: &str,
        reference_track_url: Option<&str>,
    ) -> Result<(String, JoinHandle<()>), JobError> {
        if prompt.trim().is_empty() {
            return Err(JobError::Validation {
                reason: "prompt must not be empty".to_string(),
            });
        }

        let reference_track_url = reference_track_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        let job_id = self.ids.next_id();
        let job = Job::new(job_id.clone(), prompt, reference_track_url);
        let has_reference = job.has_reference();
        let writer = self.store.put(job).await?;

        let driver = JobDriver::new(
            writer,
            Arc::clone(&self.plan),
            self.stage_gap,
            Arc::clone(&self.failures),
        );
        let handle = spawn_driver(driver, self.start_delay);

        info!(job_id = %job_id, has_reference, "Job queued");
        Ok((job_id, handle))
    }

    /// Independent snapshot of a job.
    pub async fn status(&self, job_id: &str) -> Result<Job, JobError> {
        self.store.get(job_id).await
    }

    pub async fn list(&self) -> Vec<Job> {
        self.store.list().await
    }

    pub async fn summary(&self) -> StoreSummary {
        self.store.summary().await
    }
}

/// Start a driver after the admission delay on its own task.
fn spawn_driver(driver: JobDriver, start_delay: Duration) -> JoinHandle<()> {
    let span = info_span!("job_driver", job_id = %driver.job_id());
    tokio::spawn(
        async move {
            tokio::time::sleep(start_delay).await;
            match driver.run().await {
                Ok(JobStatus::Failure) => warn!("Job ended in failure"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "Job driver aborted"),
            }
        }
        .instrument(span),
    )
}
