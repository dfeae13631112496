//! In-memory job store.
//!
//! Holds one authoritative record per job for the lifetime of the process.
//! Reads hand out deep copies; the only way to mutate a stored record is the
//! [`JobWriter`] returned when it was inserted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::JobError;
use crate::jobs::model::{Job, JobStatus};

/// Mapping from job id to job record. Insertion and lookup only.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a new record and hand back its exclusive writer.
    pub async fn put(self: &Arc<Self>, job: Job) -> Result<JobWriter, JobError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(JobError::DuplicateId { id: job.job_id });
        }

        let job_id = job.job_id.clone();
        jobs.insert(job_id.clone(), job);
        drop(jobs);

        Ok(JobWriter {
            job_id,
            store: Arc::clone(self),
        })
    }

    /// Snapshot of a job. The returned value is independent of the store.
    pub async fn get(&self, job_id: &str) -> Result<Job, JobError> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobError::NotFound {
                id: job_id.to_string(),
            })
    }

    pub async fn contains(&self, job_id: &str) -> bool {
        self.jobs.read().await.contains_key(job_id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Snapshots of every job, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs
    }

    /// Counts of jobs per status.
    pub async fn summary(&self) -> StoreSummary {
        let jobs = self.jobs.read().await;

        let mut summary = StoreSummary::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => summary.pending += 1,
                JobStatus::Processing => summary.processing += 1,
                JobStatus::Success => summary.success += 1,
                JobStatus::Failure => summary.failure += 1,
            }
        }

        summary.total = jobs.len();
        summary
    }

    async fn update<F, R>(&self, job_id: &str, f: F) -> Result<R, JobError>
    where
        F: FnOnce(&mut Job) -> R,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id).ok_or_else(|| JobError::NotFound {
            id: job_id.to_string(),
        })?;
        Ok(f(job))
    }
}

/// Exclusive write access to one stored job.
///
/// Not `Clone`: the holder (the job's driver) is the record's only mutator.
pub struct JobWriter {
    job_id: String,
    store: Arc<JobStore>,
}

impl std::fmt::Debug for JobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWriter")
            .field("job_id", &self.job_id)
            .finish()
    }
}

impl JobWriter {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Apply `f` to the live record under the store's write lock, so
    /// concurrent snapshots see either all of the change or none of it.
    pub async fn update<F, R>(&self, f: F) -> Result<R, JobError>
    where
        F: FnOnce(&mut Job) -> R,
    {
        self.store.update(&self.job_id, f).await
    }

    /// Snapshot of the record this writer owns.
    pub async fn snapshot(&self) -> Result<Job, JobError> {
        self.store.get(&self.job_id).await
    }
}

/// Summary of all stored jobs.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub success: usize,
    pub failure: usize,
}
