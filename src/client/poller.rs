//! Status poller: queries a job on a fixed cadence until it is terminal.
//!
//! Each poll runs independently of every other poll and of new submissions.
//! A failed query ends that poll only; the job itself is never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::{ClientError, JobError};
use crate::jobs::{Job, JobService};

/// Anything that can answer a status query for a job id.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn job_status(&self, job_id: &str) -> Result<Job, ClientError>;
}

#[async_trait]
impl JobStatusSource for JobService {
    async fn job_status(&self, job_id: &str) -> Result<Job, ClientError> {
        self.status(job_id).await.map_err(|e| match e {
            JobError::NotFound { id } => ClientError::NotFound { id },
            other => ClientError::InvalidResponse(other.to_string()),
        })
    }
}

/// How a poll ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The job reached SUCCESS or FAILURE.
    Finished(Job),
    /// A query failed. `snapshot` is the last seen record (or a bare one)
    /// marked as failed with the polling error.
    Aborted { snapshot: Job, error: ClientError },
}

impl PollOutcome {
    pub fn snapshot(&self) -> &Job {
        match self {
            Self::Finished(job) => job,
            Self::Aborted { snapshot, .. } => snapshot,
        }
    }

    pub fn into_snapshot(self) -> Job {
        match self {
            Self::Finished(job) => job,
            Self::Aborted { snapshot, .. } => snapshot,
        }
    }
}

/// Polls a [`JobStatusSource`] at a fixed interval.
pub struct Poller<S: ?Sized> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: ?Sized> Clone for Poller<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            interval: self.interval,
        }
    }
}

impl<S> Poller<S>
where
    S: JobStatusSource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// Query immediately, then once per interval, until the job is terminal
    /// or a query fails. `on_update` sees every snapshot received.
    pub async fn poll_until_terminal<F>(&self, job_id: &str, mut on_update: F) -> PollOutcome
    where
        F: FnMut(&Job) + Send,
    {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last: Option<Job> = None;
        loop {
            ticker.tick().await;

            match self.source.job_status(job_id).await {
                Ok(job) => {
                    on_update(&job);
                    if job.is_terminal() {
                        debug!(job_id = %job_id, status = %job.status, "Polling finished");
                        return PollOutcome::Finished(job);
                    }
                    last = Some(job);
                }
                Err(error) => {
                    warn!(job_id = %job_id, error = %error, "Polling stopped");
                    let snapshot = last
                        .take()
                        .unwrap_or_else(|| Job::new(job_id, "", None))
                        .into_poll_failure(&error);
                    return PollOutcome::Aborted { snapshot, error };
                }
            }
        }
    }

    /// Run the poll on its own task, publishing each snapshot.
    pub fn spawn(&self, job_id: impl Into<String>) -> PollHandle {
        let job_id = job_id.into();
        let (tx, updates) = watch::channel(None);
        let poller = self.clone();

        let handle = tokio::spawn(async move {
            let outcome = poller
                .poll_until_terminal(&job_id, |job| {
                    tx.send_replace(Some(job.clone()));
                })
                .await;
            if let PollOutcome::Aborted { snapshot, .. } = &outcome {
                tx.send_replace(Some(snapshot.clone()));
            }
            outcome
        });

        PollHandle { updates, handle }
    }
}

/// A poll running on its own task.
pub struct PollHandle {
    /// Latest snapshot seen by the poller.
    pub updates: watch::Receiver<Option<Job>>,
    handle: JoinHandle<PollOutcome>,
}

impl PollHandle {
    pub fn latest(&self) -> Option<Job> {
        self.updates.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the poll to end.
    pub async fn outcome(self) -> Result<PollOutcome, JoinError> {
        self.handle.await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::EngineConfig;
    use crate::jobs::{FailureInjector, JobStatus, StagePlan};

    fn service(failures: FailureInjector) -> Arc<JobService> {
        Arc::new(
            JobService::new(&EngineConfig::default())
                .unwrap()
                .with_failure_injector(failures),
        )
    }

    /// Fails every query after the first `ok_queries`.
    struct FlakySource {
        inner: Arc<JobService>,
        ok_queries: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobStatusSource for FlakySource {
        async fn job_status(&self, job_id: &str) -> Result<Job, ClientError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_queries {
                return Err(ClientError::InvalidResponse("connection reset".to_string()));
            }
            self.inner.job_status(job_id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_success() {
        let service = service(FailureInjector::never());
        let job_id = service.submit("lofi beat", None).await.unwrap();

        let poller = Poller::new(Arc::clone(&service), Duration::from_secs(3));
        let mut seen = Vec::new();
        let outcome = poller
            .poll_until_terminal(&job_id, |job| seen.push(job.result.progress))
            .await;

        let job = match outcome {
            PollOutcome::Finished(job) => job,
            other => panic!("expected finished, got {other:?}"),
        };
        assert_eq!(job.status, JobStatus::Success);
        assert!(seen.len() > 2);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_failure() {
        let service = service(FailureInjector::always());
        let job_id = service.submit("lofi beat", None).await.unwrap();

        let outcome = Poller::new(service, Duration::from_secs(3))
            .poll_until_terminal(&job_id, |_| {})
            .await;

        assert!(matches!(outcome, PollOutcome::Finished(_)));
        let job = outcome.into_snapshot();
        assert_eq!(job.status, JobStatus::Failure);
        assert!(job.result.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_job_aborts_with_error_snapshot() {
        let service = service(FailureInjector::never());
        let outcome = Poller::new(service, Duration::from_secs(3))
            .poll_until_terminal("nonexistent", |_| panic!("no snapshot expected"))
            .await;

        match outcome {
            PollOutcome::Aborted { snapshot, error } => {
                assert!(matches!(error, ClientError::NotFound { .. }));
                assert_eq!(snapshot.job_id, "nonexistent");
                assert_eq!(snapshot.status, JobStatus::Failure);
                assert!(snapshot.result.error.unwrap().starts_with("Polling failed"));
            }
            other => panic!("expected aborted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_keeps_last_snapshot() {
        let service = service(FailureInjector::never());
        let job_id = service.submit("lofi beat", None).await.unwrap();
        let source = Arc::new(FlakySource {
            inner: Arc::clone(&service),
            ok_queries: 2,
            calls: AtomicUsize::new(0),
        });

        let outcome = Poller::new(source, Duration::from_secs(3))
            .poll_until_terminal(&job_id, |_| {})
            .await;

        let PollOutcome::Aborted { snapshot, .. } = outcome else {
            panic!("expected aborted");
        };
        assert_eq!(snapshot.job_id, job_id);
        assert_eq!(snapshot.prompt, "lofi beat");
        assert_eq!(snapshot.status, JobStatus::Failure);

        // The live job is unaffected and keeps running.
        let live = service.status(&job_id).await.unwrap();
        assert_eq!(live.status, JobStatus::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_polls_are_independent() {
        let service = Arc::new(
            JobService::new(&EngineConfig::default())
                .unwrap()
                .with_stage_plan(StagePlan::uniform(Duration::from_millis(200)))
                .with_failure_injector(FailureInjector::never()),
        );
        let poller = Poller::new(Arc::clone(&service), Duration::from_millis(100));

        let first = service.submit("first", None).await.unwrap();
        let missing = poller.spawn("nonexistent");
        let first_poll = poller.spawn(first.clone());

        // A submission while polls are running.
        let second = service.submit("second", Some("http://x/ref.wav")).await.unwrap();
        let second_poll = poller.spawn(second.clone());

        let missing = missing.outcome().await.unwrap();
        assert!(matches!(missing, PollOutcome::Aborted { .. }));

        let first_job = first_poll.outcome().await.unwrap().into_snapshot();
        let second_job = second_poll.outcome().await.unwrap().into_snapshot();
        assert_eq!(first_job.job_id, first);
        assert_eq!(second_job.job_id, second);
        assert_eq!(first_job.status, JobStatus::Success);
        assert_eq!(second_job.status, JobStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_poll_publishes_latest_snapshot() {
        let service = service(FailureInjector::never());
        let job_id = service.submit("lofi beat", None).await.unwrap();

        let handle = Poller::new(service, Duration::from_secs(3)).spawn(job_id.clone());
        let mut updates = handle.updates.clone();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().as_ref().unwrap().job_id, job_id);

        let outcome = handle.outcome().await.unwrap();
        assert_eq!(outcome.snapshot().status, JobStatus::Success);
        assert_eq!(updates.borrow().as_ref().unwrap().status, JobStatus::Success);
    }
}
