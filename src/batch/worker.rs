//! Job execution.
//!
//! A [`Worker`] turns one job into one result. Whatever happens inside the
//! provider (an error, a timeout, a panic, a cancelled batch) ends up as data
//! on the returned [`JobResult`]; `execute` itself cannot fail.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::batch::{FetchError, IndexedJob, JobResult, JobStatus, WorkerId};

/// External I/O provider called once per job.
///
/// Implementations must fully consume and release whatever they acquire
/// (response bodies, connections) before returning, on both the success and
/// the error path. They must not retry.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Data identifying the resource to fetch
    type Input: Send + Sync + 'static;
    /// Payload produced on success
    type Output: Send + 'static;

    /// Fetch the resource described by `input`
    async fn fetch(&self, input: &Self::Input) -> Result<Self::Output, FetchError>;
}

/// A concurrent execution context with a stable identity
pub struct Worker<F: Fetcher> {
    id: WorkerId,
    fetcher: Arc<F>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl<F: Fetcher> Worker<F> {
    /// Create a worker around a shared fetcher
    pub fn new(id: WorkerId, fetcher: Arc<F>) -> Self {
        Self {
            id,
            fetcher,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound each job's I/O
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abandon in-flight I/O when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Worker identity
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Execute one job. Always returns a result.
    pub async fn execute(&self, job: IndexedJob<F::Input>) -> JobResult<F::Output> {
        let IndexedJob { index, job } = job;
        let start = Instant::now();
        debug!(worker_id = %self.id, job_id = %job.id, "Worker started job");

        let fetch = AssertUnwindSafe(self.fetcher.fetch(&job.input)).catch_unwind();
        let bounded = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, fetch).await {
                    Ok(caught) => caught.unwrap_or_else(|panic| Err(FetchError::from_panic(panic))),
                    Err(_) => Err(FetchError::Timeout(limit)),
                },
                None => fetch.await.unwrap_or_else(|panic| Err(FetchError::from_panic(panic))),
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            outcome = bounded => outcome,
        };
        let duration = start.elapsed();

        match outcome {
            Ok(output) => {
                debug!(
                    worker_id = %self.id,
                    job_id = %job.id,
                    duration_ms = duration.as_millis(),
                    "Worker finished job"
                );
                JobResult {
                    job_id: job.id,
                    index,
                    worker_id: self.id,
                    status: JobStatus::Completed,
                    output: Some(output),
                    error: None,
                    duration,
                }
            }
            Err(error) => {
                warn!(
                    worker_id = %self.id,
                    job_id = %job.id,
                    code = error.code(),
                    error = %error,
                    duration_ms = duration.as_millis(),
                    "Job failed"
                );
                let status = match error {
                    FetchError::Timeout(_) => JobStatus::TimedOut,
                    FetchError::Cancelled => JobStatus::Cancelled,
                    _ => JobStatus::Failed,
                };
                JobResult {
                    job_id: job.id,
                    index,
                    worker_id: self.id,
                    status,
                    output: None,
                    error: Some(error),
                    duration,
                }
            }
        }
    }

    /// Record a job as cancelled without touching the provider
    pub fn skip(&self, job: IndexedJob<F::Input>) -> JobResult<F::Output> {
        debug!(worker_id = %self.id, job_id = %job.job.id, "Skipping job after cancellation");
        JobResult {
            job_id: job.job.id,
            index: job.index,
            worker_id: self.id,
            status: JobStatus::Cancelled,
            output: None,
            error: Some(FetchError::Cancelled),
            duration: Duration::ZERO,
        }
    }
}
