use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::batch::FetchError;
use crate::{Result, WorkpoolError};

/// A single unit of work in a batch.
///
/// Keys may repeat within a batch (the same URL fetched several times); a
/// job's identity is its submission index, carried on [`IndexedJob`] and
/// [`JobResult::index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<I> {
    /// Key naming this job in results and logs
    pub id: String,
    /// Data handed to the fetcher
    pub input: I,
}

impl<I> Job<I> {
    /// Create a job with an explicit identifier
    pub fn new(id: impl Into<String>, input: I) -> Self {
        Self { id: id.into(), input }
    }
}

impl Job<String> {
    /// Create a job whose key is both its identifier and its input (e.g. a URL)
    pub fn keyed(key: impl Into<String>) -> Self {
        let key = key.into();
        Self { id: key.clone(), input: key }
    }
}

/// A job tagged with its position in the submitted batch
#[derive(Debug, Clone)]
pub struct IndexedJob<I> {
    /// Submission position, 0-based
    pub index: usize,
    /// The job itself
    pub job: Job<I>,
}

/// Stable 1-based identity of a worker within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Final status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
    /// Job exceeded the per-job timeout
    TimedOut,
    /// Job was skipped or abandoned after cancellation
    Cancelled,
}

impl JobStatus {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// Outcome of executing exactly one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult<T> {
    /// Identifier of the originating job
    pub job_id: String,
    /// Submission position of the originating job
    pub index: usize,
    /// Worker that produced this result
    pub worker_id: WorkerId,
    /// Final status
    pub status: JobStatus,
    /// Fetched payload (if successful)
    pub output: Option<T>,
    /// Error (if not successful)
    pub error: Option<FetchError>,
    /// Time spent on the job
    pub duration: Duration,
}

impl<T> JobResult<T> {
    /// Whether the job succeeded
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// How jobs are handed out to workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStrategy {
    /// Each worker owns a contiguous, disjoint slice of the jobs
    StaticPartition,
    /// Workers pull from one shared FIFO queue until it is drained
    #[default]
    SharedQueue,
}

impl DistributionStrategy {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionStrategy::StaticPartition => "static_partition",
            DistributionStrategy::SharedQueue => "shared_queue",
        }
    }
}

impl fmt::Display for DistributionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of workers used by `execute_batch`
    pub concurrency_limit: usize,
    /// Job distribution strategy
    pub strategy: DistributionStrategy,
    /// Upper bound on a single job's I/O
    pub job_timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: num_cpus::get(),
            strategy: DistributionStrategy::default(),
            job_timeout: None,
        }
    }
}

impl BatchConfig {
    /// Check the configuration for values that can never run
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(WorkpoolError::InvalidConcurrency(0));
        }
        if self.job_timeout == Some(Duration::ZERO) {
            return Err(WorkpoolError::Config("job_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Progress callback type, called with `(completed, total)`
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;
