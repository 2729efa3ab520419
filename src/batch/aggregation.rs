//! Batch outcomes and summaries.
//!
//! [`BatchOutcome`] holds every result of one run; [`BatchSummary`] is its
//! serializable digest.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::{DistributionStrategy, JobResult, JobStatus, WorkerId};
use crate::Result;

/// The complete result set of one batch run
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    /// Identifier of this run, also attached to its log span
    pub batch_id: Uuid,
    /// Strategy used to distribute jobs
    pub strategy: DistributionStrategy,
    /// Number of workers launched
    pub concurrency: usize,
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the run
    pub finished_at: DateTime<Utc>,
    /// Time between start and the last collected result
    pub elapsed: Duration,
    /// One result per submitted job, in arrival order
    pub results: Vec<JobResult<T>>,
}

impl<T> BatchOutcome<T> {
    /// Number of results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the outcome holds no results
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Successful results
    pub fn successes(&self) -> impl Iterator<Item = &JobResult<T>> {
        self.results.iter().filter(|r| r.is_success())
    }

    /// Results that did not succeed, whatever the reason
    pub fn failures(&self) -> impl Iterator<Item = &JobResult<T>> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Whether every job succeeded
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.is_success())
    }

    /// First result for the job keyed `job_id`
    pub fn get(&self, job_id: &str) -> Option<&JobResult<T>> {
        self.results.iter().find(|r| r.job_id == job_id)
    }

    /// Reorder results to match job submission order
    pub fn sort_by_submission(&mut self) {
        self.results.sort_by_key(|r| r.index);
    }

    /// Results in job submission order
    pub fn into_ordered(mut self) -> Vec<JobResult<T>> {
        self.sort_by_submission();
        self.results
    }

    /// Number of jobs handled by each worker that handled at least one
    pub fn jobs_per_worker(&self) -> BTreeMap<WorkerId, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.worker_id).or_insert(0) += 1;
        }
        counts
    }

    /// Total time each worker spent executing jobs
    pub fn busy_time_per_worker(&self) -> BTreeMap<WorkerId, Duration> {
        let mut busy = BTreeMap::new();
        for result in &self.results {
            *busy.entry(result.worker_id).or_insert(Duration::ZERO) += result.duration;
        }
        busy
    }

    /// Serializable summary of the run
    pub fn summary(&self) -> BatchSummary {
        let mut status_counts: HashMap<JobStatus, usize> = HashMap::new();
        let mut error_counts = BTreeMap::new();

        for result in &self.results {
            *status_counts.entry(result.status).or_insert(0) += 1;
            if let Some(ref error) = result.error {
                *error_counts.entry(error.code().to_string()).or_insert(0) += 1;
            }
        }

        let count = |status: JobStatus| status_counts.get(&status).copied().unwrap_or(0);
        let completed = count(JobStatus::Completed);
        let total_jobs = self.results.len();

        BatchSummary {
            batch_id: self.batch_id,
            strategy: self.strategy,
            concurrency: self.concurrency,
            total_jobs,
            completed,
            failed: count(JobStatus::Failed),
            timed_out: count(JobStatus::TimedOut),
            cancelled: count(JobStatus::Cancelled),
            success_rate: if total_jobs > 0 {
                completed as f64 / total_jobs as f64 * 100.0
            } else {
                0.0
            },
            error_counts,
            jobs_per_worker: self
                .jobs_per_worker()
                .into_iter()
                .map(|(worker, jobs)| (worker.0, jobs))
                .collect(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }
}

/// Aggregated statistics of one batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Identifier of the run
    pub batch_id: Uuid,
    /// Strategy used to distribute jobs
    pub strategy: DistributionStrategy,
    /// Number of workers launched
    pub concurrency: usize,
    /// Number of submitted jobs
    pub total_jobs: usize,
    /// Jobs that succeeded
    pub completed: usize,
    /// Jobs that failed with a provider error
    pub failed: usize,
    /// Jobs that exceeded the per-job timeout
    pub timed_out: usize,
    /// Jobs abandoned or skipped after cancellation
    pub cancelled: usize,
    /// Percentage of completed jobs
    pub success_rate: f64,
    /// Failure counts keyed by error code
    pub error_counts: BTreeMap<String, u64>,
    /// Job counts keyed by worker number
    pub jobs_per_worker: BTreeMap<usize, usize>,
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the run
    pub finished_at: DateTime<Utc>,
    /// Run duration in milliseconds
    pub elapsed_ms: u64,
}

impl BatchSummary {
    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FetchError;
    use pretty_assertions::assert_eq;

    fn result(index: usize, worker: usize, error: Option<FetchError>) -> JobResult<u16> {
        let status = match error {
            None => JobStatus::Completed,
            Some(FetchError::Timeout(_)) => JobStatus::TimedOut,
            Some(FetchError::Cancelled) => JobStatus::Cancelled,
            Some(_) => JobStatus::Failed,
        };
        JobResult {
            job_id: format!("job_{}", index),
            index,
            worker_id: WorkerId(worker),
            status,
            output: if error.is_none() { Some(200) } else { None },
            error,
            duration: Duration::from_millis(10 * (index as u64 + 1)),
        }
    }

    fn outcome(results: Vec<JobResult<u16>>) -> BatchOutcome<u16> {
        let now = Utc::now();
        BatchOutcome {
            batch_id: Uuid::new_v4(),
            strategy: DistributionStrategy::SharedQueue,
            concurrency: 2,
            started_at: now,
            finished_at: now,
            elapsed: Duration::from_millis(42),
            results,
        }
    }

    #[test]
    fn test_ordering_and_lookup() {
        let outcome = outcome(vec![result(2, 1, None), result(0, 2, None), result(1, 1, None)]);
        assert_eq!(outcome.get("job_1").map(|r| r.index), Some(1));

        let ordered: Vec<usize> = outcome.into_ordered().iter().map(|r| r.index).collect();
        assert_eq!(ordered, vec![0, 1, 2]);
    }

    #[test]
    fn test_per_worker_tallies() {
        let outcome = outcome(vec![result(0, 1, None), result(1, 2, None), result(2, 1, None)]);

        let counts = outcome.jobs_per_worker();
        assert_eq!(counts.get(&WorkerId(1)), Some(&2));
        assert_eq!(counts.get(&WorkerId(2)), Some(&1));

        let busy = outcome.busy_time_per_worker();
        assert_eq!(busy.get(&WorkerId(1)), Some(&Duration::from_millis(40)));
        assert_eq!(busy.get(&WorkerId(2)), Some(&Duration::from_millis(20)));
    }

    #[test]
    fn test_summary_counts() {
        let outcome = outcome(vec![
            result(0, 1, None),
            result(1, 2, Some(FetchError::Status { code: 500 })),
            result(2, 1, Some(FetchError::Status { code: 502 })),
            result(3, 2, Some(FetchError::Timeout(Duration::from_secs(1)))),
        ]);
        assert!(!outcome.all_succeeded());
        assert_eq!(outcome.successes().count(), 1);
        assert_eq!(outcome.failures().count(), 3);

        let summary = outcome.summary();
        assert_eq!(summary.total_jobs, 4);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.cancelled, 0);
        assert_eq!(summary.success_rate, 25.0);
        assert_eq!(summary.error_counts.get("HTTP_STATUS"), Some(&2));
        assert_eq!(summary.error_counts.get("TIMEOUT"), Some(&1));
        assert_eq!(summary.elapsed_ms, 42);
    }

    #[test]
    fn test_summary_json() {
        let summary = outcome(vec![result(0, 1, None)]).summary();
        let json = summary.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["strategy"], "shared_queue");
        assert_eq!(value["completed"], 1);
        assert_eq!(value["jobs_per_worker"]["1"], 1);
    }
}
