//! Prometheus metrics for batch execution.
//!
//! Each [`BatchMetrics`] owns its own [`Registry`], so processors never touch
//! process-wide state. Clones share the same underlying collectors.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::batch::{DistributionStrategy, JobResult};
use crate::Result;

/// Metrics collector for one or more batch processors
#[derive(Clone)]
pub struct BatchMetrics {
    registry: Registry,
    jobs_total: IntCounterVec,
    job_duration: HistogramVec,
    batches_total: IntCounterVec,
}

impl std::fmt::Debug for BatchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchMetrics").finish_non_exhaustive()
    }
}

impl BatchMetrics {
    /// Create metrics registered in a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create metrics registered in `registry`
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let jobs_total = IntCounterVec::new(
            Opts::new("workpool_jobs_total", "Total number of executed jobs by final status"),
            &["status"],
        )?;
        let job_duration = HistogramVec::new(
            HistogramOpts::new("workpool_job_duration_seconds", "Job execution duration in seconds")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["strategy"],
        )?;
        let batches_total = IntCounterVec::new(
            Opts::new("workpool_batches_total", "Total number of completed batches"),
            &["strategy"],
        )?;

        registry.register(Box::new(jobs_total.clone()))?;
        registry.register(Box::new(job_duration.clone()))?;
        registry.register(Box::new(batches_total.clone()))?;

        Ok(Self {
            registry,
            jobs_total,
            job_duration,
            batches_total,
        })
    }

    /// Record one job result
    pub fn record_job<T>(&self, strategy: DistributionStrategy, result: &JobResult<T>) {
        self.jobs_total.with_label_values(&[result.status.as_str()]).inc();
        self.job_duration
            .with_label_values(&[strategy.as_str()])
            .observe(result.duration.as_secs_f64());
    }

    /// Record a completed batch
    pub fn record_batch(&self, strategy: DistributionStrategy) {
        self.batches_total.with_label_values(&[strategy.as_str()]).inc();
    }

    /// Number of recorded jobs with `status`
    pub fn jobs_with_status(&self, status: &str) -> u64 {
        self.jobs_total.with_label_values(&[status]).get()
    }

    /// Number of recorded batches run with `strategy`
    pub fn batches_with_strategy(&self, strategy: DistributionStrategy) -> u64 {
        self.batches_total.with_label_values(&[strategy.as_str()]).get()
    }

    /// Underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
