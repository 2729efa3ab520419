//! Batch Processor
//!
//! Orchestrates one batch run:
//! - Validation of the job set and concurrency level
//! - Job distribution through a [`Dispatcher`]
//! - Exactly `concurrency` worker tasks
//! - Result fan-in through a [`Collector`]
//! - Summary logging and optional metrics
//!
//! Per-job failures are data on the returned results. `run` only fails on
//! misconfiguration, before any worker is launched.

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::batch::{
    BatchConfig, BatchOutcome, Collector, Dispatch, Dispatcher, DistributionStrategy, Fetcher,
    IndexedJob, Job, JobSource, ProgressCallback, ResultSender, ResultStream, Worker, WorkerId,
};
use crate::metrics::BatchMetrics;
use crate::{Result, WorkpoolError};

/// Bounded concurrent batch processor
pub struct BatchProcessor<F: Fetcher> {
    /// Provider shared by every worker
    fetcher: Arc<F>,
    /// Strategy, default concurrency and per-job timeout
    config: BatchConfig,
    /// Progress callback
    progress_callback: Option<Arc<ProgressCallback>>,
    /// Cancellation signal observed by workers and the dispatcher
    cancel: CancellationToken,
    /// Optional metrics sink
    metrics: Option<BatchMetrics>,
}

impl<F: Fetcher> BatchProcessor<F> {
    /// Create a processor with default settings
    pub fn new(fetcher: F) -> Self {
        Self::from_config(fetcher, BatchConfig::default())
    }

    /// Create a processor from a configuration
    pub fn from_config(fetcher: F, config: BatchConfig) -> Self {
        Self::from_shared(Arc::new(fetcher), config)
    }

    /// Create a processor around a fetcher shared with other owners
    pub fn from_shared(fetcher: Arc<F>, config: BatchConfig) -> Self {
        Self {
            fetcher,
            config,
            progress_callback: None,
            cancel: CancellationToken::new(),
            metrics: None,
        }
    }

    /// Set the distribution strategy
    pub fn with_strategy(mut self, strategy: DistributionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the number of workers used by [`execute_batch`](Self::execute_batch)
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    /// Set timeout for individual jobs
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.job_timeout = Some(timeout);
        self
    }

    /// Set progress callback, called with `(completed, total)`
    pub fn with_progress_callback<C>(mut self, callback: C) -> Self
    where
        C: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Use `token` to cancel running batches
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Record job and batch metrics
    pub fn with_metrics(mut self, metrics: BatchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current configuration
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Token that cancels this processor's batches when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute a batch with the configured concurrency limit
    pub async fn execute_batch(&self, jobs: Vec<Job<F::Input>>) -> Result<BatchOutcome<F::Output>> {
        self.run(jobs, self.config.concurrency_limit).await
    }

    /// Execute `jobs` across exactly `concurrency` workers.
    ///
    /// Returns one result per job once every job has reported.
    #[instrument(
        skip(self, jobs),
        fields(job_count = jobs.len(), strategy = %self.config.strategy, batch_id = tracing::field::Empty)
    )]
    pub async fn run(
        &self,
        jobs: Vec<Job<F::Input>>,
        concurrency: usize,
    ) -> Result<BatchOutcome<F::Output>> {
        self.validate(&jobs, concurrency)?;

        let batch_id = Uuid::new_v4();
        tracing::Span::current().record("batch_id", tracing::field::display(batch_id));
        let started_at = Utc::now();
        let start = Instant::now();
        let total_jobs = jobs.len();

        info!(
            total_jobs = total_jobs,
            concurrency = concurrency,
            timeout = ?self.config.job_timeout,
            "Starting batch execution"
        );

        let (collector, sender) = Collector::new(total_jobs);
        let collector = collector.with_progress(self.progress_callback.clone());
        let handles = self.launch(jobs, concurrency, sender)?;

        let results = match collector.collect().await {
            Ok(results) => results,
            Err(e) => {
                for handle in &handles {
                    handle.abort();
                }
                return Err(e);
            }
        };
        Self::join_workers(handles).await?;

        let elapsed = start.elapsed();
        let outcome = BatchOutcome {
            batch_id,
            strategy: self.config.strategy,
            concurrency,
            started_at,
            finished_at: Utc::now(),
            elapsed,
            results,
        };

        if let Some(ref metrics) = self.metrics {
            metrics.record_batch(self.config.strategy);
        }
        Self::log_summary(&outcome);

        Ok(outcome)
    }

    /// Execute `jobs` and yield each result as soon as it arrives.
    ///
    /// The stream ends after the last result. Validation is the same as for
    /// [`run`](Self::run). Workers are joined in the background and the batch
    /// is recorded in metrics once they have all exited.
    #[instrument(
        skip(self, jobs),
        fields(job_count = jobs.len(), strategy = %self.config.strategy, batch_id = tracing::field::Empty)
    )]
    pub async fn run_stream(
        &self,
        jobs: Vec<Job<F::Input>>,
        concurrency: usize,
    ) -> Result<ResultStream<F::Output>> {
        self.validate(&jobs, concurrency)?;

        let batch_id = Uuid::new_v4();
        tracing::Span::current().record("batch_id", tracing::field::display(batch_id));
        info!(concurrency = concurrency, "Starting streaming batch execution");

        let (collector, sender) = Collector::new(jobs.len());
        let handles = self.launch(jobs, concurrency, sender)?;

        let metrics = self.metrics.clone();
        let strategy = self.config.strategy;
        tokio::spawn(
            async move {
                if let Err(e) = Self::join_workers(handles).await {
                    warn!(error = %e, "Streaming batch worker failed");
                }
                if let Some(metrics) = metrics {
                    metrics.record_batch(strategy);
                }
                debug!("Streaming batch workers finished");
            }
            .in_current_span(),
        );

        Ok(collector.into_stream())
    }

    fn validate(&self, jobs: &[Job<F::Input>], concurrency: usize) -> Result<()> {
        if concurrency == 0 {
            return Err(WorkpoolError::InvalidConcurrency(concurrency));
        }
        if jobs.is_empty() {
            return Err(WorkpoolError::EmptyBatch);
        }
        if self.config.job_timeout == Some(Duration::ZERO) {
            return Err(WorkpoolError::Config("job_timeout must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Distribute jobs and spawn one task per worker.
    ///
    /// `sender` is consumed here, so once this returns only the workers hold
    /// the producer side of the result channel.
    fn launch(
        &self,
        jobs: Vec<Job<F::Input>>,
        concurrency: usize,
        sender: ResultSender<F::Output>,
    ) -> Result<Vec<JoinHandle<usize>>> {
        let indexed = jobs
            .into_iter()
            .enumerate()
            .map(|(index, job)| IndexedJob { index, job })
            .collect();
        let sources = Dispatcher::new(self.config.strategy).assign(indexed, concurrency)?;

        let handles = sources
            .into_iter()
            .enumerate()
            .map(|(i, source)| {
                let worker = Worker::new(WorkerId(i + 1), Arc::clone(&self.fetcher))
                    .with_timeout(self.config.job_timeout)
                    .with_cancellation(self.cancel.clone());
                tokio::spawn(worker_loop(
                    worker,
                    source,
                    sender.clone(),
                    self.cancel.clone(),
                    self.metrics.clone(),
                    self.config.strategy,
                ))
            })
            .collect();

        debug!(workers = concurrency, "Launched workers");
        Ok(handles)
    }

    async fn join_workers(handles: Vec<JoinHandle<usize>>) -> Result<()> {
        for handle in handles {
            handle.await?;
        }
        Ok(())
    }

    fn log_summary(outcome: &BatchOutcome<F::Output>) {
        let summary = outcome.summary();

        info!(
            batch_id = %summary.batch_id,
            total_jobs = summary.total_jobs,
            completed = summary.completed,
            failed = summary.failed,
            timed_out = summary.timed_out,
            cancelled = summary.cancelled,
            success_rate = format!("{:.2}%", summary.success_rate),
            batch_duration_ms = summary.elapsed_ms,
            "Batch execution completed"
        );

        if summary.success_rate < 80.0 && summary.total_jobs > 5 {
            warn!(
                success_rate = format!("{:.2}%", summary.success_rate),
                failed = summary.failed,
                timed_out = summary.timed_out,
                "High failure rate detected in batch execution"
            );
        }
    }
}

/// Pull jobs from `source` until it is exhausted, delivering every result.
async fn worker_loop<F: Fetcher>(
    worker: Worker<F>,
    mut source: JobSource<F::Input>,
    results: ResultSender<F::Output>,
    cancel: CancellationToken,
    metrics: Option<BatchMetrics>,
    strategy: DistributionStrategy,
) -> usize {
    debug!(worker_id = %worker.id(), "Worker started");
    let mut processed = 0;

    while let Some(dispatch) = source.next(&cancel).await {
        let result = match dispatch {
            Dispatch::Run(job) => worker.execute(job).await,
            Dispatch::Skip(job) => worker.skip(job),
        };
        if let Some(ref metrics) = metrics {
            metrics.record_job(strategy, &result);
        }
        processed += 1;

        if !results.deliver(result).await {
            warn!(worker_id = %worker.id(), "Result consumer dropped, stopping worker");
            break;
        }
    }

    debug!(worker_id = %worker.id(), processed = processed, "Worker stopped");
    processed
}
