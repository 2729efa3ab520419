//! # workpool
//!
//! A bounded concurrent batch processor for independent, I/O-bound jobs.
//!
//! ## Overview
//!
//! A batch is a finite set of [`batch::Job`]s executed across a fixed pool of
//! concurrent workers. Every job produces exactly one [`batch::JobResult`],
//! including jobs whose I/O failed, so a single failure never aborts the
//! batch or corrupts unrelated results.
//!
//! Jobs are handed to workers by one of two distribution strategies:
//!
//! - **Static partition**: each worker owns a contiguous, disjoint slice of
//!   the job list, with the remainder spread over the first workers.
//! - **Shared queue**: workers pull from one closed FIFO queue until it is
//!   drained, so an idle worker always picks up the next job.
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use workpool::batch::{BatchProcessor, DistributionStrategy, FetchError, Fetcher, Job};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Fetcher for Echo {
//!     type Input = String;
//!     type Output = usize;
//!
//!     async fn fetch(&self, input: &String) -> Result<usize, FetchError> {
//!         Ok(input.len())
//!     }
//! }
//!
//! # async fn example() -> workpool::Result<()> {
//! let processor = BatchProcessor::new(Echo).with_strategy(DistributionStrategy::SharedQueue);
//! let jobs = vec![Job::keyed("https://a.example"), Job::keyed("https://b.example")];
//!
//! let outcome = processor.run(jobs, 2).await?;
//! assert_eq!(outcome.len(), 2);
//! assert!(outcome.all_succeeded());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`batch`]: jobs, workers, dispatch strategies, result collection
//! - [`metrics`]: Prometheus metrics scoped to a processor
//! - `http`: a generic HTTP GET provider (feature `http`)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for workpool operations
pub type Result<T> = std::result::Result<T, WorkpoolError>;

/// Batch-level error type.
///
/// Per-job failures never surface here; they are recorded on the job's
/// [`batch::JobResult`] as a [`batch::FetchError`].
#[derive(Error, Debug)]
pub enum WorkpoolError {
    /// Concurrency level must be at least one
    #[error("Invalid concurrency level: {0} (must be at least 1)")]
    InvalidConcurrency(usize),

    /// A batch must contain at least one job
    #[error("Batch contains no jobs")]
    EmptyBatch,

    /// Jobs could not be handed to workers
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// The collector observed a closed result channel before every job reported
    #[error("Result collection incomplete: expected {expected}, received {received}")]
    Collection {
        /// Number of results the batch must produce
        expected: usize,
        /// Number of results actually received
        received: usize,
    },

    /// A job reported more than once, or a result named no submitted job
    #[error("Unexpected or repeated result for job: {0}")]
    DuplicateResult(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Join error from worker tasks
    #[error("Async join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Batch processing: jobs, workers, dispatch and collection
pub mod batch;

/// Metrics collection
pub mod metrics;

/// HTTP GET provider
#[cfg(feature = "http")]
pub mod http;
