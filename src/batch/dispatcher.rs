//! Job distribution across workers.
//!
//! [`Dispatcher::assign`] turns a batch into exactly one [`JobSource`] per
//! worker. Sources are fully populated before they are returned: a static
//! partition is a fixed slice, and the shared queue is filled and closed
//! before any worker can pull from it. Exhaustion is therefore observable by
//! every worker as `None` from [`JobSource::next`].

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::batch::{DistributionStrategy, IndexedJob};
use crate::{Result, WorkpoolError};

/// Sizes of `workers` contiguous slices covering `jobs` items.
///
/// The first `jobs % workers` slices get one extra item, so nothing is
/// dropped when the division is uneven.
pub fn partition_sizes(jobs: usize, workers: usize) -> Vec<usize> {
    if workers == 0 {
        return Vec::new();
    }
    let base = jobs / workers;
    let extra = jobs % workers;
    (0..workers).map(|i| base + usize::from(i < extra)).collect()
}

/// What a worker should do with the next job
#[derive(Debug)]
pub enum Dispatch<I> {
    /// Execute the job
    Run(IndexedJob<I>),
    /// The batch was cancelled; record the job without executing it
    Skip(IndexedJob<I>),
}

enum Source<I> {
    Partition(std::vec::IntoIter<IndexedJob<I>>),
    Queue(Arc<Mutex<mpsc::Receiver<IndexedJob<I>>>>),
}

/// The stream of jobs owned by one worker
pub struct JobSource<I> {
    source: Source<I>,
}

impl<I> JobSource<I> {
    fn partition(jobs: Vec<IndexedJob<I>>) -> Self {
        Self { source: Source::Partition(jobs.into_iter()) }
    }

    fn queue(rx: Arc<Mutex<mpsc::Receiver<IndexedJob<I>>>>) -> Self {
        Self { source: Source::Queue(rx) }
    }

    /// Next job for this worker, or `None` once the partition is exhausted
    /// or the shared queue is empty and closed.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Option<Dispatch<I>> {
        let job = match &mut self.source {
            Source::Partition(jobs) => jobs.next(),
            // The lock is only held while taking one already-buffered job.
            Source::Queue(rx) => rx.lock().await.recv().await,
        }?;

        if cancel.is_cancelled() {
            Some(Dispatch::Skip(job))
        } else {
            Some(Dispatch::Run(job))
        }
    }
}

/// Assigns jobs to workers according to a [`DistributionStrategy`]
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    strategy: DistributionStrategy,
}

impl Dispatcher {
    /// Create a dispatcher for `strategy`
    pub fn new(strategy: DistributionStrategy) -> Self {
        Self { strategy }
    }

    /// Build one fully populated source per worker
    pub fn assign<I>(&self, jobs: Vec<IndexedJob<I>>, workers: usize) -> Result<Vec<JobSource<I>>> {
        if workers == 0 {
            return Err(WorkpoolError::InvalidConcurrency(workers));
        }

        match self.strategy {
            DistributionStrategy::StaticPartition => {
                let sizes = partition_sizes(jobs.len(), workers);
                debug!(?sizes, "Partitioned jobs across workers");
                let mut jobs = jobs.into_iter();
                Ok(sizes
                    .into_iter()
                    .map(|size| JobSource::partition(jobs.by_ref().take(size).collect()))
                    .collect())
            }
            DistributionStrategy::SharedQueue => {
                let (tx, rx) = mpsc::channel(jobs.len().max(1));
                let queued = jobs.len();
                for job in jobs {
                    tx.try_send(job).map_err(|e| {
                        WorkpoolError::Dispatch(format!("job queue rejected a job: {}", e))
                    })?;
                }
                // Closing the queue is the "no more jobs" signal.
                drop(tx);
                debug!(queued, workers, "Filled and closed shared job queue");

                let rx = Arc::new(Mutex::new(rx));
                Ok((0..workers).map(|_| JobSource::queue(Arc::clone(&rx))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Job;
    use std::collections::HashSet;

    fn indexed(count: usize) -> Vec<IndexedJob<usize>> {
        (0..count)
            .map(|i| IndexedJob { index: i, job: Job::new(format!("job_{}", i), i) })
            .collect()
    }

    async fn drain(source: &mut JobSource<usize>) -> Vec<usize> {
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();
        while let Some(dispatch) = source.next(&cancel).await {
            match dispatch {
                Dispatch::Run(job) => seen.push(job.index),
                Dispatch::Skip(_) => panic!("nothing was cancelled"),
            }
        }
        seen
    }

    #[test]
    fn test_partition_sizes_distributes_remainder() {
        assert_eq!(partition_sizes(10, 3), vec![4, 3, 3]);
        assert_eq!(partition_sizes(11, 3), vec![4, 4, 3]);
        assert_eq!(partition_sizes(9, 3), vec![3, 3, 3]);
        assert_eq!(partition_sizes(2, 4), vec![1, 1, 0, 0]);
        assert!(partition_sizes(5, 0).is_empty());
    }

    #[tokio::test]
    async fn test_static_partition_is_contiguous_and_disjoint() {
        let dispatcher = Dispatcher::new(DistributionStrategy::StaticPartition);
        let mut sources = dispatcher.assign(indexed(10), 3).unwrap();
        assert_eq!(sources.len(), 3);

        let mut slices = Vec::new();
        for source in &mut sources {
            slices.push(drain(source).await);
        }

        assert_eq!(slices[0], vec![0, 1, 2, 3]);
        assert_eq!(slices[1], vec![4, 5, 6]);
        assert_eq!(slices[2], vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_shared_queue_hands_out_each_job_once() {
        let dispatcher = Dispatcher::new(DistributionStrategy::SharedQueue);
        let sources = dispatcher.assign(indexed(25), 4).unwrap();

        let handles: Vec<_> = sources
            .into_iter()
            .map(|mut source| tokio::spawn(async move { drain(&mut source).await }))
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        assert_eq!(all.len(), 25);
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), 25);
    }

    #[tokio::test]
    async fn test_shared_queue_is_fifo() {
        let dispatcher = Dispatcher::new(DistributionStrategy::SharedQueue);
        let mut sources = dispatcher.assign(indexed(5), 1).unwrap();
        assert_eq!(drain(&mut sources[0]).await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cancelled_sources_skip_remaining_jobs() {
        let dispatcher = Dispatcher::new(DistributionStrategy::SharedQueue);
        let mut sources = dispatcher.assign(indexed(3), 1).unwrap();
        let cancel = CancellationToken::new();

        assert!(matches!(sources[0].next(&cancel).await, Some(Dispatch::Run(_))));
        cancel.cancel();
        assert!(matches!(sources[0].next(&cancel).await, Some(Dispatch::Skip(_))));
        assert!(matches!(sources[0].next(&cancel).await, Some(Dispatch::Skip(_))));
        assert!(sources[0].next(&cancel).await.is_none());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dispatcher = Dispatcher::new(DistributionStrategy::StaticPartition);
        assert!(matches!(
            dispatcher.assign(indexed(3), 0),
            Err(WorkpoolError::InvalidConcurrency(0))
        ));
    }
}
