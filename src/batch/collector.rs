//! Result fan-in.
//!
//! Every worker holds a clone of one [`ResultSender`]; a single [`Collector`]
//! drains the other end. The channel closes when the last sender is
//! dropped, which happens once every worker has exited, so the collector can
//! never wait on a result no worker will send.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::batch::{JobResult, ProgressCallback};
use crate::{Result, WorkpoolError};

/// Producer side of the result channel, one clone per worker
pub struct ResultSender<T> {
    tx: mpsc::Sender<JobResult<T>>,
}

impl<T> Clone for ResultSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> ResultSender<T> {
    /// Hand a result to the collector. Returns `false` if the consumer is gone.
    pub async fn deliver(&self, result: JobResult<T>) -> bool {
        self.tx.send(result).await.is_ok()
    }
}

/// Single consumer that gathers results until the batch is complete
pub struct Collector<T> {
    rx: mpsc::Receiver<JobResult<T>>,
    expected: usize,
    progress: Option<Arc<ProgressCallback>>,
}

impl<T> Collector<T> {
    /// Create a collector expecting `expected` results, with its sender.
    ///
    /// The channel holds every result of the batch, so workers never block
    /// on delivery.
    pub fn new(expected: usize) -> (Self, ResultSender<T>) {
        let (tx, rx) = mpsc::channel(expected.max(1));
        (
            Self { rx, expected, progress: None },
            ResultSender { tx },
        )
    }

    /// Report `(completed, total)` after every received result
    pub fn with_progress(mut self, progress: Option<Arc<ProgressCallback>>) -> Self {
        self.progress = progress;
        self
    }

    /// Number of results this collector waits for
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Drain results until every job has reported.
    ///
    /// Fails if the channel closes early or a job reports twice.
    pub async fn collect(mut self) -> Result<Vec<JobResult<T>>> {
        let mut results = Vec::with_capacity(self.expected);
        let mut seen = vec![false; self.expected];

        while results.len() < self.expected {
            let Some(result) = self.rx.recv().await else {
                error!(
                    expected = self.expected,
                    received = results.len(),
                    "Result channel closed before batch completed"
                );
                return Err(WorkpoolError::Collection {
                    expected: self.expected,
                    received: results.len(),
                });
            };

            match seen.get_mut(result.index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    error!(job_id = %result.job_id, index = result.index, "Unexpected or repeated result");
                    return Err(WorkpoolError::DuplicateResult(result.job_id));
                }
            }

            results.push(result);
            if let Some(ref callback) = self.progress {
                callback(results.len(), self.expected);
            }
        }

        debug!(received = results.len(), "Collected all results");
        Ok(results)
    }

    /// Turn the collector into a stream yielding results as they arrive
    pub fn into_stream(self) -> ResultStream<T> {
        ResultStream {
            inner: ReceiverStream::new(self.rx),
            expected: self.expected,
            received: 0,
        }
    }
}

/// Results of a batch in arrival order.
///
/// The stream ends once every worker has exited.
pub struct ResultStream<T> {
    inner: ReceiverStream<JobResult<T>>,
    expected: usize,
    received: usize,
}

impl<T> ResultStream<T> {
    /// Number of results the batch will produce
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Number of results yielded so far
    pub fn received(&self) -> usize {
        self.received
    }
}

impl<T> Stream for ResultStream<T> {
    type Item = JobResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(_)) = &polled {
            this.received += 1;
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.expected.saturating_sub(self.received);
        (0, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{JobStatus, WorkerId};
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::time::Duration;

    fn result(index: usize) -> JobResult<()> {
        JobResult {
            job_id: format!("job_{}", index),
            index,
            worker_id: WorkerId(1),
            status: JobStatus::Completed,
            output: Some(()),
            error: None,
            duration: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_collects_from_many_producers() {
        let (collector, sender) = Collector::new(12);

        for worker in 0..3 {
            let sender = sender.clone();
            tokio::spawn(async move {
                for i in 0..4 {
                    assert!(sender.deliver(result(worker * 4 + i)).await);
                }
            });
        }
        drop(sender);

        let results = collector.collect().await.unwrap();
        assert_eq!(results.len(), 12);
    }

    #[tokio::test]
    async fn test_early_close_is_an_error() {
        let (collector, sender) = Collector::new(3);
        sender.deliver(result(0)).await;
        drop(sender);

        match collector.collect().await {
            Err(WorkpoolError::Collection { expected, received }) => {
                assert_eq!(expected, 3);
                assert_eq!(received, 1);
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.len())),
        }
    }

    #[tokio::test]
    async fn test_duplicate_result_is_an_error() {
        let (collector, sender) = Collector::new(2);
        sender.deliver(result(0)).await;
        sender.deliver(result(0)).await;

        assert!(matches!(
            collector.collect().await,
            Err(WorkpoolError::DuplicateResult(id)) if id == "job_0"
        ));
    }

    #[tokio::test]
    async fn test_progress_reports_every_result() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&updates);
        let callback: ProgressCallback = Box::new(move |done, total| {
            recorded.lock().unwrap().push((done, total));
        });

        let (collector, sender) = Collector::new(3);
        let collector = collector.with_progress(Some(Arc::new(callback)));
        for i in 0..3 {
            sender.deliver(result(i)).await;
        }

        collector.collect().await.unwrap();
        assert_eq!(*updates.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_stream_ends_when_senders_drop() {
        let (collector, sender) = Collector::new(2);
        let mut stream = collector.into_stream();

        sender.deliver(result(1)).await;
        sender.deliver(result(0)).await;
        drop(sender);

        assert_eq!(stream.next().await.map(|r| r.index), Some(1));
        assert_eq!(stream.next().await.map(|r| r.index), Some(0));
        assert!(stream.next().await.is_none());
        assert_eq!(stream.received(), 2);
    }
}
