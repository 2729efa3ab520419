//! Streaming variant: results are observable before the batch finishes.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Notify;
use workpool::batch::{BatchProcessor, FetchError, Fetcher, Job, JobStatus};
use workpool::WorkpoolError;

/// Completes immediately, except for "slow" which waits for a release signal
struct Gated {
    release: Arc<Notify>,
}

#[async_trait]
impl Fetcher for Gated {
    type Input = String;
    type Output = String;

    async fn fetch(&self, key: &String) -> Result<String, FetchError> {
        if key == "slow" {
            self.release.notified().await;
        }
        Ok(key.to_uppercase())
    }
}

#[tokio::test]
async fn test_results_arrive_before_batch_completes() {
    let release = Arc::new(Notify::new());
    let processor = BatchProcessor::new(Gated { release: Arc::clone(&release) });
    let jobs = vec![Job::keyed("a"), Job::keyed("slow"), Job::keyed("b"), Job::keyed("c")];

    let mut stream = processor.run_stream(jobs, 2).await.expect("stream should start");
    assert_eq!(stream.expected(), 4);

    // Three results are available while "slow" is still blocked.
    let mut early = Vec::new();
    for _ in 0..3 {
        let result = stream.next().await.expect("result should arrive");
        early.push(result.job_id);
    }
    early.sort();
    assert_eq!(early, vec!["a", "b", "c"]);

    release.notify_one();
    let last = stream.next().await.expect("slow result should arrive");
    assert_eq!(last.job_id, "slow");
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.output.as_deref(), Some("SLOW"));

    assert!(stream.next().await.is_none(), "stream should end after the last result");
    assert_eq!(stream.received(), 4);
}

#[tokio::test]
async fn test_stream_validation() {
    let processor = BatchProcessor::new(Gated { release: Arc::new(Notify::new()) });

    assert!(matches!(
        processor.run_stream(vec![Job::keyed("a")], 0).await,
        Err(WorkpoolError::InvalidConcurrency(0))
    ));
    assert!(matches!(
        processor.run_stream(Vec::new(), 2).await,
        Err(WorkpoolError::EmptyBatch)
    ));
}
