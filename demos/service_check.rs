//! Service health check example
//!
//! Checks a list of services with a small worker pool, once per distribution
//! strategy, and prints each batch summary as JSON.
//!
//! Run with: cargo run --example service_check --features http

use std::sync::Arc;
use std::time::Duration;
use workpool::batch::{BatchConfig, BatchProcessor, DistributionStrategy, Job};
use workpool::http::HttpFetcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("workpool=info")),
        )
        .init();

    let services = ["https://youtube.com", "https://facebook.com", "https://react.dev"];
    let fetcher = Arc::new(HttpFetcher::with_timeout(Duration::from_secs(10))?);

    for strategy in [DistributionStrategy::SharedQueue, DistributionStrategy::StaticPartition] {
        let processor = BatchProcessor::from_shared(Arc::clone(&fetcher), BatchConfig::default())
            .with_strategy(strategy);
        let jobs = services.iter().map(|s| Job::keyed(*s)).collect();

        let outcome = processor.run(jobs, 2).await?;
        for result in outcome.results.iter() {
            match &result.error {
                None => println!(
                    "[{}] {} ok ({} bytes)",
                    result.worker_id,
                    result.job_id,
                    result.output.as_ref().map(|r| r.body.len()).unwrap_or(0)
                ),
                Some(error) => println!("[{}] {} failed: {}", result.worker_id, result.job_id, error),
            }
        }

        println!("{}", outcome.summary().to_json()?);
    }

    Ok(())
}
