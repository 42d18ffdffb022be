//! Crawler module for racing candidate URLs
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with header templating and user-agent rotation
//! - A single-candidate retry state machine with jittered backoff
//! - Group racing with first-success cancellation
//! - Batch aggregation under a process-wide concurrency limit
//! - The batch loop tying a source and a sink together

mod batch;
mod fetcher;
mod group;
mod limiter;
mod retry;

pub use batch::BatchRunner;
pub use fetcher::{
    build_http_client, classify_status, fetch_once, FetchError, FetchedPage, RequestTemplate,
    StatusClass, ACCEPTED_STATUSES, RETRYABLE_STATUSES,
};
pub use group::GroupScheduler;
pub use limiter::{ConcurrencyLimiter, LimiterClosed, Slot};
pub use retry::{RetryEngine, RetryPolicy};

use crate::config::Config;
use crate::output::{ResultSink, RunStatistics};
use crate::source::BatchSource;
use crate::HarvestError;

/// Runs a complete harvest
///
/// This is the main entry point for a run. It will:
/// 1. Build the HTTP client, limiter and extractor from configuration
/// 2. Pull batches from the source until it is exhausted
/// 3. Resolve every group of a batch before touching the next one
/// 4. Hand each finished batch to the sink
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `source` - Where candidate groups come from
/// * `sink` - Where batch results go
///
/// # Returns
///
/// * `Ok(RunStatistics)` - Totals over every processed batch
/// * `Err(HarvestError)` - Setup failed, or the source or sink failed
pub async fn harvest(
    config: &Config,
    source: &mut dyn BatchSource,
    sink: &mut dyn ResultSink,
) -> Result<RunStatistics, HarvestError> {
    let runner = BatchRunner::from_config(config)?;
    run_batches(&runner, source, sink).await
}

/// Drives an already-built runner over every batch of `source`
pub async fn run_batches(
    runner: &BatchRunner,
    source: &mut dyn BatchSource,
    sink: &mut dyn ResultSink,
) -> Result<RunStatistics, HarvestError> {
    let mut stats = RunStatistics::new();
    let mut batch_number = 0;

    loop {
        if runner.is_shut_down() {
            tracing::warn!("Runner shut down, not reading further batches");
            break;
        }

        let Some(groups) = source.next_batch()? else {
            break;
        };
        batch_number += 1;
        tracing::info!("Processing batch {} ({} groups)", batch_number, groups.len());

        let result = runner.run(groups).await;
        let summary = sink.persist(batch_number, &result)?;

        tracing::debug!(
            batch = batch_number,
            successes = summary.successes,
            failures = summary.failures,
            peak_in_flight = runner.limiter().peak(),
            "Batch persisted"
        );

        stats.record_batch(&result);
    }

    if batch_number == 0 {
        tracing::warn!("Input produced no batches");
    }

    tracing::info!(
        "Harvest complete: {} batches, {} groups resolved, {} failed",
        stats.batches,
        stats.groups_resolved,
        stats.groups_failed
    );

    Ok(stats)
}
