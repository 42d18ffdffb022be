//! Batch runner
//!
//! Drives every group of a batch to completion and aggregates the results.
//! A batch is done only when each group has its `GroupResult`; there is no
//! partial completion. Group coordinators report through a channel so the
//! aggregation below needs no locking.

use crate::config::Config;
use crate::crawler::group::GroupScheduler;
use crate::crawler::limiter::ConcurrencyLimiter;
use crate::crawler::retry::RetryEngine;
use crate::extract::{build_extractor, Extractor};
use crate::state::{BatchResult, CandidateFailure, CandidateGroup, FailureReason, GroupResult};
use crate::HarvestError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Runs batches of candidate groups
#[derive(Clone)]
pub struct BatchRunner {
    scheduler: GroupScheduler,
    deadline: Option<Duration>,
}

impl BatchRunner {
    /// Creates a runner around a group scheduler
    pub fn new(scheduler: GroupScheduler) -> Self {
        Self {
            scheduler,
            deadline: None,
        }
    }

    /// Builds the whole scheduler stack from configuration
    ///
    /// # Returns
    ///
    /// * `Ok(BatchRunner)` - Runner with client, limiter and extractor wired up
    /// * `Err(HarvestError)` - Invalid extractor or HTTP client configuration
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let extractor = build_extractor(&config.extractor)?;
        Self::with_extractor(config, extractor)
    }

    /// Builds the scheduler stack with a caller-supplied extractor
    pub fn with_extractor(
        config: &Config,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self, HarvestError> {
        let engine = RetryEngine::from_config(&config.harvest, &config.http, extractor)?;
        let runner = Self::new(GroupScheduler::new(Arc::new(engine)))
            .with_deadline(config.harvest.batch_deadline());
        Ok(runner)
    }

    /// Sets an enclosing wall-clock deadline for each batch
    ///
    /// When it fires, every group of the batch stops at its next checkpoint.
    /// Attempts already on the wire still run to completion.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// The process-wide limiter
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        self.scheduler.engine().limiter()
    }

    /// Stops dispatching new attempts on this runner and all its clones
    ///
    /// Attempts already on the wire finish; every other candidate ends as
    /// cancelled at its next slot acquisition, so the running batch still
    /// completes and can be persisted.
    pub fn shutdown(&self) {
        self.limiter().close();
    }

    /// Returns true once `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.limiter().is_closed()
    }

    /// Runs one batch to completion
    ///
    /// Groups are resolved concurrently; results keep submission order.
    pub async fn run(&self, groups: Vec<CandidateGroup>) -> BatchResult {
        let start = Instant::now();
        let batch_cancel = CancellationToken::new();
        let total = groups.len();

        let timer = self.deadline.map(|deadline| {
            let token = batch_cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!("Batch deadline of {:?} reached, cancelling remaining groups", deadline);
                token.cancel();
            })
        });

        let (tx, mut rx) = mpsc::channel::<(usize, GroupResult)>(total.max(1));
        let mut submitted = Vec::with_capacity(total);

        for (index, group) in groups.into_iter().enumerate() {
            submitted.push((group.group_id.clone(), group.urls.clone()));

            let scheduler = self.scheduler.clone();
            let cancel = batch_cancel.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let result = scheduler.resolve_within(group, &cancel).await;
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<GroupResult>> = vec![None; total];
        while let Some((index, result)) = rx.recv().await {
            slots[index] = Some(result);
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        let mut batch = BatchResult::default();
        for (slot, (group_id, urls)) in slots.into_iter().zip(submitted) {
            let result = slot.unwrap_or_else(|| {
                tracing::error!(group_id = %group_id, "Group coordinator ended without a result");
                aborted_group(group_id, urls)
            });
            batch.push(result);
        }

        batch.elapsed = start.elapsed();

        tracing::info!(
            "Batch finished: {} groups, {} resolved, {} failed in {:.2?}",
            batch.total_groups(),
            batch.successes.len(),
            batch.failures.len(),
            batch.elapsed
        );

        batch
    }
}

fn aborted_group(group_id: String, urls: Vec<String>) -> GroupResult {
    let failures = urls
        .into_iter()
        .map(|url| CandidateFailure {
            url,
            reason: FailureReason::Aborted("group coordinator ended without a result".into()),
            attempts: 0,
        })
        .collect();
    GroupResult::failed(group_id, failures)
}
