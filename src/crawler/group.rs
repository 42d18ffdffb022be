//! Group racing
//!
//! Resolves one candidate group to exactly one `GroupResult`:
//! 1. Create a group-local cancellation signal (a child of the batch signal)
//! 2. Launch one retry-engine run per candidate, all sharing that signal and
//!    the process-wide limiter
//! 3. Consume outcomes in completion order from a channel; the first success
//!    sets the signal and resolves the group, remaining runs are discarded
//! 4. If every candidate ends without success, resolve `Failed`
//!
//! Outcome accumulation is confined to the coordinating task, so the only
//! shared mutable state is the limiter.

use crate::crawler::retry::RetryEngine;
use crate::state::{CandidateFailure, CandidateGroup, FailureReason, FetchOutcome, GroupResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Races the candidates of a group against each other
#[derive(Clone)]
pub struct GroupScheduler {
    engine: Arc<RetryEngine>,
}

impl GroupScheduler {
    /// Creates a scheduler backed by a shared engine
    pub fn new(engine: Arc<RetryEngine>) -> Self {
        Self { engine }
    }

    /// The engine candidates run on
    pub fn engine(&self) -> &Arc<RetryEngine> {
        &self.engine
    }

    /// Resolves a group with no enclosing cancellation
    pub async fn resolve(&self, group: CandidateGroup) -> GroupResult {
        self.resolve_within(group, &CancellationToken::new()).await
    }

    /// Resolves a group whose signal is a child of `parent`
    ///
    /// Cancelling `parent` (e.g. on a batch deadline) stops every candidate
    /// of the group at its next checkpoint. The group's own signal never
    /// leaks to sibling groups.
    pub async fn resolve_within(
        &self,
        group: CandidateGroup,
        parent: &CancellationToken,
    ) -> GroupResult {
        let CandidateGroup { group_id, urls } = group;

        if urls.is_empty() {
            tracing::warn!(group_id = %group_id, "Group has no candidate URLs");
            return GroupResult::failed(group_id, Vec::new());
        }

        let cancel = parent.child_token();
        // Abandoned candidates stop at their next checkpoint even if this future is dropped
        let _cancel_on_drop = cancel.clone().drop_guard();
        let (tx, mut rx) = mpsc::channel::<FetchOutcome>(urls.len());
        let mut pending = urls.clone();

        for url in urls {
            let engine = Arc::clone(&self.engine);
            let cancel = cancel.clone();
            let tx = tx.clone();
            let group_id = group_id.clone();

            tokio::spawn(async move {
                let outcome = engine.run(&group_id, &url, &cancel).await;
                // The receiver is gone once the group resolved; the outcome is discarded
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut failures = Vec::new();

        while let Some(outcome) = rx.recv().await {
            if let Some(pos) = pending.iter().position(|u| u == outcome.url()) {
                pending.swap_remove(pos);
            }

            match outcome {
                FetchOutcome::Success {
                    url,
                    fields,
                    attempts,
                    ..
                } => {
                    cancel.cancel();
                    tracing::debug!(
                        group_id = %group_id,
                        url = %url,
                        attempts,
                        abandoned = pending.len(),
                        "Group resolved"
                    );
                    return GroupResult::resolved(group_id, url, fields, attempts);
                }
                FetchOutcome::TerminalFailure {
                    url,
                    reason,
                    attempts,
                    ..
                } => {
                    tracing::debug!(group_id = %group_id, url = %url, "Candidate failed: {}", reason);
                    failures.push(CandidateFailure {
                        url,
                        reason,
                        attempts,
                    });
                }
                FetchOutcome::Cancelled { url, attempts, .. } => {
                    failures.push(CandidateFailure {
                        url,
                        reason: FailureReason::Cancelled,
                        attempts,
                    });
                }
            }
        }

        // A candidate task that panicked never reports; account for it here
        for url in pending {
            failures.push(CandidateFailure {
                url,
                reason: FailureReason::Aborted("candidate task ended without an outcome".into()),
                attempts: 0,
            });
        }

        tracing::debug!(group_id = %group_id, candidates = failures.len(), "Group failed");
        GroupResult::failed(group_id, failures)
    }
}
