//! Single-candidate retry state machine
//!
//! Drives one candidate URL through `Pending -> InFlight -> {Success, Retry,
//! TerminalFailure}` as an explicit loop. The loop head is the cancellation
//! checkpoint: a set signal stops the candidate before anything is sent.
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 200/201, extractor ok | Success |
//! | HTTP 200/201, extractor fails | Terminal, never retried |
//! | HTTP 403/429/500/502/503/504 | Retry with backoff |
//! | Any other status | Terminal immediately |
//! | Timeout / connect / DNS error | Retry with backoff |
//! | Retry budget spent | Terminal, "max retries exceeded" |

use crate::config::{bounded_secs, HarvestConfig, HttpConfig, MAX_BACKOFF_SECONDS};
use crate::crawler::fetcher::{build_http_client, fetch_once, FetchError, RequestTemplate};
use crate::crawler::limiter::ConcurrencyLimiter;
use crate::extract::{Extractor, Fields};
use crate::state::{FailureReason, FetchOutcome, FetchRequest};
use crate::HarvestError;
use rand::Rng;
use reqwest::header::HeaderValue;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry budget and backoff shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Seconds multiplied by the attempt number
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Creates a policy
    pub fn new(max_retries: u32, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            backoff_factor,
        }
    }

    /// Highest attempt number a request may carry
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Returns true if a failed `attempt` may be followed by another
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Bounds of the jittered delay after a failed `attempt`
    pub fn backoff_envelope(&self, attempt: u32) -> (Duration, Duration) {
        let base = self.backoff_factor * attempt as f64;
        (
            bounded_secs(0.5 * base, MAX_BACKOFF_SECONDS),
            bounded_secs(1.5 * base, MAX_BACKOFF_SECONDS),
        )
    }

    /// Delay before retrying a failed `attempt`
    ///
    /// `uniform(0.5, 1.5) * backoff_factor * attempt` seconds, never longer
    /// than `MAX_BACKOFF_SECONDS`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_factor * attempt as f64;
        let jitter: f64 = rand::rng().random_range(0.5..1.5);
        bounded_secs(jitter * base, MAX_BACKOFF_SECONDS)
    }
}

impl From<&HarvestConfig> for RetryPolicy {
    fn from(config: &HarvestConfig) -> Self {
        Self::new(config.max_retries, config.backoff_factor)
    }
}

/// What one attempt produced
enum AttemptResult {
    Fetched(Fields),
    Rejected(FetchError),
    ExtractionFailed(String),
    Cancelled,
}

/// Drives individual candidates to a terminal outcome
pub struct RetryEngine {
    client: Client,
    template: RequestTemplate,
    limiter: ConcurrencyLimiter,
    extractor: Arc<dyn Extractor>,
    policy: RetryPolicy,
}

impl RetryEngine {
    /// Creates an engine from already-built parts
    pub fn new(
        client: Client,
        template: RequestTemplate,
        limiter: ConcurrencyLimiter,
        extractor: Arc<dyn Extractor>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            template,
            limiter,
            extractor,
            policy,
        }
    }

    /// Builds the client, request template and limiter from configuration
    pub fn from_config(
        harvest: &HarvestConfig,
        http: &HttpConfig,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self, HarvestError> {
        let client = build_http_client(http)?;
        let template = RequestTemplate::from_config(http)?;
        let limiter = ConcurrencyLimiter::new(harvest.max_concurrency);

        Ok(Self::new(
            client,
            template,
            limiter,
            extractor,
            RetryPolicy::from(harvest),
        ))
    }

    /// The limiter shared by every attempt this engine issues
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// The retry policy in effect
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs one candidate until success, terminal failure, or cancellation
    ///
    /// Never returns an error: every path ends in a `FetchOutcome`.
    pub async fn run(
        &self,
        group_id: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let mut request = FetchRequest::first(group_id, url);
        let mut tried_agents: Vec<HeaderValue> = Vec::new();
        let mut dispatched = 0;

        loop {
            if cancel.is_cancelled() {
                return cancelled(&request, dispatched);
            }

            let agent = self.template.pick_user_agent(&mut tried_agents);

            tracing::debug!(
                group_id = %request.group_id,
                url = %request.url,
                attempt = request.attempt_number,
                "Dispatching fetch attempt"
            );

            let result = self.attempt(&request, agent, cancel).await;
            if !matches!(result, AttemptResult::Cancelled) {
                dispatched = request.attempt_number;
            }

            let error = match result {
                AttemptResult::Fetched(fields) => {
                    return FetchOutcome::Success {
                        group_id: request.group_id,
                        url: request.url,
                        fields,
                        attempts: dispatched,
                    };
                }
                AttemptResult::Cancelled => return cancelled(&request, dispatched),
                AttemptResult::ExtractionFailed(detail) => {
                    tracing::warn!(url = %request.url, "Extraction failed: {}", detail);
                    return terminal(request, FailureReason::ExtractionFailed(detail), dispatched);
                }
                AttemptResult::Rejected(FetchError::NonRetryableStatus(status)) => {
                    tracing::info!(url = %request.url, status, "Non-retryable status");
                    return terminal(
                        request,
                        FailureReason::NonRetryableStatus(status),
                        dispatched,
                    );
                }
                AttemptResult::Rejected(error) => error,
            };

            if !self.policy.allows_retry(request.attempt_number) {
                tracing::warn!(
                    url = %request.url,
                    attempts = dispatched,
                    "Giving up after retryable failure: {}",
                    error
                );
                return terminal(
                    request,
                    FailureReason::RetriesExhausted {
                        last_error: error.to_string(),
                    },
                    dispatched,
                );
            }

            let delay = self.policy.backoff_delay(request.attempt_number);
            tracing::warn!(
                url = %request.url,
                attempt = request.attempt_number,
                "Retryable failure ({}), backing off {:?}",
                error,
                delay
            );

            tokio::time::sleep(delay).await;

            request = request.next_attempt();
        }
    }

    /// One InFlight step: slot, GET, release, classify, extract
    async fn attempt(
        &self,
        request: &FetchRequest,
        agent: HeaderValue,
        cancel: &CancellationToken,
    ) -> AttemptResult {
        let slot = match self.limiter.acquire().await {
            Ok(slot) => slot,
            Err(_) => return AttemptResult::Cancelled,
        };

        // Waiting for the slot may take a while; check again before sending
        if cancel.is_cancelled() {
            self.limiter.release(slot);
            return AttemptResult::Cancelled;
        }

        let fetched = fetch_once(&self.client, &self.template, &request.url, agent).await;
        self.limiter.release(slot);

        match fetched {
            Ok(page) => match self.extractor.extract(&page.body) {
                Ok(fields) => AttemptResult::Fetched(fields),
                Err(e) => AttemptResult::ExtractionFailed(e.to_string()),
            },
            Err(error) => AttemptResult::Rejected(error),
        }
    }
}

fn cancelled(request: &FetchRequest, dispatched: u32) -> FetchOutcome {
    tracing::debug!(url = %request.url, "Candidate cancelled before dispatch");
    FetchOutcome::Cancelled {
        group_id: request.group_id.clone(),
        url: request.url.clone(),
        attempts: dispatched,
    }
}

fn terminal(request: FetchRequest, reason: FailureReason, dispatched: u32) -> FetchOutcome {
    FetchOutcome::TerminalFailure {
        group_id: request.group_id,
        url: request.url,
        reason,
        attempts: dispatched,
    }
}
