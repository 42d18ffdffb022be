//! Outcome types produced by the fetch scheduler
//!
//! Every attempt chain ends in exactly one `FetchOutcome`, every group in
//! exactly one `GroupResult`, and every batch in one `BatchResult`.

use crate::extract::Fields;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Terminal result of driving one candidate URL through the retry loop
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The response was accepted and the extractor produced fields
    Success {
        group_id: String,
        url: String,
        fields: Fields,
        attempts: u32,
    },

    /// The candidate cannot succeed
    TerminalFailure {
        group_id: String,
        url: String,
        reason: FailureReason,
        attempts: u32,
    },

    /// The group was resolved elsewhere before the next attempt was dispatched
    Cancelled {
        group_id: String,
        url: String,
        attempts: u32,
    },
}

impl FetchOutcome {
    /// Returns the candidate URL this outcome belongs to
    pub fn url(&self) -> &str {
        match self {
            Self::Success { url, .. }
            | Self::TerminalFailure { url, .. }
            | Self::Cancelled { url, .. } => url,
        }
    }

    /// Returns the number of attempts actually dispatched
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::TerminalFailure { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Why a candidate ended without success
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// A status outside the accepted and retryable sets
    NonRetryableStatus(u16),

    /// The body was fetched but the extractor rejected it
    ExtractionFailed(String),

    /// Retryable failures persisted past the retry budget
    RetriesExhausted { last_error: String },

    /// No further attempt was dispatched because the group's signal was set
    Cancelled,

    /// The coordinating task for the candidate ended without reporting
    Aborted(String),
}

impl FailureReason {
    /// Extra context kept alongside the short reason, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::ExtractionFailed(detail) => Some(detail),
            Self::RetriesExhausted { last_error } => Some(last_error),
            Self::Aborted(detail) => Some(detail),
            Self::NonRetryableStatus(_) | Self::Cancelled => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonRetryableStatus(code) => write!(f, "status {}", code),
            Self::ExtractionFailed(_) => write!(f, "extraction failed"),
            Self::RetriesExhausted { .. } => write!(f, "max retries exceeded"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Aborted(_) => write!(f, "aborted"),
        }
    }
}

/// One candidate's failure inside a failed group
#[derive(Debug, Clone)]
pub struct CandidateFailure {
    pub url: String,
    pub reason: FailureReason,
    pub attempts: u32,
}

/// Terminal status of a group
#[derive(Debug, Clone)]
pub enum GroupStatus {
    /// The first candidate to succeed
    Resolved {
        url: String,
        fields: Fields,
        attempts: u32,
    },

    /// No candidate succeeded; one entry per candidate, in completion order
    Failed(Vec<CandidateFailure>),
}

/// The single terminal result of one candidate group
#[derive(Debug, Clone)]
pub struct GroupResult {
    pub group_id: String,
    pub status: GroupStatus,
}

impl GroupResult {
    /// Creates a resolved group result
    pub fn resolved(group_id: impl Into<String>, url: String, fields: Fields, attempts: u32) -> Self {
        Self {
            group_id: group_id.into(),
            status: GroupStatus::Resolved {
                url,
                fields,
                attempts,
            },
        }
    }

    /// Creates a failed group result
    pub fn failed(group_id: impl Into<String>, failures: Vec<CandidateFailure>) -> Self {
        Self {
            group_id: group_id.into(),
            status: GroupStatus::Failed(failures),
        }
    }

    /// The winning candidate's URL, fields and attempt count
    pub fn winner(&self) -> Option<(&str, &Fields, u32)> {
        match &self.status {
            GroupStatus::Resolved {
                url,
                fields,
                attempts,
            } => Some((url.as_str(), fields, *attempts)),
            GroupStatus::Failed(_) => None,
        }
    }

    /// Per-candidate failures of a failed group
    pub fn failures(&self) -> Option<&[CandidateFailure]> {
        match &self.status {
            GroupStatus::Failed(failures) => Some(failures),
            GroupStatus::Resolved { .. } => None,
        }
    }

    /// Returns true if a candidate succeeded
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, GroupStatus::Resolved { .. })
    }

    /// Returns true if the group failed with at least one cancelled candidate
    ///
    /// Only an enclosing batch deadline produces this, since a group's own
    /// signal is set solely on success.
    pub fn was_cancelled(&self) -> bool {
        match &self.status {
            GroupStatus::Failed(failures) => failures
                .iter()
                .any(|f| f.reason == FailureReason::Cancelled),
            GroupStatus::Resolved { .. } => false,
        }
    }
}

/// Aggregated results of one batch
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Groups with status `Resolved`
    pub successes: Vec<GroupResult>,

    /// Groups with status `Failed`
    pub failures: Vec<GroupResult>,

    /// Wall-clock time the batch took
    pub elapsed: Duration,
}

impl BatchResult {
    /// Routes a group result into successes or failures
    pub fn push(&mut self, result: GroupResult) {
        if result.is_resolved() {
            self.successes.push(result);
        } else {
            self.failures.push(result);
        }
    }

    /// Total number of groups in the batch
    pub fn total_groups(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Total number of failed candidates across failed groups
    pub fn failed_candidates(&self) -> usize {
        self.failures
            .iter()
            .map(|g| match &g.status {
                GroupStatus::Failed(failures) => failures.len(),
                GroupStatus::Resolved { .. } => 0,
            })
            .sum()
    }

    /// Returns true if the batch contained no groups
    pub fn is_empty(&self) -> bool {
        self.total_groups() == 0
    }
}

/// A persisted success record
#[derive(Debug, Clone, Serialize)]
pub struct SuccessRecord {
    pub group_id: String,
    pub url: String,
    pub attempts: u32,
    pub harvested_at: String,
    /// Extracted fields, nested so page data cannot shadow the keys above
    pub fields: Fields,
}

/// A persisted failure record, one per failed candidate
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub group_id: String,
    pub url: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub attempts: u32,
}

impl GroupResult {
    /// Flattens a resolved group into its success record
    pub fn to_success_record(&self, harvested_at: &str) -> Option<SuccessRecord> {
        match &self.status {
            GroupStatus::Resolved {
                url,
                fields,
                attempts,
            } => Some(SuccessRecord {
                group_id: self.group_id.clone(),
                url: url.clone(),
                attempts: *attempts,
                harvested_at: harvested_at.to_string(),
                fields: fields.clone(),
            }),
            GroupStatus::Failed(_) => None,
        }
    }

    /// Flattens a failed group into one record per candidate
    pub fn to_failure_records(&self) -> Vec<FailureRecord> {
        match &self.status {
            GroupStatus::Failed(failures) => failures
                .iter()
                .map(|f| FailureRecord {
                    group_id: self.group_id.clone(),
                    url: f.url.clone(),
                    reason: f.reason.to_string(),
                    detail: f.reason.detail().map(str::to_string),
                    attempts: f.attempts,
                })
                .collect(),
            GroupStatus::Resolved { .. } => Vec::new(),
        }
    }
}
