//! Requests and candidate groups
//!
//! A `CandidateGroup` is one logical record with its alternative URLs. A
//! `FetchRequest` is a single immutable attempt against one of those URLs;
//! retries produce a new request rather than mutating the previous one.

use serde::Serialize;

/// One logical record and its candidate URLs, in submission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateGroup {
    /// Logical record id (e.g. a product id)
    pub group_id: String,

    /// Candidate URLs; any of them may yield the authoritative data
    pub urls: Vec<String>,
}

impl CandidateGroup {
    /// Creates a group from an id and its candidate URLs
    pub fn new(group_id: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            group_id: group_id.into(),
            urls,
        }
    }

    /// Creates a group with exactly one candidate URL
    pub fn single(group_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(group_id, vec![url.into()])
    }

    /// Number of candidate URLs
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Returns true if the group has no candidates
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// A single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub group_id: String,
    pub url: String,
    /// 1-based attempt counter
    pub attempt_number: u32,
}

impl FetchRequest {
    /// Creates the first attempt for a candidate
    pub fn first(group_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            url: url.into(),
            attempt_number: 1,
        }
    }

    /// Creates the follow-up attempt, leaving `self` untouched
    pub fn next_attempt(&self) -> Self {
        Self {
            group_id: self.group_id.clone(),
            url: self.url.clone(),
            attempt_number: self.attempt_number + 1,
        }
    }
}
