//! Batch sources supply candidate groups to the harvester
//!
//! A source is a lazy, finite, non-restartable sequence of batches.

mod json_file;

pub use json_file::JsonFileSource;

use crate::state::CandidateGroup;
use std::collections::VecDeque;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading input
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open input file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read input file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Trait for batch sources
pub trait BatchSource {
    /// Returns the next batch, or `None` at end of input
    fn next_batch(&mut self) -> SourceResult<Option<Vec<CandidateGroup>>>;
}

/// In-memory source, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySource {
    batches: VecDeque<Vec<CandidateGroup>>,
}

impl MemorySource {
    /// Creates a source yielding the given batches in order
    pub fn new(batches: Vec<Vec<CandidateGroup>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// Chunks `groups` into batches of at most `batch_size`
    pub fn from_groups(groups: Vec<CandidateGroup>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let mut batches = VecDeque::new();
        let mut iter = groups.into_iter().peekable();

        while iter.peek().is_some() {
            batches.push_back(iter.by_ref().take(batch_size).collect());
        }

        Self { batches }
    }
}

impl BatchSource for MemorySource {
    fn next_batch(&mut self) -> SourceResult<Option<Vec<CandidateGroup>>> {
        Ok(self.batches.pop_front())
    }
}
