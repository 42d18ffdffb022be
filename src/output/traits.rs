//! Result sink traits and types
//!
//! This module defines the trait interface for sinks that persist batch
//! outcomes, and the summary a sink reports back.

use crate::state::BatchResult;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting results
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// What a sink wrote for one batch
#[derive(Debug, Clone, Default)]
pub struct PersistSummary {
    /// Artifact holding success records, if one was written
    pub result_path: Option<PathBuf>,

    /// Artifact holding failure records, if one was written
    pub faulty_path: Option<PathBuf>,

    /// Number of success records written
    pub successes: usize,

    /// Number of failure records written (one per failed candidate)
    pub failures: usize,
}

/// Trait for result sinks
///
/// Persisting an empty batch must succeed; it simply writes nothing.
pub trait ResultSink {
    /// Persists one batch under its 1-based batch number
    fn persist(&mut self, batch_number: usize, batch: &BatchResult) -> SinkResult<PersistSummary>;
}
