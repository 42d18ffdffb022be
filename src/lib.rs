//! Harvest-Relay: a group-racing web content harvester
//!
//! This crate fetches large pools of candidate URLs grouped by a logical record
//! id, retries transient failures with jittered backoff, accepts the first
//! successful candidate of each group, and hands extracted fields to a sink.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod source;
pub mod state;

use thiserror::Error;

/// Main error type for Harvest-Relay operations
///
/// Only setup and the external collaborators (source, sink) surface errors.
/// Fetch attempts and group resolution always produce value-typed outcomes.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Source error: {0}")]
    Source(#[from] source::SourceError),

    #[error("Sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid header in template: {0}")]
    InvalidHeader(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Harvest-Relay operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{harvest, BatchRunner, ConcurrencyLimiter, GroupScheduler, RetryEngine};
pub use extract::{Extractor, Fields};
pub use state::{BatchResult, CandidateGroup, FetchOutcome, GroupResult, GroupStatus};
