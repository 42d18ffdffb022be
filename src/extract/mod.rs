//! Extractors turn a successful response body into structured fields
//!
//! An extractor is a pure function: no network or filesystem access, and it
//! is called synchronously from the retry engine's success path. The
//! scheduler does not care which implementation is installed.

mod embedded;
mod heading;

pub use embedded::{repair_near_json, EmbeddedDataExtractor};
pub use heading::HeadingExtractor;

use crate::config::ExtractorConfig;
use crate::ConfigError;
use std::sync::Arc;
use thiserror::Error;

/// Structured fields pulled out of a page
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur during extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no element matches selector '{0}'")]
    MissingElement(String),

    #[error("element matching '{0}' has no text")]
    EmptyElement(String),

    #[error("no embedded data blob found")]
    MissingBlob,

    #[error("embedded data is not valid JSON even after repair: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("embedded data is not a JSON object")]
    NotAnObject,
}

/// Trait for body-to-fields extractors
///
/// Implementations must be thread-safe; one instance is shared by every
/// concurrent fetch attempt.
pub trait Extractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Extracts fields from a response body
    fn extract(&self, body: &str) -> Result<Fields, ExtractError>;
}

/// Builds the extractor selected by configuration
pub fn build_extractor(config: &ExtractorConfig) -> Result<Arc<dyn Extractor>, ConfigError> {
    match config {
        ExtractorConfig::Heading { selector } => Ok(Arc::new(HeadingExtractor::new(selector)?)),
        ExtractorConfig::EmbeddedData { keys } => {
            Ok(Arc::new(EmbeddedDataExtractor::new(keys.clone())))
        }
    }
}
