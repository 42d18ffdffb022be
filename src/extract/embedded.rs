//! Embedded data extractor
//!
//! Product pages carry their data as a script assignment:
//! `var react_data = {...};`. The blob is located with a regex and parsed as
//! JSON. Some pages emit JavaScript object syntax rather than strict JSON, so
//! a failed parse gets one best-effort repair pass before giving up.

use crate::extract::{ExtractError, Extractor, Fields};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn blob_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)var\s+react_data\s*=\s*(\{.*?\});").expect("static regex is valid")
    })
}

fn trailing_comma_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r",\s*([}\]])").expect("static regex is valid"))
}

/// Best-effort recovery of near-JSON text
///
/// Normalizes single quotes to double quotes and removes trailing commas
/// before `}` or `]`. Text that was already valid JSON may be damaged by the
/// quote rewrite, so callers only use this after a strict parse failed.
pub fn repair_near_json(text: &str) -> String {
    let quoted = text.replace('\'', "\"");
    trailing_comma_pattern()
        .replace_all(&quoted, "$1")
        .into_owned()
}

/// Extracts fields from the embedded `react_data` object
#[derive(Debug, Clone, Default)]
pub struct EmbeddedDataExtractor {
    /// Keys to keep; empty keeps every key
    keys: HashSet<String>,
}

impl EmbeddedDataExtractor {
    /// Creates an extractor keeping only `keys` (all keys when empty)
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Parses the blob strictly, then once more after repair
    fn parse_blob(blob: &str) -> Result<serde_json::Value, ExtractError> {
        match serde_json::from_str(blob) {
            Ok(value) => Ok(value),
            Err(strict_err) => {
                tracing::debug!("Strict parse of embedded data failed: {}", strict_err);
                Ok(serde_json::from_str(&repair_near_json(blob))?)
            }
        }
    }
}

impl Extractor for EmbeddedDataExtractor {
    fn name(&self) -> &'static str {
        "embedded-data"
    }

    fn extract(&self, body: &str) -> Result<Fields, ExtractError> {
        let blob = blob_pattern()
            .captures(body)
            .and_then(|c| c.get(1))
            .ok_or(ExtractError::MissingBlob)?;

        let object = match Self::parse_blob(blob.as_str())? {
            serde_json::Value::Object(map) => map,
            _ => return Err(ExtractError::NotAnObject),
        };

        if self.keys.is_empty() {
            return Ok(object);
        }

        Ok(object
            .into_iter()
            .filter(|(key, _)| self.keys.contains(key))
            .collect())
    }
}
