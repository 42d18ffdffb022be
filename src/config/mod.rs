//! Configuration module for Harvest-Relay
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use harvest_relay::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Max concurrency: {}", config.harvest.max_concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    bounded_secs, Config, ExtractorConfig, HarvestConfig, HttpConfig, InputConfig, OutputConfig,
    MAX_BACKOFF_SECONDS, MAX_REQUEST_TIMEOUT_SECONDS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub use validation::validate;
