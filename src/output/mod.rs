//! Output module for persisting harvest results
//!
//! This module handles:
//! - Writing per-batch success and failure artifacts
//! - Accumulating and printing run statistics

mod json_sink;
pub mod stats;
mod traits;

pub use json_sink::JsonFileSink;
pub use stats::{print_statistics, RunStatistics};
pub use traits::{PersistSummary, ResultSink, SinkError, SinkResult};
