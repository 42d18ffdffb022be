//! State module for the harvest data model
//!
//! # Components
//!
//! - `CandidateGroup`: one logical record and its candidate URLs
//! - `FetchRequest`: one immutable fetch attempt
//! - `FetchOutcome` / `GroupResult` / `BatchResult`: value-typed results at each level

mod outcome;
mod request;

// Re-export main types
pub use outcome::{
    BatchResult, CandidateFailure, FailureReason, FailureRecord, FetchOutcome, GroupResult,
    GroupStatus, SuccessRecord,
};
pub use request::{CandidateGroup, FetchRequest};
