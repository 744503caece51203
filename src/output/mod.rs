//! Output module for lookup records and run reports
//!
//! This module handles:
//! - The `LookupResult` record and its JSON line encoding
//! - Result sinks that append records as they arrive
//! - Batch outcomes and the printed fleet summary

mod record;
mod report;
mod sink;

pub use record::{LookupResult, LookupStatus, ERROR_FIELD, IP_FIELD, URL_FIELD};
pub use report::{print_report, BatchOutcome, FleetReport};
pub use sink::{JsonLinesSink, ResultSink};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
