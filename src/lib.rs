//! Geocrawl: batch IP geolocation enrichment
//!
//! This crate enriches lists of IP addresses with records fetched from a remote
//! lookup service. Identifiers are processed in named batches ("sheets"); each
//! batch is fetched under a concurrency cap, streamed to a line-delimited JSON
//! artifact, handed off to a bucket and removed locally.

pub mod config;
pub mod output;
pub mod pipeline;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Geocrawl operations
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Admission closed for batch {batch}")]
    AdmissionClosed { batch: String },

    #[error("Writer task for batch {batch} did not finish: {message}")]
    WriterTask { batch: String, message: String },

    #[error("Batch {batch} wrote {written} records for {expected} identifiers")]
    RecordCountMismatch {
        batch: String,
        expected: usize,
        written: u64,
    },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::BatchState,
        to: state::BatchState,
    },

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

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid name template: {0}")]
    InvalidTemplate(String),
}

/// Result type alias for Geocrawl operations
pub type Result<T> = std::result::Result<T, GeoError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use output::{BatchOutcome, FleetReport, LookupResult, LookupStatus};
pub use pipeline::{Batch, BatchOrchestrator, ConcurrencyLimiter, FleetSupervisor};
pub use state::BatchState;
