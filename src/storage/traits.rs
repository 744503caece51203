//! Storage traits and error types
//!
//! The pipeline reads identifiers from an `IdentifierSource` and hands
//! finished artifacts to an `Uploader`. Both are usually backed by the same
//! bucket.

use crate::pipeline::Batch;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object {key} is not valid UTF-8 text")]
    InvalidText { key: String },

    #[error("Download of {key} failed: {message}")]
    Download { key: String, message: String },

    #[error("Upload to {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Yields the identifiers belonging to a batch
#[async_trait]
pub trait IdentifierSource: Send + Sync {
    /// Returns the batch's identifiers in source order
    ///
    /// A failure here is structural: the batch cannot start.
    async fn list_identifiers(&self, batch: &Batch) -> StorageResult<Vec<String>>;
}

/// Hands a finished local artifact to durable storage
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Transfers the file at `local_path` to `destination`
    ///
    /// The file must not be modified or removed until this returns.
    async fn upload(&self, local_path: &Path, destination: &str) -> StorageResult<()>;
}

/// Splits an input object into identifiers
///
/// One identifier per line; surrounding whitespace is trimmed and blank
/// lines are skipped. With `skip_header`, the first line is a column header.
pub fn parse_identifiers(text: &str, skip_header: bool) -> Vec<String> {
    text.lines()
        .skip(usize::from(skip_header))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
