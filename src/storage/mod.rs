//! Storage module for identifier sources and artifact uploads
//!
//! This module handles:
//! - Reading a batch's identifiers from a bucket object
//! - Handing finished artifacts to a bucket
//! - Choosing the bucket backend from configuration

mod local;
#[cfg(feature = "s3")]
mod s3;
mod traits;

pub use local::LocalBucket;
#[cfg(feature = "s3")]
pub use s3::S3Bucket;
pub use traits::{parse_identifiers, IdentifierSource, StorageError, StorageResult, Uploader};

use crate::config::{BatchConfig, StorageBackend, StorageConfig};
use crate::ConfigError;
use async_trait::async_trait;
use std::path::Path;

/// A bucket chosen at runtime from configuration
///
/// Serves as both identifier source and uploader, like the backends it wraps.
#[derive(Debug, Clone)]
pub enum Bucket {
    Local(LocalBucket),
    #[cfg(feature = "s3")]
    S3(S3Bucket),
}

impl Bucket {
    /// Opens the bucket described by the storage configuration
    pub async fn open(storage: &StorageConfig, batches: &BatchConfig) -> Result<Self, ConfigError> {
        match storage.backend {
            StorageBackend::Local => {
                let root = storage.root.as_deref().ok_or_else(|| {
                    ConfigError::Validation(
                        "root is required for the local storage backend".to_string(),
                    )
                })?;
                Ok(Self::Local(LocalBucket::new(
                    root,
                    &storage.bucket,
                    batches.skip_header,
                )))
            }
            #[cfg(feature = "s3")]
            StorageBackend::S3 => Ok(Self::S3(
                S3Bucket::connect(
                    &storage.bucket,
                    storage.region.as_deref(),
                    batches.skip_header,
                )
                .await,
            )),
            #[cfg(not(feature = "s3"))]
            StorageBackend::S3 => Err(ConfigError::Validation(
                "s3 backend requires building with the `s3` feature".to_string(),
            )),
        }
    }
}

#[async_trait]
impl IdentifierSource for Bucket {
    async fn list_identifiers(&self, batch: &crate::pipeline::Batch) -> StorageResult<Vec<String>> {
        match self {
            Self::Local(bucket) => bucket.list_identifiers(batch).await,
            #[cfg(feature = "s3")]
            Self::S3(bucket) => bucket.list_identifiers(batch).await,
        }
    }
}

#[async_trait]
impl Uploader for Bucket {
    async fn upload(&self, local_path: &Path, destination: &str) -> StorageResult<()> {
        match self {
            Self::Local(bucket) => bucket.upload(local_path, destination).await,
            #[cfg(feature = "s3")]
            Self::S3(bucket) => bucket.upload(local_path, destination).await,
        }
    }
}
