//! Amazon S3 bucket
//!
//! Input objects are fetched with `GetObject`; artifacts are streamed from
//! disk with `PutObject`. Credentials come from the standard AWS chain.

use crate::pipeline::Batch;
use crate::storage::traits::{parse_identifiers, IdentifierSource, StorageError, StorageResult, Uploader};
use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;

/// S3-backed bucket
#[derive(Debug, Clone)]
pub struct S3Bucket {
    client: Client,
    bucket: String,
    skip_header: bool,
}

impl S3Bucket {
    /// Creates a bucket handle, loading AWS configuration from the environment
    pub async fn connect(bucket: &str, region: Option<&str>, skip_header: bool) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        tracing::info!(bucket = %bucket, region = ?region, "S3 bucket initialized");

        Self::with_client(Client::new(&sdk_config), bucket, skip_header)
    }

    /// Creates a bucket handle around an existing client
    pub fn with_client(client: Client, bucket: &str, skip_header: bool) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            skip_header,
        }
    }
}

#[async_trait]
impl IdentifierSource for S3Bucket {
    async fn list_identifiers(&self, batch: &Batch) -> StorageResult<Vec<String>> {
        let key = batch.input_object.as_str();

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Download {
                        key: key.to_string(),
                        message: DisplayErrorContext(&service).to_string(),
                    }
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Download {
                key: key.to_string(),
                message: e.to_string(),
            })?
            .into_bytes();

        let text = std::str::from_utf8(&bytes).map_err(|_| StorageError::InvalidText {
            key: key.to_string(),
        })?;

        let identifiers = parse_identifiers(text, self.skip_header);
        tracing::debug!(
            batch = %batch.name,
            object = %key,
            count = identifiers.len(),
            "Loaded identifiers from S3"
        );
        Ok(identifiers)
    }
}

#[async_trait]
impl Uploader for S3Bucket {
    async fn upload(&self, local_path: &Path, destination: &str) -> StorageResult<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::Upload {
                key: destination.to_string(),
                message: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(destination)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: destination.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!(
            "Uploaded {} to s3://{}/{}",
            local_path.display(),
            self.bucket,
            destination
        );
        Ok(())
    }
}
