//! Directory-backed bucket
//!
//! A bucket is a directory `<root>/<bucket>`; object keys are relative paths
//! inside it. Useful for local runs and for tests.

use crate::pipeline::Batch;
use crate::storage::traits::{parse_identifiers, IdentifierSource, StorageError, StorageResult, Uploader};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Bucket stored as a plain directory
#[derive(Debug, Clone)]
pub struct LocalBucket {
    dir: PathBuf,
    skip_header: bool,
}

impl LocalBucket {
    /// Creates a bucket rooted at `<root>/<bucket>`
    pub fn new(root: &Path, bucket: &str, skip_header: bool) -> Self {
        Self {
            dir: root.join(bucket),
            skip_header,
        }
    }

    /// Directory holding this bucket's objects
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves an object key to a path inside the bucket directory
    pub fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if key.is_empty() || escapes {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.dir.join(relative))
    }
}

#[async_trait]
impl IdentifierSource for LocalBucket {
    async fn list_identifiers(&self, batch: &Batch) -> StorageResult<Vec<String>> {
        let path = self.object_path(&batch.input_object)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(batch.input_object.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let text = String::from_utf8(bytes).map_err(|_| StorageError::InvalidText {
            key: batch.input_object.clone(),
        })?;

        let identifiers = parse_identifiers(&text, self.skip_header);
        tracing::debug!(
            batch = %batch.name,
            object = %batch.input_object,
            count = identifiers.len(),
            "Loaded identifiers"
        );
        Ok(identifiers)
    }
}

#[async_trait]
impl Uploader for LocalBucket {
    async fn upload(&self, local_path: &Path, destination: &str) -> StorageResult<()> {
        let target = self.object_path(destination)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| StorageError::Upload {
                key: destination.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            "Copied {} ({} bytes) to {}",
            local_path.display(),
            bytes,
            target.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn batch(input_object: &str) -> Batch {
        Batch {
            index: 0,
            name: "Sheet0".to_string(),
            input_object: input_object.to_string(),
            local_artifact_path: PathBuf::from("unused.jsonl"),
            destination: "output/Sheet0.jsonl".to_string(),
        }
    }

    #[test]
    fn test_object_path_rejects_escapes() {
        let bucket = LocalBucket::new(Path::new("/srv"), "results", true);

        assert_eq!(
            bucket.object_path("output/a.jsonl").unwrap(),
            PathBuf::from("/srv/results/output/a.jsonl")
        );
        assert!(bucket.object_path("../other/a.jsonl").is_err());
        assert!(bucket.object_path("/etc/passwd").is_err());
        assert!(bucket.object_path("").is_err());
    }

    #[tokio::test]
    async fn test_list_identifiers_reads_object() {
        let root = TempDir::new().unwrap();
        let bucket = LocalBucket::new(root.path(), "geo", true);
        std::fs::create_dir_all(bucket.dir().join("input")).unwrap();
        std::fs::write(
            bucket.dir().join("input/sheet_0.csv"),
            "IP_ADDRESS\n1.1.1.1\n8.8.8.8\n",
        )
        .unwrap();

        let ids = bucket
            .list_identifiers(&batch("input/sheet_0.csv"))
            .await
            .unwrap();
        assert_eq!(ids, vec!["1.1.1.1", "8.8.8.8"]);
    }

    #[tokio::test]
    async fn test_list_identifiers_missing_object() {
        let root = TempDir::new().unwrap();
        let bucket = LocalBucket::new(root.path(), "geo", true);

        let result = bucket.list_identifiers(&batch("input/missing.csv")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_upload_copies_into_bucket() {
        let root = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let local = staging.path().join("Sheet0.jsonl");
        std::fs::write(&local, "{\"ip\":\"1.1.1.1\"}\n").unwrap();

        let bucket = LocalBucket::new(root.path(), "geo", true);
        bucket.upload(&local, "output/Sheet0.jsonl").await.unwrap();

        let uploaded =
            std::fs::read_to_string(bucket.dir().join("output/Sheet0.jsonl")).unwrap();
        assert_eq!(uploaded, "{\"ip\":\"1.1.1.1\"}\n");
        // The uploader never consumes the local artifact
        assert!(local.exists());
    }

    #[tokio::test]
    async fn test_upload_missing_file_fails() {
        let root = TempDir::new().unwrap();
        let bucket = LocalBucket::new(root.path(), "geo", true);

        let result = bucket
            .upload(Path::new("/nonexistent/file.jsonl"), "output/x.jsonl")
            .await;
        assert!(matches!(result, Err(StorageError::Upload { .. })));
    }
}
