use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Geocrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub lookup: LookupConfig,
    pub batches: BatchConfig,
    pub storage: StorageConfig,
}

/// Remote lookup service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    /// Root URL of the lookup service; the identifier is appended as a path segment
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum number of lookups in flight across the whole process
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Upper bound for a single lookup, including reading the body (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound for establishing a connection (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// User agent sent with every lookup
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,
}

/// Batch naming and scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Batch name, keyed by batch index (e.g. "Sheet{}")
    #[serde(rename = "batch-name-template")]
    pub batch_name_template: String,

    /// Object holding a batch's identifiers, keyed by batch index
    #[serde(rename = "input-object-name-template")]
    pub input_object_name_template: String,

    /// Local artifact file name, keyed by batch name
    #[serde(rename = "output-file-name-template")]
    pub output_file_name_template: String,

    /// Destination object name in the bucket, keyed by batch name
    #[serde(rename = "output-object-name-template")]
    pub output_object_name_template: String,

    /// Directory holding local artifacts while a batch is in progress
    #[serde(rename = "staging-dir", default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Number of batches processed at the same time
    #[serde(rename = "batch-parallelism", default = "default_batch_parallelism")]
    pub batch_parallelism: u32,

    /// Whether the first line of each input object is a column header
    #[serde(rename = "skip-header", default = "default_skip_header")]
    pub skip_header: bool,
}

/// Which bucket implementation backs identifier sources and uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

/// Bucket configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Destination bucket name
    pub bucket: String,

    /// Directory containing bucket directories (local backend)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// AWS region (s3 backend); falls back to the environment when unset
    #[serde(default)]
    pub region: Option<String>,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_batch_parallelism() -> u32 {
    1
}

fn default_skip_header() -> bool {
    true
}

fn default_backend() -> StorageBackend {
    StorageBackend::Local
}
