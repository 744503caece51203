use crate::config::template::has_placeholder;
use crate::config::types::{BatchConfig, Config, LookupConfig, StorageBackend, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound for `max-workers`
const MAX_WORKERS_LIMIT: u32 = 1024;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_lookup_config(&config.lookup)?;
    validate_batch_config(&config.batches)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates lookup service configuration
fn validate_lookup_config(config: &LookupConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.max_workers < 1 || config.max_workers > MAX_WORKERS_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and {}, got {}",
            MAX_WORKERS_LIMIT, config.max_workers
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if let Some(agent) = &config.user_agent {
        if agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent cannot be blank".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates batch naming configuration
fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    validate_template(
        "batch_name_template",
        &config.batch_name_template,
        "index",
    )?;
    validate_template(
        "input_object_name_template",
        &config.input_object_name_template,
        "index",
    )?;
    validate_template(
        "output_file_name_template",
        &config.output_file_name_template,
        "name",
    )?;
    validate_template(
        "output_object_name_template",
        &config.output_object_name_template,
        "name",
    )?;

    if config.staging_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "staging_dir cannot be empty".to_string(),
        ));
    }

    if config.batch_parallelism < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_parallelism must be >= 1, got {}",
            config.batch_parallelism
        )));
    }

    Ok(())
}

/// Validates bucket configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.bucket.trim().is_empty() {
        return Err(ConfigError::Validation("bucket cannot be empty".to_string()));
    }

    match config.backend {
        StorageBackend::Local => {
            if config.root.is_none() {
                return Err(ConfigError::Validation(
                    "root is required for the local storage backend".to_string(),
                ));
            }
        }
        StorageBackend::S3 => {
            if !cfg!(feature = "s3") {
                return Err(ConfigError::Validation(
                    "s3 backend requires building with the `s3` feature".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Validates that a template is non-empty and keyed
fn validate_template(field: &str, template: &str, key: &str) -> Result<(), ConfigError> {
    if template.trim().is_empty() {
        return Err(ConfigError::InvalidTemplate(format!(
            "{} cannot be empty",
            field
        )));
    }

    if !has_placeholder(template, key) {
        return Err(ConfigError::InvalidTemplate(format!(
            "{} must contain '{{}}' or '{{{}}}', got '{}'",
            field, key, template
        )));
    }

    Ok(())
}
