//! Lookup client
//!
//! This module performs the remote lookups for the pipeline:
//! - Building the HTTP client with timeouts and user agent
//! - Resolving the lookup target for an identifier
//! - Turning every failure into an error record instead of an `Err`

use crate::config::LookupConfig;
use crate::output::LookupResult;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;

/// Default user agent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("geocrawl/", env!("CARGO_PKG_VERSION"));

/// Maximum number of body characters quoted in an error record
const BODY_SNIPPET_CHARS: usize = 200;

/// Performs one remote lookup per identifier
///
/// `fetch` never fails: transport errors, timeouts and malformed bodies come
/// back as `LookupStatus::Error` records carrying the identifier and target.
/// The returned record must carry the identifier it was called with.
#[async_trait]
pub trait LookupClient: Send + Sync {
    /// URL the lookup for `identifier` is sent to
    fn target(&self, identifier: &str) -> String;

    /// Looks up one identifier
    async fn fetch(&self, identifier: &str) -> LookupResult;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The lookup service configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &LookupConfig) -> Result<Client, reqwest::Error> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Joins the service root and an identifier with exactly one slash
pub fn lookup_target(base_url: &str, identifier: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), identifier)
}

/// Lookup client backed by a shared `reqwest::Client`
///
/// The client is owned by the caller and passed in, so one connection pool
/// serves every batch of a run.
#[derive(Debug, Clone)]
pub struct HttpLookupClient {
    client: Client,
    base_url: String,
}

impl HttpLookupClient {
    /// Wraps an existing HTTP client
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds the HTTP client from configuration and wraps it
    pub fn from_config(config: &LookupConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::new(client, &config.base_url))
    }

    /// Sends the request and classifies the response
    async fn request(&self, target: &str) -> Result<serde_json::Map<String, Value>, String> {
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| describe_request_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read body: {}", error_chain(&e)))?;

        if !status.is_success() {
            return Err(format!("HTTP {}: {}", status.as_u16(), snippet(&body)));
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(payload)) => Ok(payload),
            Ok(other) => Err(format!(
                "expected a JSON object, got {}: {}",
                json_kind(&other),
                snippet(&body)
            )),
            Err(e) => Err(format!("malformed JSON body ({}): {}", e, snippet(&body))),
        }
    }
}

#[async_trait]
impl LookupClient for HttpLookupClient {
    fn target(&self, identifier: &str) -> String {
        lookup_target(&self.base_url, identifier)
    }

    async fn fetch(&self, identifier: &str) -> LookupResult {
        let target = self.target(identifier);

        match self.request(&target).await {
            Ok(payload) => LookupResult::ok(identifier, target, payload),
            Err(reason) => {
                tracing::debug!(ip = %identifier, url = %target, "Lookup failed: {}", reason);
                let detail = format!("lookup of {} at {} failed: {}", identifier, target, reason);
                LookupResult::error(identifier, target, detail)
            }
        }
    }
}

/// Classifies a transport error
fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", error_chain(e))
    } else if e.is_connect() {
        format!("connection failed: {}", error_chain(e))
    } else {
        error_chain(e)
    }
}

/// Renders an error and all of its sources on one line
fn error_chain(e: &(dyn StdError + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_SNIPPET_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
        format!("{}...", head)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
