//! Lookup records and their line-delimited JSON encoding
//!
//! Every submitted identifier produces exactly one `LookupResult`. On the wire
//! a record is a flat JSON object carrying `ip` and `url`, plus either the
//! remote service's fields or an `error` string.

use serde_json::{Map, Value};

/// Key holding the identifier in an output record
pub const IP_FIELD: &str = "ip";

/// Key holding the resolved lookup target in an output record
pub const URL_FIELD: &str = "url";

/// Key holding diagnostic text for a failed lookup
pub const ERROR_FIELD: &str = "error";

/// Outcome of a single lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LookupStatus {
    /// Fields returned by the remote service, passed through untouched
    Ok(Map<String, Value>),

    /// Diagnostic text describing why the lookup failed
    Error(String),
}

/// One enriched record per submitted identifier
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    /// The identifier that was looked up
    pub identifier: String,

    /// The URL the lookup was sent to
    pub request_target: String,

    /// Remote payload or error detail
    pub status: LookupStatus,
}

impl LookupResult {
    /// Creates a successful result
    pub fn ok(
        identifier: impl Into<String>,
        request_target: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            request_target: request_target.into(),
            status: LookupStatus::Ok(payload),
        }
    }

    /// Creates a failed result
    pub fn error(
        identifier: impl Into<String>,
        request_target: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            request_target: request_target.into(),
            status: LookupStatus::Error(detail.into()),
        }
    }

    /// Returns true if the lookup failed
    pub fn is_error(&self) -> bool {
        matches!(self.status, LookupStatus::Error(_))
    }

    /// Builds the flat JSON object written to the sink
    ///
    /// `ip` and `url` always reflect this record, even if the remote
    /// payload carries keys with the same names.
    pub fn to_json(&self) -> Value {
        let mut object = match &self.status {
            LookupStatus::Ok(payload) => payload.clone(),
            LookupStatus::Error(detail) => {
                let mut object = Map::new();
                object.insert(ERROR_FIELD.to_string(), Value::String(detail.clone()));
                object
            }
        };

        object.insert(IP_FIELD.to_string(), Value::String(self.identifier.clone()));
        object.insert(
            URL_FIELD.to_string(),
            Value::String(self.request_target.clone()),
        );

        Value::Object(object)
    }

    /// Encodes the record as one complete line, newline included
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(&self.to_json())?;
        line.push('\n');
        Ok(line)
    }
}
