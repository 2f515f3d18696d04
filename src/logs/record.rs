//! Persisted log record types
//!
//! One `LogFile` per endpoint, serialized as `{"logs": [...]}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request state captured before the handler runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    /// Decoded body: form fields, JSON value, or null
    pub data: serde_json::Value,
}

/// Response state captured after the handler ran
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub headers: BTreeMap<String, String>,
    pub status_code: u16,
    /// Raw response body as text
    pub data: String,
}

/// One captured request/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
}

impl LogRecord {
    /// Build a record stamped with the current UTC instant
    pub fn now(method: &str, request: RequestSnapshot, response: ResponseSnapshot) -> Self {
        Self {
            timestamp: Utc::now(),
            method: method.to_string(),
            request,
            response,
        }
    }
}

/// On-disk structure of a log file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFile {
    #[serde(default)]
    pub logs: Vec<LogRecord>,
}
