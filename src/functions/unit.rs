//! Handler unit capability interface
//!
//! A handler unit exposes up to one capability per HTTP verb. The registry
//! only ever talks to units through [`HandlerUnit`].

use hyper::Method;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP verbs a handler unit can export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Verb {
    /// Recognized verbs, in binding order
    pub const ALL: [Self; 5] = [Self::Get, Self::Post, Self::Patch, Self::Put, Self::Delete];

    /// Name of the exported capability function
    pub const fn export_name(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Patch => Method::PATCH,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }

    pub fn from_method(method: &Method) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.method() == *method)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method().as_str())
    }
}

/// Request envelope handed to a capability
#[derive(Debug, Clone, Default, Serialize)]
pub struct HandlerRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Value produced by a capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HandlerResponse {
    /// 200 response whose content type follows the body:
    /// JSON when it parses as JSON, plain text otherwise
    pub fn from_body(body: Vec<u8>) -> Self {
        let content_type = if serde_json::from_slice::<serde_json::Value>(&body).is_ok() {
            "application/json"
        } else {
            "text/plain; charset=utf-8"
        };
        Self {
            status: 200,
            content_type,
            body,
        }
    }
}

/// Failure raised by a capability while handling a request
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("endpoint '{endpoint}' does not export {verb}")]
    MissingCapability { endpoint: String, verb: Verb },
    #[error("handler trapped: {0}")]
    Trap(String),
    #[error("handler broke the calling convention: {0}")]
    Abi(String),
    #[error("handler task failed: {0}")]
    Join(String),
}

/// A loaded handler unit
pub trait HandlerUnit: Send + Sync {
    /// Endpoint name (file stem)
    fn name(&self) -> &str;

    /// Capabilities exported by this unit
    fn verbs(&self) -> &[Verb];

    /// Run one capability. Blocking; callers move this off the reactor.
    fn invoke(&self, verb: Verb, request: &HandlerRequest)
        -> Result<HandlerResponse, HandlerError>;
}
