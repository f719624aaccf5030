//! Request gateway to the panel backend.
//!
//! Every call to the backend goes through [`Gateway::request`]. The gateway
//! never fails: transport problems (unreachable host, I/O errors, bodies that
//! are not JSON) are folded into the uniform
//! `{ "success": false, "error": "network error" }` response, so callers only
//! ever inspect an [`ApiResponse`]. Retry policy belongs to the caller.

pub mod http;

pub use http::HttpGateway;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{PanelError, NETWORK_ERROR};

/// Backend endpoint paths.
pub mod paths {
    pub const AGENT_START: &str = "/api/agent/start";
    pub const AGENT_STOP: &str = "/api/agent/stop";
    pub const AGENT_STATUS: &str = "/api/agent/status";

    pub const BROWSER_CONNECT: &str = "/api/browser/connect";
    pub const BROWSER_DISCONNECT: &str = "/api/browser/disconnect";
    pub const BROWSER_STATUS: &str = "/api/browser/status";
    pub const BROWSER_PROFILES: &str = "/api/browser/profiles";
    pub const BROWSER_START: &str = "/api/browser/start";

    pub const TELEGRAM_STATUS: &str = "/api/telegram/status";
    pub const TELEGRAM_CONNECT: &str = "/api/telegram/connect";
    pub const TELEGRAM_DISCONNECT: &str = "/api/telegram/disconnect";

    pub const COMMAND: &str = "/api/command";
    pub const COMMAND_HISTORY: &str = "/api/command/history";

    pub const SETTINGS: &str = "/api/settings";

    pub const LOGIN: &str = "/api/login";
}

/// HTTP method of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// A backend path plus optional query pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
    query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Append a query pair. Values are encoded by the transport.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }
}

impl From<&str> for Endpoint {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// Parsed backend response.
///
/// The JSON body is kept verbatim. A response produced by a transport
/// failure carries the uniform network-error body and is flagged so state
/// machines can tell "the backend said no" from "we never heard back".
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    body: Value,
    transport_failure: bool,
}

impl ApiResponse {
    pub fn from_json(body: Value) -> Self {
        Self {
            body,
            transport_failure: false,
        }
    }

    /// The uniform transport-failure response.
    pub fn network_error() -> Self {
        Self {
            body: json!({ "success": false, "error": NETWORK_ERROR }),
            transport_failure: true,
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.transport_failure
    }

    /// The backend's own `success` flag. Missing or non-boolean counts as false.
    pub fn is_success(&self) -> bool {
        self.body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_object(&self) -> bool {
        self.body.is_object()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    /// The backend's `error` message, if it sent a non-empty one.
    pub fn error(&self) -> Option<&str> {
        self.str_field("error").filter(|msg| !msg.is_empty())
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Classify the response for an operation that expects `success: true`.
    pub fn into_result(self, fallback: &str) -> Result<ApiResponse, PanelError> {
        if self.transport_failure {
            return Err(PanelError::Transport);
        }
        if !self.is_object() {
            return Err(PanelError::UnexpectedResponse(format!(
                "expected a JSON object, got {}",
                self.body
            )));
        }
        if !self.is_success() {
            let message = self.error().unwrap_or(fallback).to_string();
            return Err(PanelError::Backend(message));
        }
        Ok(self)
    }
}

impl From<Value> for ApiResponse {
    fn from(body: Value) -> Self {
        Self::from_json(body)
    }
}

/// Uniform async access to the backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn request(&self, endpoint: Endpoint, method: Method, body: Option<Value>)
        -> ApiResponse;
}

pub type SharedGateway = Arc<dyn Gateway>;
