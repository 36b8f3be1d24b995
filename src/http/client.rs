/// HTTP client abstraction for the service under test.
use crate::error::AppError;
use crate::http::endpoint::Endpoint;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// HTTP methods used by the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// A request against one of the service endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Endpoint the request targets; also the metric tag.
    pub endpoint: Endpoint,
    /// Bearer token, if the endpoint requires one.
    pub bearer: Option<String>,
    /// JSON body for write calls.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a request without credentials or body.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            bearer: None,
            body: None,
        }
    }

    /// Attach a bearer token.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Json` if the payload cannot be serialized.
    pub fn with_json<T: Serialize>(mut self, payload: &T) -> Result<Self, AppError> {
        self.body = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn method(&self) -> HttpMethod {
        self.endpoint.method()
    }

    pub fn path(&self) -> &'static str {
        self.endpoint.path()
    }
}

/// Response metadata the workload inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
}

/// Trait for clients able to reach the service under test.
///
/// Any HTTP status is a successful `send`; only transport-level failures
/// (connection refused, timeout, broken body) are errors.
#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    /// Send a request and wait for the full response.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, AppError>;

    /// Base URL requests are resolved against.
    fn base_url(&self) -> &str;
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Additional headers
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(60),
            headers: Vec::new(),
        }
    }
}
