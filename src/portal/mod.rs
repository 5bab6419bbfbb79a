//! Vendor-portal transport
//!
//! [`PortalTransport`] is the seam between the harvesting engine and the
//! network. One call is one request: no retries, no pacing. Callers pace
//! themselves through [`pacing::RequestPacer`] and decide what a failure means.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

pub mod http;
pub mod pacing;

pub use http::PortalHttpClient;
pub use pacing::RequestPacer;

/// Longest response body kept on an HTTP error, in characters
pub const MAX_ERROR_BODY_CHARS: usize = 512;

/// Failure of a single portal call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortalError {
    /// Non-200 response
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Raw body, truncated for diagnostics
        body: String,
    },

    /// Network failure, timeout, or an undecodable body
    #[error("transport error: {0}")]
    Transport(String),

    /// Pagination did not reach exhaustion within the page budget
    #[error("pagination stopped after {0} pages without exhaustion")]
    PageLimit(usize),
}

impl PortalError {
    /// Status code, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            PortalError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    /// Build an HTTP error, truncating the body.
    pub fn http(status: u16, body: impl AsRef<str>) -> Self {
        let body: String = body.as_ref().chars().take(MAX_ERROR_BODY_CHARS).collect();
        PortalError::Http { status, body }
    }
}

/// Result of one portal call: `Ok` carries the parsed JSON body
pub type PortalResult<T> = Result<T, PortalError>;

/// HTTP method used by the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Detail lookups
    Get,
    /// Filtered list queries
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

/// Issues a single request against the portal
#[async_trait]
pub trait PortalTransport: Send + Sync {
    /// Perform one request to `path` (relative to the portal base URL).
    ///
    /// Implementations must bound the call with a timeout and must not retry.
    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> PortalResult<Value>;

    /// POST a JSON body
    async fn post_json(&self, path: &str, body: &Value) -> PortalResult<Value> {
        self.call(Method::Post, path, Some(body)).await
    }

    /// GET without a body
    async fn get_json(&self, path: &str) -> PortalResult<Value> {
        self.call(Method::Get, path, None).await
    }
}
