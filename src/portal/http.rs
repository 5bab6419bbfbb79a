//! reqwest-backed portal client
//!
//! Provides the single-attempt HTTP client used for every portal call:
//! - fixed request timeout
//! - credential placed in a fixed header on every request
//! - static extra headers (origin, referer, proxy target)
//! - no internal retry; failures are returned as [`PortalError`]

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Method, PortalError, PortalResult, PortalTransport};
use crate::credential::Credential;
use crate::metrics::RequestTimer;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while building the client
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// Header name or value is not valid HTTP
    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    /// reqwest rejected the configuration
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// Single-attempt HTTP client for the vendor portal
pub struct PortalHttpClient {
    client: Client,
    base_url: String,
}

impl PortalHttpClient {
    /// Create a client for `base_url` (e.g. "<https://fcc.zepto.co.in>").
    ///
    /// # Arguments
    /// * `base_url` - Portal origin; request paths are appended to it
    /// * `credential` - Token placed in `auth_header` on every request
    /// * `auth_header` - Header carrying the credential (usually `authorization`)
    /// * `extra_headers` - Additional static headers
    /// * `timeout` - Bound for each request, connect included
    pub fn new(
        base_url: impl Into<String>,
        credential: &Credential,
        auth_header: &str,
        extra_headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, ClientBuildError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in extra_headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        let (name, mut value) = parse_header(auth_header, credential.header_value())?;
        value.set_sensitive(true);
        headers.insert(name, value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientBuildError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Portal origin requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ClientBuildError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ClientBuildError::InvalidHeader(name.to_string()))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|_| ClientBuildError::InvalidHeader(name.to_string()))?;
    Ok((header_name, header_value))
}

#[async_trait]
impl PortalTransport for PortalHttpClient {
    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> PortalResult<Value> {
        let url = self.url(path);
        let request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };

        debug!("{} {}", method, url);
        let timer = RequestTimer::start(match method {
            Method::Get => "GET",
            Method::Post => "POST",
        });

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                timer.finish(None);
                let cause = if e.is_timeout() {
                    format!("request timed out: {e}")
                } else {
                    e.to_string()
                };
                warn!("{} {} failed before a response: {}", method, url, cause);
                return Err(PortalError::Transport(cause));
            }
        };

        let status = response.status();
        timer.finish(Some(status.as_u16()));

        if status != reqwest::StatusCode::OK {
            let text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(PortalError::http(status.as_u16(), text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PortalError::Transport(format!("response body is not valid JSON: {e}")))
    }
}
