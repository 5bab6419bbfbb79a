//! Opaque bearer credential supplied by the authentication collaborator
//!
//! The harvester never logs in, refreshes, or validates signatures. It only
//! carries the token into a fixed header and, before a long run, peeks at the
//! `exp` claim so an already-expired token fails fast instead of producing
//! thousands of 401s.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, warn};

/// Bearer-style credential, immutable for the duration of a run
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

/// Outcome of the expiry pre-flight check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    /// Token carries an expiry in the future
    Valid {
        /// Expiry instant
        expires_at: DateTime<Utc>,
    },
    /// Token expiry is in the past
    Expired {
        /// Expiry instant
        expired_at: DateTime<Utc>,
    },
    /// Token is not a decodable JWT or carries no `exp` claim
    Unknown,
}

impl Credential {
    /// Wrap a raw token. Surrounding whitespace is dropped.
    pub fn new(token: impl AsRef<str>) -> Self {
        Self {
            token: token.as_ref().trim().to_string(),
        }
    }

    /// Header value sent with every request
    pub fn header_value(&self) -> &str {
        &self.token
    }

    /// Whether the token is empty
    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }

    /// Decode the `exp` claim, if the token is a JWT that has one.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        let payload = self.token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| debug!("credential payload is not base64url: {e}"))
            .ok()?;
        let claims: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| debug!("credential payload is not JSON: {e}"))
            .ok()?;
        let exp = claims.get("exp")?.as_i64()?;
        DateTime::from_timestamp(exp, 0)
    }

    /// Compare the token's expiry against `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> CredentialStatus {
        match self.expiry() {
            Some(expires_at) if expires_at > now => CredentialStatus::Valid { expires_at },
            Some(expired_at) => CredentialStatus::Expired { expired_at },
            None => {
                warn!("Credential expiry could not be determined; assuming it is valid");
                CredentialStatus::Unknown
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &format_args!("<{} bytes>", self.token.len()))
            .finish()
    }
}
