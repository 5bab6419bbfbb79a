//! CLI error types and conversions

use chrono::{DateTime, Utc};

use crate::config::ConfigError;
use crate::harvest::HarvestError;
use crate::portal::http::ClientBuildError;
use crate::report::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Harvest error
    #[error("harvest error: {0}")]
    HarvestError(#[from] HarvestError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// HTTP client could not be built
    #[error("client error: {0}")]
    ClientError(#[from] ClientBuildError),

    /// No credential supplied
    #[error("no credential: pass --token or set PORTAL_TOKEN")]
    MissingCredential,

    /// Credential expired before the run started
    #[error("credential expired at {0}; obtain a fresh token")]
    CredentialExpired(DateTime<Utc>),

    /// Metrics exporter failed to start
    #[error("metrics error: {0}")]
    MetricsError(String),
}
