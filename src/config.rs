//! Run configuration
//!
//! Loaded from an optional TOML file, overridden by command-line flags, then
//! validated before any request is made. Every field has a default, so an empty
//! file (or no file) reproduces a full fiscal-year run of every resource.
//!
//! # Example
//!
//! ```toml
//! subject = "acme-foods"
//! base_url = "https://fcc.zepto.co.in"
//! output_dir = "reports"
//!
//! [window]
//! start = "2024-04-01"
//! end = "2025-03-31"
//! utc_offset = "+05:30"
//!
//! [http]
//! timeout_secs = 30
//!
//! [pacing]
//! request_delay_ms = 1000
//! chunk_delay_ms = 3000
//! detail_delay_ms = 500
//!
//! [resources]
//! enabled = ["invoices", "grns"]
//! max_span_days = 90
//! grn_details = true
//!
//! # Per-resource settings fall back to the values above
//! [resources.invoices]
//! request_delay_ms = 0
//!
//! [resources.grns]
//! max_span_days = 60
//! page_limit = 50
//! ```
//!
//! The credential is never read from this file.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::harvest::resource::{DEFAULT_MAX_SPAN_DAYS, DEFAULT_PAGE_LIMIT};
use crate::harvest::{DetailSpec, HarvestPlan, Pacing, ResourceKind, ResourceQuerySpec};
use crate::window::{parse_date, parse_offset, QueryWindow, WindowError};

/// Default portal origin
pub const DEFAULT_BASE_URL: &str = "https://fcc.zepto.co.in";

/// Default first day of the window (fiscal year start)
pub const DEFAULT_WINDOW_START: &str = "2024-04-01";

/// Default last day of the window (fiscal year end)
pub const DEFAULT_WINDOW_END: &str = "2025-03-31";

/// Default header carrying the credential
pub const DEFAULT_AUTH_HEADER: &str = "authorization";

/// Portal front-end origin sent as `origin`/`referer`
pub const DEFAULT_PORTAL_ORIGIN: &str = "https://brands.zepto.co.in";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {message}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        message: String,
    },

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Window bounds or offset are invalid
    #[error(transparent)]
    Window(#[from] WindowError),

    /// Page limit of zero
    #[error("page_limit must be at least 1")]
    ZeroPageLimit,

    /// Span limit of zero
    #[error("max_span_days must be at least 1")]
    ZeroSpan,

    /// Request timeout of zero
    #[error("http.timeout_secs must be at least 1")]
    ZeroTimeout,

    /// Resource name not in the catalog
    #[error("{0}")]
    UnknownResource(String),

    /// Empty resource selection
    #[error("no resources selected")]
    NoResources,

    /// Base URL is not http(s)
    #[error("base_url must start with http:// or https://, got '{0}'")]
    InvalidBaseUrl(String),
}

/// Query window section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    /// First day, `YYYY-MM-DD`
    pub start: String,
    /// Last day, `YYYY-MM-DD`
    pub end: String,
    /// Reference offset for day boundaries, `+HH:MM`
    pub utc_offset: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: DEFAULT_WINDOW_START.to_string(),
            end: DEFAULT_WINDOW_END.to_string(),
            utc_offset: "+00:00".to_string(),
        }
    }
}

/// HTTP section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Header carrying the credential
    pub auth_header: String,
    /// Extra static headers
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("origin".to_string(), DEFAULT_PORTAL_ORIGIN.to_string());
        headers.insert("referer".to_string(), format!("{DEFAULT_PORTAL_ORIGIN}/"));
        Self {
            timeout_secs: 30,
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            headers,
        }
    }
}

/// Pacing section, all values in milliseconds
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    /// Spacing between list page requests
    pub request_delay_ms: u64,
    /// Pause between date chunks
    pub chunk_delay_ms: u64,
    /// Spacing between detail requests
    pub detail_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
            chunk_delay_ms: 3000,
            detail_delay_ms: 500,
        }
    }
}

impl From<PacingConfig> for Pacing {
    fn from(config: PacingConfig) -> Self {
        Self {
            request_delay: Duration::from_millis(config.request_delay_ms),
            chunk_delay: Duration::from_millis(config.chunk_delay_ms),
            detail_delay: Duration::from_millis(config.detail_delay_ms),
        }
    }
}

/// Settings for one resource, each falling back to the section-wide value
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceOverride {
    /// Records per page
    pub page_limit: Option<u32>,
    /// Span limit; also chunks resources without a portal-imposed limit
    pub max_span_days: Option<u32>,
    /// Spacing between this resource's list page requests
    pub request_delay_ms: Option<u64>,
}

/// Resource selection section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ResourcesConfig {
    /// Resource names to harvest
    pub enabled: Vec<String>,
    /// Records per page
    pub page_limit: u32,
    /// Span limit applied to span-constrained resources
    pub max_span_days: u32,
    /// Fetch one detail record per GRN
    pub grn_details: bool,
    /// Fetch and flatten payment-advice logs
    pub advice_logs: bool,
    /// `[resources.invoices]`
    pub invoices: Option<ResourceOverride>,
    /// `[resources.settlements]`
    pub settlements: Option<ResourceOverride>,
    /// `[resources.payment_advice]`
    pub payment_advice: Option<ResourceOverride>,
    /// `[resources.grns]`
    pub grns: Option<ResourceOverride>,
    /// `[resources.returns]`
    pub returns: Option<ResourceOverride>,
}

impl ResourcesConfig {
    /// Per-resource settings for `kind`, if configured
    pub fn override_for(&self, kind: ResourceKind) -> Option<&ResourceOverride> {
        match kind {
            ResourceKind::Invoices => self.invoices.as_ref(),
            ResourceKind::Settlements => self.settlements.as_ref(),
            ResourceKind::PaymentAdvice => self.payment_advice.as_ref(),
            ResourceKind::Grns => self.grns.as_ref(),
            ResourceKind::Returns => self.returns.as_ref(),
        }
    }

    /// Catalog spec for `kind` with section-wide and per-resource settings applied
    pub fn spec_for(&self, kind: ResourceKind) -> ResourceQuerySpec {
        let mut spec = kind
            .spec()
            .with_page_limit(self.page_limit)
            .with_max_span_days(self.max_span_days);
        if let Some(settings) = self.override_for(kind) {
            if let Some(page_limit) = settings.page_limit {
                spec = spec.with_page_limit(page_limit);
            }
            if let Some(days) = settings.max_span_days {
                spec = spec.with_span_limit(days);
            }
            if let Some(delay_ms) = settings.request_delay_ms {
                spec = spec.with_request_delay(Duration::from_millis(delay_ms));
            }
        }
        spec
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            enabled: ResourceKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            page_limit: DEFAULT_PAGE_LIMIT,
            max_span_days: DEFAULT_MAX_SPAN_DAYS,
            grn_details: true,
            advice_logs: true,
            invoices: None,
            settlements: None,
            payment_advice: None,
            grns: None,
            returns: None,
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Vendor/account identifier used in the artifact name
    pub subject: String,
    /// Portal origin
    pub base_url: String,
    /// Directory the artifact is written to
    pub output_dir: PathBuf,
    /// Query window
    pub window: WindowConfig,
    /// HTTP settings
    pub http: HttpConfig,
    /// Request pacing
    pub pacing: PacingConfig,
    /// Resource selection
    pub resources: ResourcesConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            subject: "vendor".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from("."),
            window: WindowConfig::default(),
            http: HttpConfig::default(),
            pacing: PacingConfig::default(),
            resources: ResourcesConfig::default(),
        }
    }
}

/// Command-line overrides, applied on top of the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Replace `subject`
    pub subject: Option<String>,
    /// Replace `window.start`
    pub from: Option<String>,
    /// Replace `window.end`
    pub to: Option<String>,
    /// Replace `window.utc_offset`
    pub utc_offset: Option<String>,
    /// Replace `resources.enabled` when non-empty
    pub only: Vec<ResourceKind>,
    /// Replace `output_dir`
    pub output_dir: Option<PathBuf>,
    /// Replace `base_url`
    pub base_url: Option<String>,
    /// Disable both expansions
    pub no_details: bool,
}

impl RunConfig {
    /// Load a config file
    ///
    /// # Errors
    /// [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(subject) = overrides.subject {
            self.subject = subject;
        }
        if let Some(from) = overrides.from {
            self.window.start = from;
        }
        if let Some(to) = overrides.to {
            self.window.end = to;
        }
        if let Some(offset) = overrides.utc_offset {
            self.window.utc_offset = offset;
        }
        if !overrides.only.is_empty() {
            self.resources.enabled = overrides.only.iter().map(|k| k.as_str().to_string()).collect();
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if overrides.no_details {
            self.resources.grn_details = false;
            self.resources.advice_logs = false;
        }
    }

    /// Check every field that could make a run fail before the first request
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window()?;
        self.resource_kinds()?;
        if self.resources.page_limit == 0 {
            return Err(ConfigError::ZeroPageLimit);
        }
        if self.resources.max_span_days == 0 {
            return Err(ConfigError::ZeroSpan);
        }
        for kind in ResourceKind::ALL {
            let Some(settings) = self.resources.override_for(kind) else {
                continue;
            };
            if settings.page_limit == Some(0) {
                return Err(ConfigError::ZeroPageLimit);
            }
            if settings.max_span_days == Some(0) {
                return Err(ConfigError::ZeroSpan);
            }
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(())
    }

    /// Query window described by the `[window]` section
    pub fn window(&self) -> Result<QueryWindow, ConfigError> {
        let first = parse_date(&self.window.start)?;
        let last = parse_date(&self.window.end)?;
        let offset = parse_offset(&self.window.utc_offset)?;
        Ok(QueryWindow::new(first, last, offset)?)
    }

    /// Selected resources in canonical order, without duplicates
    pub fn resource_kinds(&self) -> Result<Vec<ResourceKind>, ConfigError> {
        let mut kinds = self
            .resources
            .enabled
            .iter()
            .map(|name| name.parse::<ResourceKind>().map_err(ConfigError::UnknownResource))
            .collect::<Result<Vec<_>, _>>()?;
        kinds.sort();
        kinds.dedup();
        if kinds.is_empty() {
            return Err(ConfigError::NoResources);
        }
        Ok(kinds)
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Build the harvest plan, validating first
    pub fn plan(&self) -> Result<HarvestPlan, ConfigError> {
        self.validate()?;
        let window = self.window()?;
        let resources = self
            .resource_kinds()?
            .into_iter()
            .map(|kind| self.resources.spec_for(kind))
            .collect();

        let mut expansions = Vec::new();
        if self.resources.grn_details {
            expansions.push(DetailSpec::grn_details());
        }
        if self.resources.advice_logs {
            expansions.push(DetailSpec::payment_advice_logs());
        }

        Ok(HarvestPlan {
            window,
            resources,
            expansions,
            pacing: self.pacing.into(),
        })
    }
}
