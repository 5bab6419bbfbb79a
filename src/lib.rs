//! # Portal Harvest Library
//!
//! Harvests every record of several resource types from a vendor-portal API
//! that serves offset-paginated, date-filtered lists, and assembles them into
//! one multi-table report.
//!
//! ## Features
//!
//! - **Exhaustive pagination**: every list query is paged until the portal
//!   signals exhaustion, with a page budget against runaway loops
//! - **Date chunking**: resources that cap a query's span are split into
//!   contiguous, gap-free chunks
//! - **Partial-failure tolerance**: a failed chunk or detail lookup is logged
//!   and recorded; the run continues
//! - **Detail fan-out**: per-record detail lookups and nested log flattening
//! - **Gentle on the server**: one request in flight, paced requests, no retries
//!
//! ## Quick Start
//!
//! ```no_run
//! use portal_harvest::config::RunConfig;
//! use portal_harvest::credential::Credential;
//! use portal_harvest::harvest::HarvestDriver;
//! use portal_harvest::portal::PortalHttpClient;
//! use portal_harvest::report::{assemble, ReportSink, ZipCsvSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::default();
//! let plan = config.plan()?;
//! let client = PortalHttpClient::new(
//!     &config.base_url,
//!     &Credential::new("<token>"),
//!     &config.http.auth_header,
//!     &config.http.headers,
//!     config.timeout(),
//! )?;
//!
//! let outcome = HarvestDriver::new(&client).run(&plan).await?;
//! let artifact = assemble("acme", chrono::Utc::now(), outcome.tables);
//! let path = ZipCsvSink::new("reports").write(&artifact)?;
//! println!("{}", path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`window`] - Day-granular query windows and the date-window chunker
//! - [`portal`] - Transport seam, reqwest client and request pacing
//! - [`harvest`] - Resource catalog, page cursor, harvester, expander, driver
//! - [`report`] - Named tables, placeholder rows and the zip/CSV sink
//! - [`config`] - TOML configuration with command-line overrides
//! - [`credential`] - Opaque bearer credential with an expiry pre-flight
//! - [`metrics`] - Request and record metrics
//! - [`shutdown`] - Ctrl+C coordination
//! - [`cli`] - Command-line interface

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod config;
pub mod credential;
pub mod harvest;
pub mod metrics;
pub mod portal;
pub mod report;
pub mod shutdown;
pub mod window;

/// One record as returned by the portal: field name to JSON value, in the
/// order the fields arrived.
pub type Record = serde_json::Map<String, serde_json::Value>;
