//! Paginated multi-resource harvesting engine
//!
//! The engine turns a window and a resource catalog into named record
//! collections:
//!
//! 1. **Catalog**: [`resource::ResourceQuerySpec`] describes each list endpoint
//! 2. **Pagination**: [`pagination::PageCursor`] pages one window to exhaustion
//! 3. **Chunking**: [`harvester::ResourceHarvester`] splits span-limited windows
//!    and concatenates chunk results
//! 4. **Expansion**: [`expander::DetailExpander`] fans out per-record lookups
//! 5. **Driving**: [`driver::HarvestDriver`] runs every resource sequentially
//!    and orders the resulting tables
//!
//! # Error Handling
//!
//! Page and detail failures are local: they end one pagination loop or skip one
//! record, and are recorded in [`summary::RunSummary`]. Only an invalid window
//! and a shutdown request surface as [`HarvestError`].

use std::time::Duration;

pub mod driver;
pub mod expander;
pub mod harvester;
pub mod pagination;
pub mod resource;
pub mod summary;

pub use driver::{HarvestDriver, HarvestOutcome, HarvestPlan};
pub use expander::{DetailExpander, Expansion};
pub use harvester::{ResourceHarvest, ResourceHarvester};
pub use pagination::{Page, PageCursor, PageFailure, PaginationOutcome};
pub use resource::{DetailSpec, ExpansionMode, LogFlattenSpec, ResourceKind, ResourceQuerySpec};
pub use summary::{ChunkReport, ExpansionReport, ResourceReport, RunSummary};

use crate::window::WindowError;

/// Default spacing between list page requests
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1000);

/// Default pause between date chunks
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(3000);

/// Default spacing between detail requests
pub const DEFAULT_DETAIL_DELAY: Duration = Duration::from_millis(500);

/// Fatal harvesting errors
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Window could not be chunked
    #[error("invalid window: {0}")]
    Window(#[from] WindowError),

    /// Shutdown was requested mid-run
    #[error("harvest interrupted by shutdown request")]
    Interrupted,
}

/// Delays applied between requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Minimum spacing between list page requests
    pub request_delay: Duration,
    /// Pause between consecutive date chunks of one resource
    pub chunk_delay: Duration,
    /// Minimum spacing between detail requests
    pub detail_delay: Duration,
}

impl Pacing {
    /// No delays at all; for tests and local fakes
    pub const fn immediate() -> Self {
        Self {
            request_delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            detail_delay: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            request_delay: DEFAULT_REQUEST_DELAY,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            detail_delay: DEFAULT_DETAIL_DELAY,
        }
    }
}
