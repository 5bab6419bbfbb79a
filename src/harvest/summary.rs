//! Run summary
//!
//! Failures never abort a harvest, so the summary is where gaps become visible:
//! per-resource record counts, every chunk that stopped early, and every detail
//! lookup that failed. It is logged at the end of a run and embedded in the
//! report manifest.

use serde::Serialize;
use tracing::{info, warn};

use super::pagination::PageFailure;
use super::resource::ResourceKind;
use crate::portal::PortalError;
use crate::window::QueryWindow;

/// Why a chunk or detail lookup failed, in serialisable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureNote {
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    /// Human-readable reason
    pub reason: String,
}

impl From<&PortalError> for FailureNote {
    fn from(error: &PortalError) -> Self {
        Self {
            status: error.status(),
            reason: error.to_string(),
        }
    }
}

/// Outcome of paginating one chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkReport {
    /// Zero-based position within the resource's chunk plan
    pub index: usize,
    /// Chunk bounds
    pub window: QueryWindow,
    /// Records collected from this chunk
    pub records: usize,
    /// Successful pages
    pub pages: usize,
    /// Pages with an unexpected body shape
    pub malformed_pages: usize,
    /// Offset that failed, if pagination stopped early
    pub failed_offset: Option<u64>,
    /// Failure detail, if pagination stopped early
    pub failure: Option<FailureNote>,
}

impl ChunkReport {
    /// Whether this chunk was cut short by a failure or a malformed page
    pub fn is_incomplete(&self) -> bool {
        self.failure.is_some() || self.malformed_pages > 0
    }

    pub(crate) fn record_failure(&mut self, failure: &PageFailure) {
        self.failed_offset = Some(failure.offset);
        self.failure = Some(FailureNote::from(&failure.error));
    }
}

/// Outcome of harvesting one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceReport {
    /// Resource harvested
    pub resource: ResourceKind,
    /// Total records collected
    pub records: usize,
    /// Per-chunk outcomes, in window order
    pub chunks: Vec<ChunkReport>,
}

impl ResourceReport {
    /// Chunks that stopped early
    pub fn incomplete_chunks(&self) -> impl Iterator<Item = &ChunkReport> {
        self.chunks.iter().filter(|chunk| chunk.is_incomplete())
    }

    /// Whether every chunk reached exhaustion
    pub fn is_complete(&self) -> bool {
        self.incomplete_chunks().next().is_none()
    }
}

/// A detail lookup that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailFailure {
    /// Identifier that was looked up
    pub identifier: String,
    /// Failure detail
    pub failure: FailureNote,
}

/// Outcome of one detail/log expansion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionReport {
    /// Output table
    pub table: String,
    /// Parent records considered
    pub parents: usize,
    /// Detail requests issued
    pub attempted: usize,
    /// Rows emitted
    pub rows: usize,
    /// Parents without an identifier (not failures)
    pub skipped_missing_id: usize,
    /// 200 responses without a usable detail record
    pub malformed: usize,
    /// Failed lookups
    pub failures: Vec<DetailFailure>,
}

impl ExpansionReport {
    /// Whether any lookup failed or came back without a detail record
    pub fn has_gaps(&self) -> bool {
        !self.failures.is_empty() || self.malformed > 0
    }
}

/// Summary of a whole harvesting run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Per-resource outcomes, in harvesting order
    pub resources: Vec<ResourceReport>,
    /// Per-expansion outcomes, in harvesting order
    pub expansions: Vec<ExpansionReport>,
}

impl RunSummary {
    /// Whether any chunk or detail lookup failed or returned a malformed body
    pub fn has_gaps(&self) -> bool {
        self.resources.iter().any(|r| !r.is_complete())
            || self.expansions.iter().any(ExpansionReport::has_gaps)
    }

    /// Log per-resource counts and every gap
    pub fn log(&self) {
        info!("Run summary:");
        for report in &self.resources {
            info!(
                resource = %report.resource,
                records = report.records,
                chunks = report.chunks.len(),
                "  {}: {} records",
                report.resource.table_name(),
                report.records
            );
            for chunk in report.incomplete_chunks() {
                if chunk.failure.is_some() {
                    warn!(
                        resource = %report.resource,
                        chunk = chunk.index + 1,
                        window = %chunk.window,
                        offset = ?chunk.failed_offset,
                        status = ?chunk.failure.as_ref().and_then(|f| f.status),
                        "  incomplete chunk: kept {} records before failing",
                        chunk.records
                    );
                }
                if chunk.malformed_pages > 0 {
                    warn!(
                        resource = %report.resource,
                        chunk = chunk.index + 1,
                        window = %chunk.window,
                        malformed_pages = chunk.malformed_pages,
                        "  incomplete chunk: pagination ended on a malformed page after {} records",
                        chunk.records
                    );
                }
            }
        }
        for expansion in &self.expansions {
            info!(
                table = %expansion.table,
                rows = expansion.rows,
                attempted = expansion.attempted,
                skipped = expansion.skipped_missing_id,
                "  {}: {} rows",
                expansion.table,
                expansion.rows
            );
            if !expansion.failures.is_empty() {
                warn!(
                    table = %expansion.table,
                    failed = expansion.failures.len(),
                    "  {} detail lookups failed",
                    expansion.failures.len()
                );
            }
            if expansion.malformed > 0 {
                warn!(
                    table = %expansion.table,
                    malformed = expansion.malformed,
                    "  {} detail responses had no data record",
                    expansion.malformed
                );
            }
        }
        if self.has_gaps() {
            warn!("Run finished with gaps; re-run the slices listed above");
        }
    }
}
