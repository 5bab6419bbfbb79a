//! Resource harvester
//!
//! Composes the chunker and the page cursor for one resource. Span-limited
//! resources are paged chunk by chunk with a cool-down between chunks; all
//! other resources are paged once over the whole window. A chunk that fails is
//! recorded and skipped; the next chunk still runs.

use tracing::{info, warn};

use super::pagination::PageCursor;
use super::resource::ResourceQuerySpec;
use super::summary::{ChunkReport, ResourceReport};
use super::{HarvestError, Pacing};
use crate::metrics;
use crate::portal::{PortalTransport, RequestPacer};
use crate::shutdown::SharedShutdown;
use crate::window::{chunk_window, QueryWindow};
use crate::Record;

/// Records and per-chunk outcomes for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceHarvest {
    /// Records in chunk order, then page order
    pub records: Vec<Record>,
    /// Outcome report
    pub report: ResourceReport,
}

/// Harvests one resource at a time over a shared transport
pub struct ResourceHarvester<'a> {
    transport: &'a dyn PortalTransport,
    pacer: &'a RequestPacer,
    pacing: Pacing,
    shutdown: Option<SharedShutdown>,
}

impl<'a> ResourceHarvester<'a> {
    /// Create a harvester
    pub fn new(transport: &'a dyn PortalTransport, pacer: &'a RequestPacer, pacing: Pacing) -> Self {
        Self {
            transport,
            pacer,
            pacing,
            shutdown: None,
        }
    }

    /// Stop between requests once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: Option<SharedShutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Plan the chunks `spec` will be queried over
    pub fn plan(spec: &ResourceQuerySpec, window: &QueryWindow) -> Result<Vec<QueryWindow>, HarvestError> {
        match spec.max_span_days {
            Some(span) => Ok(chunk_window(window, span)?),
            None => Ok(vec![*window]),
        }
    }

    /// Harvest every record of `spec` inside `window`.
    ///
    /// # Errors
    /// Returns [`HarvestError::Window`] if the span limit is invalid and
    /// [`HarvestError::Interrupted`] on shutdown. Page failures are not errors;
    /// they show up as incomplete chunks in the report.
    pub async fn harvest(
        &self,
        spec: &ResourceQuerySpec,
        window: &QueryWindow,
    ) -> Result<ResourceHarvest, HarvestError> {
        let chunks = Self::plan(spec, window)?;
        info!(
            resource = %spec.kind,
            window = %window,
            chunks = chunks.len(),
            "Harvesting {}",
            spec.kind.table_name()
        );
        if chunks.len() > 1 {
            for (index, chunk) in chunks.iter().enumerate() {
                info!(resource = %spec.kind, "  Chunk {}: {}", index + 1, chunk);
            }
        }

        let mut records = Vec::new();
        let mut reports = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            let outcome = PageCursor::new(self.transport, self.pacer, spec, *chunk)
                .with_request_delay(spec.request_delay.unwrap_or(self.pacing.request_delay))
                .with_shutdown(self.shutdown.clone())
                .drain()
                .await;

            if outcome.interrupted {
                return Err(HarvestError::Interrupted);
            }

            let mut report = ChunkReport {
                index,
                window: *chunk,
                records: outcome.records.len(),
                pages: outcome.pages,
                malformed_pages: outcome.malformed_pages,
                failed_offset: None,
                failure: None,
            };

            match &outcome.failure {
                Some(failure) => {
                    metrics::record_failure(spec.kind.as_str(), "page");
                    warn!(
                        resource = %spec.kind,
                        chunk = index + 1,
                        window = %chunk,
                        offset = failure.offset,
                        "Chunk {}/{} incomplete after {} records: {}",
                        index + 1,
                        chunks.len(),
                        outcome.records.len(),
                        failure.error
                    );
                    report.record_failure(failure);
                }
                None => {
                    info!(
                        resource = %spec.kind,
                        chunk = index + 1,
                        "Chunk {}/{} finished: {} records in {} pages",
                        index + 1,
                        chunks.len(),
                        outcome.records.len(),
                        outcome.pages
                    );
                }
            }

            records.extend(outcome.records);
            reports.push(report);

            if index + 1 < chunks.len() {
                info!(
                    resource = %spec.kind,
                    "Waiting {:?} before the next chunk",
                    self.pacing.chunk_delay
                );
                match &self.shutdown {
                    Some(shutdown) => {
                        tokio::select! {
                            _ = self.pacer.cool_down(self.pacing.chunk_delay) => {}
                            _ = shutdown.wait_for_shutdown() => return Err(HarvestError::Interrupted),
                        }
                    }
                    None => self.pacer.cool_down(self.pacing.chunk_delay).await,
                }
            }
        }

        metrics::record_harvested(spec.kind.as_str(), records.len());
        info!(
            resource = %spec.kind,
            records = records.len(),
            "Finished {}: {} records across {} chunks",
            spec.kind.table_name(),
            records.len(),
            chunks.len()
        );

        Ok(ResourceHarvest {
            report: ResourceReport {
                resource: spec.kind,
                records: records.len(),
                chunks: reports,
            },
            records,
        })
    }
}
