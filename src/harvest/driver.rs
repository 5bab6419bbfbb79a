//! Harvesting driver
//!
//! Runs every selected resource one after another over a single transport,
//! then feeds the harvested collections of GRNs and payment advice into their
//! expansions. Expansions never re-harvest their parent resource.
//!
//! The output is an ordered list of table inputs in the fixed report order:
//! invoices, settlements, payment advice, GRNs, GRN details, advice logs,
//! returns.

use indicatif::ProgressBar;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::expander::DetailExpander;
use super::harvester::ResourceHarvester;
use super::resource::{DetailSpec, ResourceKind, ResourceQuerySpec};
use super::summary::RunSummary;
use super::{HarvestError, Pacing};
use crate::portal::{PortalTransport, RequestPacer};
use crate::report::TableInput;
use crate::shutdown::SharedShutdown;
use crate::window::QueryWindow;
use crate::Record;

/// One slot in the report's table order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableSlot {
    Resource(ResourceKind),
    Expansion(ResourceKind),
}

const TABLE_ORDER: [TableSlot; 7] = [
    TableSlot::Resource(ResourceKind::Invoices),
    TableSlot::Resource(ResourceKind::Settlements),
    TableSlot::Resource(ResourceKind::PaymentAdvice),
    TableSlot::Resource(ResourceKind::Grns),
    TableSlot::Expansion(ResourceKind::Grns),
    TableSlot::Expansion(ResourceKind::PaymentAdvice),
    TableSlot::Resource(ResourceKind::Returns),
];

/// What to harvest and how
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestPlan {
    /// Overall query window
    pub window: QueryWindow,
    /// Resources to harvest; run in canonical order regardless of list order
    pub resources: Vec<ResourceQuerySpec>,
    /// Expansions to run on harvested collections
    pub expansions: Vec<DetailSpec>,
    /// Request pacing
    pub pacing: Pacing,
}

impl HarvestPlan {
    /// Every resource and expansion with catalog defaults
    pub fn full(window: QueryWindow) -> Self {
        Self {
            window,
            resources: ResourceKind::ALL.iter().map(ResourceKind::spec).collect(),
            expansions: vec![DetailSpec::grn_details(), DetailSpec::payment_advice_logs()],
            pacing: Pacing::default(),
        }
    }

    /// Replace the pacing
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Chunk sequence per resource, in harvesting order
    pub fn chunk_plan(&self) -> Result<Vec<(ResourceKind, Vec<QueryWindow>)>, HarvestError> {
        self.ordered_resources()
            .into_iter()
            .map(|spec| Ok((spec.kind, ResourceHarvester::plan(spec, &self.window)?)))
            .collect()
    }

    fn ordered_resources(&self) -> Vec<&ResourceQuerySpec> {
        let mut ordered: Vec<&ResourceQuerySpec> = self.resources.iter().collect();
        ordered.sort_by_key(|spec| spec.kind);
        ordered.dedup_by_key(|spec| spec.kind);
        ordered
    }
}

/// Tables and summary produced by one run
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestOutcome {
    /// Table inputs in report order
    pub tables: Vec<TableInput>,
    /// Per-resource and per-expansion outcomes
    pub summary: RunSummary,
}

/// Runs a [`HarvestPlan`] against one transport
pub struct HarvestDriver<'a> {
    transport: &'a dyn PortalTransport,
    pacer: RequestPacer,
    shutdown: Option<SharedShutdown>,
    progress: ProgressBar,
}

impl<'a> HarvestDriver<'a> {
    /// Create a driver
    pub fn new(transport: &'a dyn PortalTransport) -> Self {
        Self {
            transport,
            pacer: RequestPacer::new(),
            shutdown: None,
            progress: ProgressBar::hidden(),
        }
    }

    /// Stop at the next request boundary once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: Option<SharedShutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Progress bar driven during detail fan-out
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run the plan to completion.
    ///
    /// # Errors
    /// [`HarvestError::Interrupted`] on shutdown, [`HarvestError::Window`] if a
    /// span limit cannot chunk the window. Request failures are recorded in the
    /// summary instead.
    pub async fn run(&self, plan: &HarvestPlan) -> Result<HarvestOutcome, HarvestError> {
        let mut summary = RunSummary::default();
        let mut harvested: BTreeMap<ResourceKind, Vec<Record>> = BTreeMap::new();
        let mut expanded: BTreeMap<ResourceKind, (&DetailSpec, Vec<Record>)> = BTreeMap::new();

        let harvester = ResourceHarvester::new(self.transport, &self.pacer, plan.pacing)
            .with_shutdown(self.shutdown.clone());

        for spec in plan.ordered_resources() {
            let harvest = harvester.harvest(spec, &plan.window).await?;
            summary.resources.push(harvest.report);
            harvested.insert(spec.kind, harvest.records);
        }

        let expander = DetailExpander::new(self.transport, &self.pacer, plan.pacing.detail_delay)
            .with_shutdown(self.shutdown.clone())
            .with_progress(self.progress.clone());

        for detail in &plan.expansions {
            let Some(parents) = harvested.get(&detail.parent) else {
                debug!(
                    table = detail.table_name,
                    "{} were not harvested, skipping expansion",
                    detail.parent.table_name()
                );
                continue;
            };
            let expansion = expander.expand(detail, parents).await?;
            summary.expansions.push(expansion.report);
            expanded.insert(detail.parent, (detail, expansion.rows));
        }

        let mut tables = Vec::new();
        for slot in TABLE_ORDER {
            match slot {
                TableSlot::Resource(kind) => {
                    if let Some(records) = harvested.remove(&kind) {
                        tables.push(TableInput::new(kind.table_name(), kind.label(), records));
                    }
                }
                TableSlot::Expansion(parent) => {
                    if let Some((detail, rows)) = expanded.remove(&parent) {
                        tables.push(TableInput::new(detail.table_name, detail.label, rows));
                    }
                }
            }
        }

        info!(tables = tables.len(), "Harvest finished");
        Ok(HarvestOutcome { tables, summary })
    }
}
