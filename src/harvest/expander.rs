//! Detail/log expander
//!
//! Issues one GET per harvested record to the resource's detail endpoint. In
//! detail mode each detail record becomes a row; in log-flatten mode every entry
//! of a nested log array becomes its own row carrying a copy of a parent field.
//!
//! Records without an identifier are skipped silently. A failed lookup is logged
//! and skipped; the remaining records are still expanded.

use indicatif::ProgressBar;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::resource::{DetailSpec, ExpansionMode, LogFlattenSpec, DATA_ENVELOPE};
use super::summary::{DetailFailure, ExpansionReport, FailureNote};
use super::HarvestError;
use crate::metrics;
use crate::portal::{PortalTransport, RequestPacer};
use crate::shutdown::SharedShutdown;
use crate::Record;

/// Progress is logged every this many parent records
const PROGRESS_LOG_EVERY: usize = 10;

/// Rows and outcome report for one expansion
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// Output rows in parent order
    pub rows: Vec<Record>,
    /// Outcome report
    pub report: ExpansionReport,
}

/// Performs per-record detail lookups
pub struct DetailExpander<'a> {
    transport: &'a dyn PortalTransport,
    pacer: &'a RequestPacer,
    detail_delay: Duration,
    shutdown: Option<SharedShutdown>,
    progress: ProgressBar,
}

impl<'a> DetailExpander<'a> {
    /// Create an expander with a hidden progress bar
    pub fn new(
        transport: &'a dyn PortalTransport,
        pacer: &'a RequestPacer,
        detail_delay: Duration,
    ) -> Self {
        Self {
            transport,
            pacer,
            detail_delay,
            shutdown: None,
            progress: ProgressBar::hidden(),
        }
    }

    /// Stop between requests once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: Option<SharedShutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Drive `progress` while expanding
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Expand `parents` according to `spec`.
    ///
    /// # Errors
    /// Only [`HarvestError::Interrupted`]; lookup failures are reported in the
    /// returned [`ExpansionReport`].
    pub async fn expand(
        &self,
        spec: &DetailSpec,
        parents: &[Record],
    ) -> Result<Expansion, HarvestError> {
        let mut rows = Vec::new();
        let mut report = ExpansionReport {
            table: spec.table_name.to_string(),
            parents: parents.len(),
            ..Default::default()
        };

        if parents.is_empty() {
            info!(table = spec.table_name, "No {} records to expand", spec.parent);
            return Ok(Expansion { rows, report });
        }

        info!(
            table = spec.table_name,
            parents = parents.len(),
            "Fetching {} for {} {} records",
            spec.label,
            parents.len(),
            spec.parent
        );
        self.progress.reset();
        self.progress.set_length(parents.len() as u64);
        self.progress.set_message(spec.table_name);

        for (index, parent) in parents.iter().enumerate() {
            self.progress.inc(1);

            let Some(identifier) = identifier(parent, spec.id_field) else {
                debug!(
                    table = spec.table_name,
                    "Record {} has no {}, skipping",
                    index + 1,
                    spec.id_field
                );
                report.skipped_missing_id += 1;
                continue;
            };

            if self
                .shutdown
                .as_ref()
                .is_some_and(|shutdown| shutdown.is_shutdown_requested())
            {
                self.progress.abandon();
                return Err(HarvestError::Interrupted);
            }

            self.pacer.pace(self.detail_delay).await;
            report.attempted += 1;
            debug!(
                table = spec.table_name,
                identifier = %identifier,
                "Fetching detail ({}/{})",
                index + 1,
                parents.len()
            );

            match self.transport.get_json(&spec.path_for(&identifier)).await {
                Ok(body) => match body.get(DATA_ENVELOPE) {
                    Some(Value::Object(detail)) => match &spec.mode {
                        ExpansionMode::Detail => rows.push(detail.clone()),
                        ExpansionMode::LogFlatten(flatten) => {
                            rows.extend(flatten_logs(flatten, detail))
                        }
                    },
                    _ => {
                        warn!(
                            resource = %spec.parent,
                            table = spec.table_name,
                            identifier = %identifier,
                            "Detail response has no data record; skipping"
                        );
                        report.malformed += 1;
                    }
                },
                Err(error) => {
                    metrics::record_failure(spec.parent.as_str(), "detail");
                    warn!(
                        resource = %spec.parent,
                        table = spec.table_name,
                        identifier = %identifier,
                        status = ?error.status(),
                        "Detail request failed: {}",
                        error
                    );
                    report.failures.push(DetailFailure {
                        identifier,
                        failure: FailureNote::from(&error),
                    });
                }
            }

            if (index + 1) % PROGRESS_LOG_EVERY == 0 {
                info!(
                    table = spec.table_name,
                    "Progress: {}/{} {} records processed ({:.1}%)",
                    index + 1,
                    parents.len(),
                    spec.parent,
                    (index + 1) as f64 / parents.len() as f64 * 100.0
                );
            }
        }

        self.progress.finish_and_clear();
        report.rows = rows.len();
        info!(
            table = spec.table_name,
            rows = rows.len(),
            failed = report.failures.len(),
            skipped = report.skipped_missing_id,
            "Finished fetching {}",
            spec.label
        );

        Ok(Expansion { rows, report })
    }
}

/// Identifier used to address a record's detail endpoint.
///
/// Strings must be non-empty; numbers are rendered as-is. Anything else counts
/// as missing.
pub fn identifier(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Flatten the nested log array of one detail record into rows.
pub fn flatten_logs(spec: &LogFlattenSpec, detail: &Record) -> Vec<Record> {
    let parent_value = detail.get(spec.parent_field).cloned().unwrap_or(Value::Null);
    let Some(entries) = detail.get(spec.nested_key).and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| {
            let mut row = Map::new();
            row.insert(spec.parent_column.to_string(), parent_value.clone());
            for (source, column) in spec.columns {
                row.insert(
                    (*column).to_string(),
                    entry.get(*source).cloned().unwrap_or(Value::Null),
                );
            }
            row
        })
        .collect()
}
