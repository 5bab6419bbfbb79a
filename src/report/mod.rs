//! Report assembly and output
//!
//! Maps every harvested or expanded collection to a [`NamedTable`] and bundles
//! them into one [`ReportArtifact`]. Empty collections never disappear: they
//! become a single placeholder row so every expected table is present.
//!
//! # Architecture
//!
//! - [`assemble`] - Builds the artifact from ordered table inputs
//! - [`sink::ReportSink`] - Persists an artifact
//! - [`sink::ZipCsvSink`] - One zip holding a CSV per table and a manifest
//! - [`path`] - Artifact naming

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::harvest::RunSummary;
use crate::window::QueryWindow;
use crate::Record;

pub mod path;
pub mod sink;

pub use sink::{ReportSink, ZipCsvSink};

/// Column of the placeholder row for empty tables
pub const PLACEHOLDER_COLUMN: &str = "Message";

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Zip container error
    #[error("archive error: {0}")]
    ArchiveError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Every candidate file name was taken
    #[error("no free artifact name for {0} after {1} attempts")]
    NameExhausted(String, usize),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A named collection waiting to become a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableInput {
    /// Table name
    pub name: String,
    /// Noun used in the placeholder message
    pub label: String,
    /// Records in harvest order
    pub records: Vec<Record>,
}

impl TableInput {
    /// Create a table input
    pub fn new(name: impl Into<String>, label: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            records,
        }
    }
}

/// One table of the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedTable {
    /// Table name
    pub name: String,
    /// Column order: first-seen field order across all rows
    pub columns: Vec<String>,
    /// Rows in harvest order
    #[serde(skip)]
    pub rows: Vec<Record>,
    /// Whether the only row is the "no data" placeholder
    pub placeholder: bool,
}

impl NamedTable {
    /// Table holding `records` verbatim, or a placeholder row when empty
    pub fn from_input(input: TableInput) -> Self {
        if input.records.is_empty() {
            return Self::placeholder(input.name, &input.label);
        }
        Self {
            columns: column_union(&input.records),
            name: input.name,
            rows: input.records,
            placeholder: false,
        }
    }

    /// Single-row "no data found" table
    pub fn placeholder(name: impl Into<String>, label: &str) -> Self {
        let mut row = Map::new();
        row.insert(
            PLACEHOLDER_COLUMN.to_string(),
            Value::String(format!("No {label} data found")),
        );
        Self {
            name: name.into(),
            columns: vec![PLACEHOLDER_COLUMN.to_string()],
            rows: vec![row],
            placeholder: true,
        }
    }

    /// Rows as rendered cells, aligned with [`NamedTable::columns`]
    pub fn cells(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows.iter().map(|row| {
            self.columns
                .iter()
                .map(|column| row.get(column).map(render_cell).unwrap_or_default())
                .collect()
        })
    }

    /// Harvested records in this table (zero for placeholders)
    pub fn record_count(&self) -> usize {
        if self.placeholder {
            0
        } else {
            self.rows.len()
        }
    }
}

/// Everything one run produced, ready for a sink
#[derive(Debug, Clone, PartialEq)]
pub struct ReportArtifact {
    /// Vendor or account the data belongs to
    pub subject: String,
    /// When the artifact was generated
    pub generated_at: DateTime<Utc>,
    /// Query window, when known
    pub window: Option<QueryWindow>,
    /// Tables in report order
    pub tables: Vec<NamedTable>,
    /// Run summary, when known
    pub summary: Option<RunSummary>,
}

impl ReportArtifact {
    /// Attach the query window
    pub fn with_window(mut self, window: QueryWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Attach the run summary
    pub fn with_summary(mut self, summary: RunSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Look up a table by name
    pub fn table(&self, name: &str) -> Option<&NamedTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Base file name derived from subject and generation time
    pub fn file_name(&self) -> String {
        path::artifact_file_name(&self.subject, self.generated_at)
    }
}

/// Build the report artifact from ordered table inputs.
///
/// Table order follows `inputs`. Empty inputs become placeholder tables.
pub fn assemble(
    subject: impl Into<String>,
    generated_at: DateTime<Utc>,
    inputs: Vec<TableInput>,
) -> ReportArtifact {
    ReportArtifact {
        subject: subject.into(),
        generated_at,
        window: None,
        tables: inputs.into_iter().map(NamedTable::from_input).collect(),
        summary: None,
    }
}

/// Union of field names across `records`, in first-seen order
pub fn column_union(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Render one value as a flat cell
///
/// Nested arrays and objects are kept as compact JSON.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}
