//! Report sinks
//!
//! [`ZipCsvSink`] writes one zip per run. Each table is its own CSV entry, in
//! report order, followed by `manifest.json` describing the tables (row count,
//! columns, placeholder flag, SHA-256 of the CSV) and the run summary.
//!
//! The zip is written to a temp file in the output directory, synced, then
//! moved into place without replacing anything that already exists.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::path::candidate_path;
use super::{NamedTable, OutputError, OutputResult, ReportArtifact};
use crate::harvest::RunSummary;
use crate::window::QueryWindow;

/// Name of the manifest entry inside the zip
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Attempts at finding a free artifact name
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Destination for a finished report
pub trait ReportSink {
    /// Persist `artifact`, returning where it was written
    fn write(&self, artifact: &ReportArtifact) -> OutputResult<PathBuf>;
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    subject: &'a str,
    generated_at: String,
    window: Option<&'a QueryWindow>,
    tables: Vec<ManifestTable<'a>>,
    summary: Option<&'a RunSummary>,
}

#[derive(Debug, Serialize)]
struct ManifestTable<'a> {
    name: &'a str,
    entry: String,
    rows: usize,
    columns: &'a [String],
    placeholder: bool,
    sha256: String,
}

/// Writes a zip of CSV tables plus a manifest
#[derive(Debug, Clone)]
pub struct ZipCsvSink {
    output_dir: PathBuf,
}

impl ZipCsvSink {
    /// Create a sink writing into `output_dir` (created on demand)
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory artifacts are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Zip entry name for a table
    pub fn entry_name(table: &NamedTable) -> String {
        format!("{}.csv", table.name)
    }

    /// Render one table as CSV bytes
    pub fn render_csv(table: &NamedTable) -> OutputResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&table.columns)
            .map_err(|e| OutputError::CsvError(e.to_string()))?;
        for cells in table.cells() {
            writer
                .write_record(&cells)
                .map_err(|e| OutputError::CsvError(e.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| OutputError::CsvError(e.to_string()))
    }

    fn write_zip(&self, artifact: &ReportArtifact, file: &mut std::fs::File) -> OutputResult<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(file);
        let mut manifest_tables = Vec::with_capacity(artifact.tables.len());

        for table in &artifact.tables {
            let bytes = Self::render_csv(table)?;
            let entry = Self::entry_name(table);
            zip.start_file(entry.as_str(), options)
                .map_err(|e| OutputError::ArchiveError(e.to_string()))?;
            zip.write_all(&bytes)
                .map_err(|e| OutputError::IoError(e.to_string()))?;
            debug!(table = %table.name, rows = table.rows.len(), bytes = bytes.len(), "Wrote table");

            manifest_tables.push(ManifestTable {
                name: &table.name,
                entry,
                rows: table.record_count(),
                columns: &table.columns,
                placeholder: table.placeholder,
                sha256: compute_sha256(&bytes),
            });
        }

        let manifest = Manifest {
            subject: &artifact.subject,
            generated_at: artifact.generated_at.to_rfc3339(),
            window: artifact.window.as_ref(),
            tables: manifest_tables,
            summary: artifact.summary.as_ref(),
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        zip.start_file(MANIFEST_ENTRY, options)
            .map_err(|e| OutputError::ArchiveError(e.to_string()))?;
        zip.write_all(&json)
            .map_err(|e| OutputError::IoError(e.to_string()))?;

        zip.finish()
            .map_err(|e| OutputError::ArchiveError(e.to_string()))?;
        Ok(())
    }
}

impl ReportSink for ZipCsvSink {
    fn write(&self, artifact: &ReportArtifact) -> OutputResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| OutputError::IoError(format!("Failed to create output dir: {e}")))?;

        let mut temp_file = NamedTempFile::new_in(&self.output_dir)
            .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;
        self.write_zip(artifact, temp_file.as_file_mut())?;

        // Flush buffer to OS and sync to disk before the rename
        temp_file
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;

        let file_name = artifact.file_name();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = candidate_path(&self.output_dir, &file_name, attempt);
            match temp_file.persist_noclobber(&path) {
                Ok(_) => {
                    if let Ok(dir) = std::fs::File::open(&self.output_dir) {
                        let _ = dir.sync_all();
                    }
                    info!(
                        path = %path.display(),
                        tables = artifact.tables.len(),
                        "Report written"
                    );
                    return Ok(path);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "Artifact name taken, trying next suffix");
                    temp_file = e.file;
                }
                Err(e) => {
                    return Err(OutputError::IoError(format!(
                        "Failed to persist artifact: {}",
                        e.error
                    )));
                }
            }
        }

        Err(OutputError::NameExhausted(file_name, MAX_NAME_ATTEMPTS))
    }
}

/// Hex SHA-256 of `data`
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
