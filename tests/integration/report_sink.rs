//! Integration tests for the zip/CSV report sink

use chrono::{TimeZone, Utc};
use portal_harvest::harvest::{ResourceKind, ResourceReport, RunSummary};
use portal_harvest::report::sink::{compute_sha256, MANIFEST_ENTRY};
use portal_harvest::report::{assemble, ReportSink, TableInput, ZipCsvSink};
use portal_harvest::window::QueryWindow;
use serde_json::{json, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

use crate::support::record;

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Vec<u8> {
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

fn open(path: &Path) -> ZipArchive<File> {
    ZipArchive::new(File::open(path).unwrap()).unwrap()
}

#[test]
fn test_zip_holds_tables_in_order_with_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let generated_at = Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap();
    let window = QueryWindow::parse_utc("2024-04-01", "2025-03-31").unwrap();
    let summary = RunSummary {
        resources: vec![ResourceReport {
            resource: ResourceKind::Invoices,
            records: 2,
            chunks: vec![],
        }],
        expansions: vec![],
    };

    let artifact = assemble(
        "acme",
        generated_at,
        vec![
            TableInput::new(
                "Invoices",
                "invoice",
                vec![
                    record(json!({"invoiceNo": "INV-1", "amount": 10})),
                    record(json!({"invoiceNo": "INV-2", "note": "late, partial"})),
                ],
            ),
            TableInput::new("Returns_RTV", "RTV (returns)", vec![]),
        ],
    )
    .with_window(window)
    .with_summary(summary);

    let path = ZipCsvSink::new(dir.path()).write(&artifact).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_string_lossy(),
        "acme_20250402_080000_complete_data.zip"
    );

    let mut archive = open(&path);
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["Invoices.csv", "Returns_RTV.csv", MANIFEST_ENTRY]);

    let invoices = read_entry(&mut archive, "Invoices.csv");
    assert_eq!(
        String::from_utf8(invoices.clone()).unwrap(),
        "invoiceNo,amount,note\nINV-1,10,\nINV-2,,\"late, partial\"\n"
    );
    let returns = String::from_utf8(read_entry(&mut archive, "Returns_RTV.csv")).unwrap();
    assert_eq!(returns, "Message\nNo RTV (returns) data found\n");

    let manifest: Value = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)).unwrap();
    assert_eq!(manifest["subject"], "acme");
    assert_eq!(manifest["window"]["first_day"], "2024-04-01");
    assert_eq!(manifest["tables"][0]["name"], "Invoices");
    assert_eq!(manifest["tables"][0]["rows"], 2);
    assert_eq!(manifest["tables"][0]["sha256"], compute_sha256(&invoices));
    assert_eq!(manifest["tables"][1]["placeholder"], true);
    assert_eq!(manifest["tables"][1]["rows"], 0);
    assert_eq!(manifest["summary"]["resources"][0]["resource"], "invoices");
}

#[test]
fn test_existing_artifact_is_never_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let generated_at = Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap();
    let artifact = assemble("acme", generated_at, vec![TableInput::new("GRNs", "GRN", vec![])]);
    let sink = ZipCsvSink::new(dir.path());

    let taken = dir.path().join(artifact.file_name());
    std::fs::write(&taken, b"previous run").unwrap();

    let path = sink.write(&artifact).unwrap();
    assert_ne!(path, taken);
    assert_eq!(std::fs::read(&taken).unwrap(), b"previous run");
    assert!(open(&path).by_name("GRNs.csv").is_ok());

    // Only the two artifacts remain; no temp files left behind
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_output_dir_created_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("reports").join("2025");
    let artifact = assemble("acme", Utc::now(), vec![]);

    let path = ZipCsvSink::new(&nested).write(&artifact).unwrap();
    assert!(path.starts_with(&nested));
    assert_eq!(open(&path).len(), 1);
}
