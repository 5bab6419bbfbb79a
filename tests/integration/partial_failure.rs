//! Integration tests for chunked harvesting with failing chunks

use portal_harvest::harvest::{Pacing, ResourceHarvester, ResourceKind, RunSummary};
use portal_harvest::portal::{PortalError, RequestPacer};
use portal_harvest::window::QueryWindow;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::support::{list_page, numbered, ScriptedPortal};

const CHUNK_2_START: &str = "2024-01-31T00:00:00.000Z";

/// Returns portal: two records per chunk, chunk 2 answers 500
fn flaky_returns_portal() -> ScriptedPortal {
    ScriptedPortal::new(|call| {
        let start = call.field("creationStartDate");
        if start == CHUNK_2_START {
            return Err(PortalError::http(500, "internal error"));
        }
        Ok(list_page("rtvList", numbered(&start[..10], 0, 2), false))
    })
}

#[tokio::test]
async fn test_failed_chunk_does_not_stop_later_chunks() {
    let portal = flaky_returns_portal();
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Returns.spec().with_max_span_days(30);
    let window = QueryWindow::parse_utc("2024-01-01", "2024-03-30").unwrap();

    let harvest = ResourceHarvester::new(&portal, &pacer, Pacing::immediate())
        .harvest(&spec, &window)
        .await
        .unwrap();

    let starts: Vec<String> = portal
        .calls()
        .iter()
        .map(|c| c.field("creationStartDate").to_string())
        .collect();
    assert_eq!(
        starts,
        vec![
            "2024-01-01T00:00:00.000Z",
            CHUNK_2_START,
            "2024-03-01T00:00:00.000Z"
        ]
    );

    let ids: Vec<&str> = harvest
        .records
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec!["2024-01-01-0", "2024-01-01-1", "2024-03-01-0", "2024-03-01-1"]
    );

    let report = &harvest.report;
    assert_eq!(report.records, 4);
    assert_eq!(report.chunks.len(), 3);
    assert!(!report.is_complete());
    let incomplete: Vec<usize> = report.incomplete_chunks().map(|c| c.index).collect();
    assert_eq!(incomplete, vec![1]);
    let failed = &report.chunks[1];
    assert_eq!(failed.failed_offset, Some(0));
    assert_eq!(failed.failure.as_ref().unwrap().status, Some(500));
    assert_eq!(failed.window.to_string(), "2024-01-31..2024-02-29");
}

#[tokio::test]
async fn test_unconstrained_resource_queries_whole_window_once() {
    let portal = ScriptedPortal::new(|_| Ok(list_page("settlements", numbered("s", 0, 3), false)));
    let pacer = RequestPacer::new();
    let window = QueryWindow::parse_utc("2024-04-01", "2025-03-31").unwrap();

    let harvest = ResourceHarvester::new(&portal, &pacer, Pacing::immediate())
        .harvest(&ResourceKind::Settlements.spec(), &window)
        .await
        .unwrap();

    assert_eq!(harvest.records.len(), 3);
    assert_eq!(harvest.report.chunks.len(), 1);
    let calls = portal.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].field("startDate"), "2024-04-01T00:00:00.000Z");
    assert_eq!(calls[0].field("endDate"), "2025-03-31T23:59:59.999Z");
}

#[tokio::test]
async fn test_chunk_delay_applies_between_chunks_only() {
    let portal = ScriptedPortal::new(|_| Ok(list_page("grnList", vec![], false)));
    let pacer = RequestPacer::new();
    let pacing = Pacing {
        chunk_delay: Duration::from_millis(150),
        ..Pacing::immediate()
    };
    let spec = ResourceKind::Grns.spec().with_max_span_days(10);

    let single = QueryWindow::parse_utc("2024-01-01", "2024-01-10").unwrap();
    let started = Instant::now();
    ResourceHarvester::new(&portal, &pacer, pacing)
        .harvest(&spec, &single)
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(150));

    let three = QueryWindow::parse_utc("2024-01-01", "2024-01-30").unwrap();
    let started = Instant::now();
    ResourceHarvester::new(&portal, &pacer, pacing)
        .harvest(&spec, &three)
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_malformed_page_mid_chunk_is_reported_as_gap() {
    let portal = ScriptedPortal::new(|call| {
        Ok(match call.offset() {
            0 => list_page("invoiceList", numbered("inv", 0, 5), true),
            5 => json!({"data": {"oops": "maintenance"}}),
            _ => list_page("invoiceList", numbered("inv", 10, 5), false),
        })
    });
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec().with_page_limit(5);
    let window = QueryWindow::parse_utc("2024-04-01", "2024-04-30").unwrap();

    let harvest = ResourceHarvester::new(&portal, &pacer, Pacing::immediate())
        .harvest(&spec, &window)
        .await
        .unwrap();

    assert_eq!(harvest.records.len(), 5);
    assert_eq!(portal.calls().len(), 2);
    assert_eq!(harvest.report.chunks[0].malformed_pages, 1);
    assert!(harvest.report.chunks[0].is_incomplete());
    assert!(!harvest.report.is_complete());

    let summary = RunSummary {
        resources: vec![harvest.report],
        expansions: Vec::new(),
    };
    assert!(summary.has_gaps());
}

#[tokio::test]
async fn test_resource_request_delay_overrides_run_pacing() {
    let portal = ScriptedPortal::new(|call| {
        Ok(list_page("settlements", numbered("s", call.offset(), 2), call.offset() < 4))
    });
    let pacer = RequestPacer::new();
    let window = QueryWindow::parse_utc("2024-04-01", "2024-04-30").unwrap();
    let slow_run = Pacing {
        request_delay: Duration::from_secs(5),
        ..Pacing::immediate()
    };

    // Three pages with no spacing despite the run-wide delay
    let unpaced = ResourceKind::Settlements
        .spec()
        .with_page_limit(2)
        .with_request_delay(Duration::ZERO);
    let started = Instant::now();
    let harvest = ResourceHarvester::new(&portal, &pacer, slow_run)
        .harvest(&unpaced, &window)
        .await
        .unwrap();
    assert_eq!(harvest.records.len(), 6);
    assert!(started.elapsed() < Duration::from_secs(1));

    let paced = ResourceKind::Settlements
        .spec()
        .with_page_limit(2)
        .with_request_delay(Duration::from_millis(60));
    let started = Instant::now();
    ResourceHarvester::new(&portal, &pacer, Pacing::immediate())
        .harvest(&paced, &window)
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(120));
}
