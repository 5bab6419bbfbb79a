//! Unit tests for the offset page cursor

use futures::StreamExt;
use portal_harvest::harvest::{PageCursor, ResourceKind};
use portal_harvest::portal::{Method, PortalError, RequestPacer};
use portal_harvest::shutdown::ShutdownCoordinator;
use portal_harvest::window::QueryWindow;

use crate::support::{list_page, numbered, ScriptedPortal};

const LIMIT: u64 = 5;

fn window() -> QueryWindow {
    QueryWindow::parse_utc("2024-04-01", "2025-03-31").unwrap()
}

/// `full_pages` full pages, then an empty page carrying `final_flag`
fn paged_portal(full_pages: u64, final_flag: bool) -> ScriptedPortal {
    ScriptedPortal::new(move |call| {
        let offset = call.offset();
        if offset / LIMIT < full_pages {
            Ok(list_page("invoiceList", numbered("inv", offset, LIMIT), true))
        } else {
            Ok(list_page("invoiceList", vec![], final_flag))
        }
    })
}

#[tokio::test]
async fn test_exhaustion_on_false_flag() {
    let portal = paged_portal(3, false);
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec().with_page_limit(LIMIT as u32);

    let outcome = PageCursor::new(&portal, &pacer, &spec, window()).drain().await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.records.len(), 15);
    assert_eq!(outcome.pages, 4);
    let offsets: Vec<u64> = portal.calls().iter().map(|c| c.offset()).collect();
    assert_eq!(offsets, vec![0, 5, 10, 15]);
}

#[tokio::test]
async fn test_exhaustion_on_true_flag_with_empty_page() {
    let portal = paged_portal(3, true);
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec().with_page_limit(LIMIT as u32);

    let outcome = PageCursor::new(&portal, &pacer, &spec, window()).drain().await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.records.len(), 15);
    assert_eq!(portal.calls().len(), 4);
}

#[tokio::test]
async fn test_records_keep_page_order() {
    let portal = paged_portal(2, false);
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec().with_page_limit(LIMIT as u32);

    let outcome = PageCursor::new(&portal, &pacer, &spec, window()).drain().await;
    let seq: Vec<u64> = outcome
        .records
        .iter()
        .map(|r| r["seq"].as_u64().unwrap())
        .collect();
    assert_eq!(seq, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_request_carries_window_and_filters() {
    let portal = paged_portal(0, false);
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec();

    PageCursor::new(&portal, &pacer, &spec, window()).drain().await;

    let calls = portal.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::Post);
    assert_eq!(calls[0].path, "/api/v1/payment/invoice/filter");
    assert_eq!(calls[0].field("startDate"), "2024-04-01T00:00:00.000Z");
    assert_eq!(calls[0].field("endDate"), "2025-03-31T23:59:59.999Z");
    let body = calls[0].body.as_ref().unwrap();
    assert_eq!(body["limit"], 100);
    assert_eq!(body["statusList"], serde_json::json!([]));
}

#[tokio::test]
async fn test_failure_stops_and_keeps_partial_records() {
    let portal = ScriptedPortal::new(|call| match call.offset() {
        0 => Ok(list_page("invoiceList", numbered("inv", 0, LIMIT), true)),
        _ => Err(PortalError::http(503, "maintenance")),
    });
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec().with_page_limit(LIMIT as u32);

    let outcome = PageCursor::new(&portal, &pacer, &spec, window()).drain().await;

    assert!(!outcome.is_complete());
    assert_eq!(outcome.records.len(), 5);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.offset, 5);
    assert_eq!(failure.error.status(), Some(503));
    assert_eq!(portal.calls().len(), 2);
}

#[tokio::test]
async fn test_malformed_page_ends_pagination() {
    let portal = ScriptedPortal::new(|_| Ok(serde_json::json!({"data": {"unexpected": []}})));
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec();

    let outcome = PageCursor::new(&portal, &pacer, &spec, window()).drain().await;

    assert!(outcome.is_complete());
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.malformed_pages, 1);
    assert_eq!(portal.calls().len(), 1);
}

#[tokio::test]
async fn test_cursor_as_stream() {
    let portal = paged_portal(2, false);
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec().with_page_limit(LIMIT as u32);

    let pages: Vec<_> = PageCursor::new(&portal, &pacer, &spec, window())
        .into_stream()
        .collect()
        .await;

    assert_eq!(pages.len(), 3);
    let has_more: Vec<bool> = pages.iter().map(|p| p.as_ref().unwrap().has_more).collect();
    assert_eq!(has_more, vec![true, true, false]);
}

#[tokio::test]
async fn test_cursor_is_not_restartable() {
    let portal = paged_portal(0, false);
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec();

    let mut cursor = PageCursor::new(&portal, &pacer, &spec, window());
    assert!(cursor.next_page().await.is_some());
    assert!(cursor.next_page().await.is_none());
    assert!(cursor.next_page().await.is_none());
    assert_eq!(portal.calls().len(), 1);
}

#[tokio::test]
async fn test_shutdown_stops_before_request() {
    let portal = paged_portal(3, false);
    let pacer = RequestPacer::new();
    let spec = ResourceKind::Invoices.spec();
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let outcome = PageCursor::new(&portal, &pacer, &spec, window())
        .with_shutdown(Some(shutdown))
        .drain()
        .await;

    assert!(outcome.interrupted);
    assert!(!outcome.is_complete());
    assert!(portal.calls().is_empty());
}
