//! End-to-end harvesting over a scripted portal

use chrono::Utc;
use portal_harvest::harvest::{HarvestDriver, HarvestError, HarvestPlan, Pacing, ResourceKind};
use portal_harvest::report::assemble;
use portal_harvest::shutdown::ShutdownCoordinator;
use portal_harvest::window::QueryWindow;
use serde_json::{json, Value};

use crate::support::{list_page, Call, ScriptedPortal};

fn fiscal_year() -> QueryWindow {
    QueryWindow::parse_utc("2024-04-01", "2025-03-31").unwrap()
}

/// A portal with data for every resource except returns
fn vendor_portal(call: &Call) -> Result<Value, portal_harvest::portal::PortalError> {
    let page = match call.path.as_str() {
        "/api/v1/payment/invoice/filter" => list_page(
            "invoiceList",
            vec![json!({"invoiceNo": "INV-1", "amount": 10}), json!({"invoiceNo": "INV-2"})],
            false,
        ),
        "/api/v1/payment/settlement/filter" => list_page("settlements", vec![], false),
        "/api/v1/payment/payment-advice/filter" => list_page(
            "paymentAdviceList",
            vec![json!({"id": 7, "referenceNo": "PA-7"})],
            false,
        ),
        "/api/v1/grn/filter" => {
            let day = &call.field("grnStartDate")[..10];
            list_page("grnList", vec![json!({"grnNo": format!("GRN-{day}")})], false)
        }
        "/api/v1/rtv/filter" => list_page("rtvList", vec![], false),
        "/api/v1/payment/payment-advice/7" => json!({"data": {
            "referenceNo": "PA-7",
            "paymentAdviceLogs": [{"id": "L1", "amount": 5}, {"id": "L2", "amount": 6}]
        }}),
        path if path.starts_with("/api/v1/grn/") => json!({"data": {
            "grnNo": path.trim_start_matches("/api/v1/grn/"),
            "status": "CLOSED"
        }}),
        other => panic!("unexpected path {other}"),
    };
    Ok(page)
}

#[tokio::test]
async fn test_full_run_produces_tables_in_report_order() {
    let portal = ScriptedPortal::new(vendor_portal);
    let plan = HarvestPlan::full(fiscal_year()).with_pacing(Pacing::immediate());

    let outcome = HarvestDriver::new(&portal).run(&plan).await.unwrap();

    let names: Vec<&str> = outcome.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Invoices",
            "DN_CN",
            "Payment_Advice",
            "GRNs",
            "GRN_Details",
            "Payment_Advice_Logs",
            "Returns_RTV"
        ]
    );

    let counts: Vec<usize> = outcome.tables.iter().map(|t| t.records.len()).collect();
    assert_eq!(counts, vec![2, 0, 1, 5, 5, 2, 0]);

    // Five 90-day chunks each for GRNs and returns
    assert_eq!(portal.calls_to("/api/v1/grn/filter").len(), 5);
    assert_eq!(portal.calls_to("/api/v1/rtv/filter").len(), 5);
    let grn_starts: Vec<String> = portal
        .calls_to("/api/v1/grn/filter")
        .iter()
        .map(|c| c.field("grnStartDate").to_string())
        .collect();
    assert_eq!(
        grn_starts,
        vec![
            "2024-04-01T00:00:00.000Z",
            "2024-06-30T00:00:00.000Z",
            "2024-09-28T00:00:00.000Z",
            "2024-12-27T00:00:00.000Z",
            "2025-03-27T00:00:00.000Z"
        ]
    );

    // GRNs and payment advice are harvested once and reused for expansion
    assert_eq!(portal.calls_to("/api/v1/payment/payment-advice/filter").len(), 1);
    assert_eq!(portal.calls_to("/api/v1/grn/GRN-2024-06-30").len(), 1);

    assert!(!outcome.summary.has_gaps());
    let summary_counts: Vec<(ResourceKind, usize)> = outcome
        .summary
        .resources
        .iter()
        .map(|r| (r.resource, r.records))
        .collect();
    assert_eq!(
        summary_counts,
        vec![
            (ResourceKind::Invoices, 2),
            (ResourceKind::Settlements, 0),
            (ResourceKind::PaymentAdvice, 1),
            (ResourceKind::Grns, 5),
            (ResourceKind::Returns, 0)
        ]
    );

    let artifact = assemble("acme", Utc::now(), outcome.tables);
    let returns = artifact.table("Returns_RTV").unwrap();
    assert!(returns.placeholder);
    assert_eq!(returns.rows[0]["Message"], "No RTV (returns) data found");
    assert_eq!(
        artifact.table("DN_CN").unwrap().rows[0]["Message"],
        "No settlement data found"
    );
}

#[tokio::test]
async fn test_selection_skips_expansions_of_unselected_parents() {
    let portal = ScriptedPortal::new(vendor_portal);
    let mut plan = HarvestPlan::full(fiscal_year()).with_pacing(Pacing::immediate());
    plan.resources = vec![ResourceKind::Invoices.spec()];

    let outcome = HarvestDriver::new(&portal).run(&plan).await.unwrap();

    let names: Vec<&str> = outcome.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Invoices"]);
    assert!(outcome.summary.expansions.is_empty());
    assert_eq!(portal.calls().len(), 1);
}

#[tokio::test]
async fn test_interrupted_run_returns_error() {
    let shutdown = ShutdownCoordinator::shared();
    let trigger = shutdown.clone();
    let portal = ScriptedPortal::new(move |call| {
        trigger.request_shutdown();
        vendor_portal(call)
    });
    let plan = HarvestPlan::full(fiscal_year()).with_pacing(Pacing::immediate());

    let result = HarvestDriver::new(&portal)
        .with_shutdown(Some(shutdown))
        .run(&plan)
        .await;

    assert!(matches!(result, Err(HarvestError::Interrupted)));
    assert_eq!(portal.calls().len(), 1);
}
