//! Integration tests for the reqwest portal client against a local server

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use portal_harvest::credential::Credential;
use portal_harvest::portal::{PortalError, PortalHttpClient, PortalTransport};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

async fn echo_filter(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    Json(json!({
        "data": {
            "auth": header("authorization"),
            "origin": header("origin"),
            "offset": body["offset"],
            "grnList": [],
            "hasNext": false
        }
    }))
}

async fn grn_detail(Path(grn_no): Path<String>) -> Result<Json<Value>, (StatusCode, String)> {
    if grn_no == "missing" {
        return Err((StatusCode::NOT_FOUND, "no such GRN".to_string()));
    }
    Ok(Json(json!({"data": {"grnNo": grn_no}})))
}

async fn login_page() -> &'static str {
    "<html>please sign in</html>"
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Json(json!({"data": {}}))
}

/// Start a local portal and return its base URL
async fn serve() -> String {
    let router = Router::new()
        .route("/api/v1/grn/filter", post(echo_filter))
        .route("/api/v1/grn/{grn_no}", get(grn_detail))
        .route("/login", get(login_page))
        .route("/slow", get(slow));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str, timeout: Duration) -> PortalHttpClient {
    let mut headers = BTreeMap::new();
    headers.insert("origin".to_string(), "https://brands.example.com".to_string());
    PortalHttpClient::new(
        base_url,
        &Credential::new("secret-token"),
        "authorization",
        &headers,
        timeout,
    )
    .unwrap()
}

#[tokio::test]
async fn test_post_sends_credential_headers_and_body() {
    let base_url = serve().await;
    let http = client(&base_url, Duration::from_secs(5));

    let response = http
        .post_json("/api/v1/grn/filter", &json!({"offset": 200, "limit": 100}))
        .await
        .unwrap();

    assert_eq!(response["data"]["auth"], "secret-token");
    assert_eq!(response["data"]["origin"], "https://brands.example.com");
    assert_eq!(response["data"]["offset"], 200);
}

#[tokio::test]
async fn test_get_detail() {
    let base_url = serve().await;
    let http = client(&base_url, Duration::from_secs(5));

    let response = http.get_json("/api/v1/grn/GRN-42").await.unwrap();
    assert_eq!(response["data"]["grnNo"], "GRN-42");
}

#[tokio::test]
async fn test_non_200_is_http_error_with_body() {
    let base_url = serve().await;
    let http = client(&base_url, Duration::from_secs(5));

    let err = http.get_json("/api/v1/grn/missing").await.unwrap_err();
    assert_eq!(err, PortalError::http(404, "no such GRN"));
    assert!(!err.is_unauthorized());
}

#[tokio::test]
async fn test_non_json_body_is_transport_error() {
    let base_url = serve().await;
    let http = client(&base_url, Duration::from_secs(5));

    let err = http.get_json("/login").await.unwrap_err();
    assert!(matches!(err, PortalError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let base_url = serve().await;
    let http = client(&base_url, Duration::from_millis(100));

    let err = http.get_json("/slow").await.unwrap_err();
    match err {
        PortalError::Transport(message) => assert!(message.contains("timed out"), "{message}"),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let http = client(&format!("http://{addr}"), Duration::from_secs(2));
    let err = http.get_json("/api/v1/grn/G-1").await.unwrap_err();
    assert!(matches!(err, PortalError::Transport(_)));
    assert_eq!(err.status(), None);
}
