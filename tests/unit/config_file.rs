//! Unit tests for loading run configuration from disk

use portal_harvest::config::{ConfigError, RunConfig};
use portal_harvest::harvest::ResourceKind;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
subject = "acme-foods"
output_dir = "reports"

[window]
start = "2024-04-01"
end = "2024-06-30"
utc_offset = "+05:30"

[http]
timeout_secs = 10

[http.headers]
x-proxy-target = "fcc"

[pacing]
chunk_delay_ms = 0

[resources]
enabled = ["grns", "payment_advice"]
page_limit = 50
max_span_days = 30
"#
    )
    .unwrap();

    let config = RunConfig::load(file.path()).unwrap();
    assert_eq!(config.subject, "acme-foods");
    assert_eq!(config.timeout(), Duration::from_secs(10));
    assert_eq!(config.http.headers.get("x-proxy-target").map(String::as_str), Some("fcc"));
    assert_eq!(config.http.auth_header, "authorization");

    let plan = config.plan().unwrap();
    let kinds: Vec<ResourceKind> = plan.resources.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![ResourceKind::PaymentAdvice, ResourceKind::Grns]);
    assert_eq!(plan.resources[0].page_limit, 50);
    assert_eq!(plan.resources[0].max_span_days, None);
    assert_eq!(plan.resources[1].max_span_days, Some(30));
    assert_eq!(plan.window.start_param(), "2024-03-31T18:30:00.000Z");
    assert_eq!(plan.pacing.chunk_delay, Duration::ZERO);
    assert_eq!(plan.pacing.request_delay, Duration::from_millis(1000));

    let chunks = plan.chunk_plan().unwrap();
    assert_eq!(chunks[1].1.len(), 4);
}

#[test]
fn test_missing_file_is_read_error() {
    let err = RunConfig::load(std::path::Path::new("/nonexistent/harvest.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_bad_date_is_window_error() {
    let config = RunConfig::from_toml_str("[window]\nstart = \"2024-13-01\"").unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Window(_))));
}
