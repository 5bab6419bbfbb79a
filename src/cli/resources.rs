//! CLI command for listing the resource catalog

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};

use super::OutputFormat;
use crate::harvest::{DetailSpec, ExpansionMode, ResourceKind};

/// Arguments for `resources`
#[derive(Debug, Args)]
pub struct ResourcesArgs {
    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub format: OutputFormat,
}

impl ResourcesArgs {
    /// Execute the resources command
    pub fn execute(&self) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&catalog_json())
                        .context("Failed to serialize catalog to JSON")?
                );
            }
            OutputFormat::Human => print!("{}", catalog_human()),
        }
        Ok(())
    }
}

/// Catalog as JSON: resources then expansions
pub fn catalog_json() -> Value {
    let resources: Vec<Value> = ResourceKind::ALL
        .iter()
        .map(|kind| {
            let spec = kind.spec();
            json!({
                "name": kind.as_str(),
                "table": kind.table_name(),
                "endpoint": spec.endpoint,
                "window_fields": [spec.start_field, spec.end_field],
                "list_key": spec.list_key,
                "page_limit": spec.page_limit,
                "max_span_days": spec.max_span_days,
            })
        })
        .collect();

    let expansions: Vec<Value> = [DetailSpec::grn_details(), DetailSpec::payment_advice_logs()]
        .iter()
        .map(|detail| {
            json!({
                "table": detail.table_name,
                "parent": detail.parent.as_str(),
                "endpoint": detail.path_for(&format!("{{{}}}", detail.id_field)),
                "mode": mode_name(&detail.mode),
            })
        })
        .collect();

    json!({ "resources": resources, "expansions": expansions })
}

/// Catalog as aligned text
pub fn catalog_human() -> String {
    let mut out = String::from("Resources:\n");
    for kind in ResourceKind::ALL {
        let spec = kind.spec();
        let span = spec
            .max_span_days
            .map(|days| format!("max {days} days"))
            .unwrap_or_else(|| "any span".to_string());
        out.push_str(&format!(
            "  {:<15} {:<15} POST {:<40} {}/{} -> {} ({})\n",
            kind.as_str(),
            kind.table_name(),
            spec.endpoint,
            spec.start_field,
            spec.end_field,
            spec.list_key,
            span
        ));
    }
    out.push_str("Expansions:\n");
    for detail in [DetailSpec::grn_details(), DetailSpec::payment_advice_logs()] {
        out.push_str(&format!(
            "  {:<20} from {:<15} GET {} ({})\n",
            detail.table_name,
            detail.parent.as_str(),
            detail.path_for(&format!("{{{}}}", detail.id_field)),
            mode_name(&detail.mode)
        ));
    }
    out
}

fn mode_name(mode: &ExpansionMode) -> &'static str {
    match mode {
        ExpansionMode::Detail => "detail",
        ExpansionMode::LogFlatten(_) => "log-flatten",
    }
}
