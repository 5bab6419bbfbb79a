//! CLI command for previewing the chunk plan

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};
use std::path::Path;

use super::{OutputFormat, SelectionArgs};
use crate::config::RunConfig;
use crate::harvest::HarvestPlan;

/// Arguments for `plan`
#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Window and resource selection
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub format: OutputFormat,
}

impl PlanArgs {
    /// Build the harvest plan from config and flags
    pub fn resolve_plan(&self, config_path: Option<&Path>) -> Result<HarvestPlan> {
        let mut config = RunConfig::load_or_default(config_path)?;
        config.apply(self.selection.overrides());
        config.plan().context("Invalid configuration")
    }

    /// Execute the plan command
    pub fn execute(&self, config_path: Option<&Path>) -> Result<()> {
        let plan = self.resolve_plan(config_path)?;
        match self.format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&plan_json(&plan)?)
                    .context("Failed to serialize plan to JSON")?
            ),
            OutputFormat::Human => print!("{}", plan_human(&plan)?),
        }
        Ok(())
    }
}

/// Chunk plan as JSON
pub fn plan_json(plan: &HarvestPlan) -> Result<Value> {
    let resources: Vec<Value> = plan
        .chunk_plan()?
        .into_iter()
        .map(|(kind, chunks)| {
            let chunks: Vec<Value> = chunks
                .iter()
                .map(|chunk| json!({"start": chunk.start_param(), "end": chunk.end_param()}))
                .collect();
            json!({"resource": kind.as_str(), "chunks": chunks})
        })
        .collect();
    Ok(json!({
        "window": plan.window,
        "resources": resources,
        "expansions": plan.expansions.iter().map(|d| d.table_name).collect::<Vec<_>>(),
    }))
}

/// Chunk plan as text
pub fn plan_human(plan: &HarvestPlan) -> Result<String> {
    let mut out = format!("Window {} ({} days)\n", plan.window, plan.window.days());
    for (kind, chunks) in plan.chunk_plan()? {
        out.push_str(&format!("{} ({} chunks)\n", kind.table_name(), chunks.len()));
        for (index, chunk) in chunks.iter().enumerate() {
            out.push_str(&format!(
                "  {:>2}. {} -> {}\n",
                index + 1,
                chunk.start_param(),
                chunk.end_param()
            ));
        }
    }
    for detail in &plan.expansions {
        out.push_str(&format!(
            "{} (one request per {} record)\n",
            detail.table_name,
            detail.parent.table_name()
        ));
    }
    Ok(out)
}
