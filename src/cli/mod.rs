//! CLI command implementations

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::ConfigOverrides;
use crate::harvest::ResourceKind;

pub mod error;
pub mod harvest;
pub mod plan;
pub mod resources;

pub use error::CliError;
pub use harvest::HarvestArgs;
pub use plan::PlanArgs;
pub use resources::ResourcesArgs;

/// Harvest paginated vendor-portal records into one multi-table report
#[derive(Parser, Debug)]
#[command(name = "portal-harvest", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// TOML config file; defaults apply when omitted
    #[arg(long, global = true, env = "PORTAL_HARVEST_CONFIG")]
    pub config: Option<PathBuf>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest every selected resource and write the report
    Harvest(HarvestArgs),

    /// List the resource catalog
    Resources(ResourcesArgs),

    /// Print the chunk plan for a window without making requests
    Plan(PlanArgs),
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Window and resource selection shared by `harvest` and `plan`
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// First day of the window (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Last day of the window (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub to: Option<String>,

    /// Reference offset for day boundaries (e.g. +05:30)
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<String>,

    /// Harvest only these resources (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<ResourceKind>,
}

impl SelectionArgs {
    /// Overrides carrying just the selection
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            from: self.from.clone(),
            to: self.to.clone(),
            utc_offset: self.utc_offset.clone(),
            only: self.only.clone(),
            ..Default::default()
        }
    }
}
