//! Harvest command implementation
//!
//! Loads and validates the configuration, checks the credential, runs the
//! driver over the reqwest client, logs the run summary and writes the report.
//! An interrupted run writes nothing.

use chrono::Utc;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{CliError, SelectionArgs};
use crate::config::RunConfig;
use crate::credential::{Credential, CredentialStatus};
use crate::harvest::HarvestDriver;
use crate::metrics::init_metrics;
use crate::portal::PortalHttpClient;
use crate::report::{assemble, ReportSink, ZipCsvSink};
use crate::shutdown::SharedShutdown;

/// Arguments for `harvest`
#[derive(Args, Debug)]
pub struct HarvestArgs {
    /// Window and resource selection
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Bearer credential for the portal
    #[arg(long, env = "PORTAL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Vendor/account name used in the artifact file name
    #[arg(long)]
    pub subject: Option<String>,

    /// Directory the report is written to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Portal origin (overrides the config file)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Skip GRN details and payment-advice logs
    #[arg(long, default_value_t = false)]
    pub no_details: bool,

    /// Hide the detail progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl HarvestArgs {
    /// Merge the config file with these flags
    pub fn resolve_config(&self, config_path: Option<&Path>) -> Result<RunConfig, CliError> {
        let mut config = RunConfig::load_or_default(config_path)?;
        let mut overrides = self.selection.overrides();
        overrides.subject = self.subject.clone();
        overrides.output_dir = self.output_dir.clone();
        overrides.base_url = self.base_url.clone();
        overrides.no_details = self.no_details;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Credential from the flag or environment, checked for expiry
    pub fn credential(&self) -> Result<Credential, CliError> {
        let credential = self
            .token
            .as_deref()
            .map(Credential::new)
            .filter(|credential| !credential.is_empty())
            .ok_or(CliError::MissingCredential)?;

        let now = Utc::now();
        match credential.status_at(now) {
            CredentialStatus::Valid { expires_at } => {
                let remaining = expires_at - now;
                info!(
                    expires_at = %expires_at,
                    "Credential valid for another {}h {}m",
                    remaining.num_hours(),
                    remaining.num_minutes() % 60
                );
            }
            CredentialStatus::Expired { expired_at } => {
                return Err(CliError::CredentialExpired(expired_at));
            }
            CredentialStatus::Unknown => {}
        }
        Ok(credential)
    }

    /// Execute the harvest command, returning the artifact path
    pub async fn execute(
        &self,
        config_path: Option<&Path>,
        shutdown: SharedShutdown,
    ) -> Result<PathBuf, CliError> {
        let config = self.resolve_config(config_path)?;
        let plan = config.plan()?;
        let credential = self.credential()?;

        if let Some(addr) = self.metrics_addr {
            init_metrics(addr).map_err(|e| CliError::MetricsError(e.to_string()))?;
        }

        let client = PortalHttpClient::new(
            &config.base_url,
            &credential,
            &config.http.auth_header,
            &config.http.headers,
            config.timeout(),
        )?;

        info!(
            subject = %config.subject,
            window = %plan.window,
            resources = plan.resources.len(),
            expansions = plan.expansions.len(),
            "Starting harvest"
        );

        let progress = if self.no_progress {
            ProgressBar::hidden()
        } else {
            create_progress_bar()
        };

        let outcome = HarvestDriver::new(&client)
            .with_shutdown(Some(shutdown))
            .with_progress(progress)
            .run(&plan)
            .await?;

        outcome.summary.log();
        if outcome.summary.has_gaps() {
            warn!("Report is incomplete; see the run summary and manifest.json");
        }

        let artifact = assemble(&config.subject, Utc::now(), outcome.tables)
            .with_window(plan.window)
            .with_summary(outcome.summary);
        let path = ZipCsvSink::new(&config.output_dir).write(&artifact)?;

        println!("{}", path.display());
        Ok(path)
    }
}

/// Progress bar for detail fan-out
fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
