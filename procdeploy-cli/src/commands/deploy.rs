//! `procdeploy deploy`: deploy new and changed scripts.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use procdeploy_core::ConnectionParams;
use procdeploy_db::{ConnectionProvider, PostgresConnector};
use procdeploy_sync::{pipeline, RunSummary, ScriptOutcome};

use crate::logging;

/// Arguments for `procdeploy deploy`, also accepted without the subcommand.
#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Directory holding the scripts (overrides the config file).
    #[arg(long, value_name = "DIR")]
    pub scripts_dir: Option<PathBuf>,

    /// YAML config file [default: ./procdeploy.yaml when present].
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only print warnings and errors to the terminal.
    #[arg(long, short)]
    pub quiet: bool,
}

impl DeployArgs {
    pub fn run(self) -> Result<ExitCode> {
        let mut config = super::load_config(self.config.as_deref())?;
        if let Some(dir) = self.scripts_dir {
            config.scripts_dir = dir;
        }
        let _logging = logging::init(&config.log_file, self.quiet);

        let params = match ConnectionParams::from_env() {
            Ok(params) => params,
            Err(err) => {
                tracing::error!(error = %err, "database configuration incomplete");
                return Err(err).context("cannot deploy without database settings");
            }
        };
        tracing::info!("Attempting to connect with: {params}");

        let provider = ConnectionProvider::new(PostgresConnector::new(params), config.retry);
        let summary = match pipeline::run(&config, &provider) {
            Ok(summary) => summary,
            Err(err) => {
                tracing::error!(error = %err, "deployment aborted");
                return Err(err).context("deployment aborted");
            }
        };

        print_summary(&summary);
        Ok(if summary.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}

fn print_summary(summary: &RunSummary) {
    for report in summary.errored_scripts() {
        if let ScriptOutcome::Errored { statement, reason } = &report.outcome {
            let at = statement.map(|n| format!(" (statement {n})")).unwrap_or_default();
            println!("{} {}{at}: {reason}", "✗".red().bold(), report.name);
        }
    }

    let line = format!(
        "{} deployed, {} skipped, {} errored",
        summary.deployed, summary.skipped, summary.errored
    );
    if summary.is_success() {
        println!("{} {line}", "✓".green().bold());
    } else {
        println!("{} {line}", "✗".red().bold());
    }
}
