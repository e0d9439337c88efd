//! `procdeploy records`: show what the metadata table says is deployed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use procdeploy_core::{ConnectionParams, DeploymentRecord};
use procdeploy_db::{Connection, ConnectionProvider, MetadataStore, PostgresConnector};

use crate::logging;

const HASH_PREFIX_LEN: usize = 12;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Arguments for `procdeploy records`.
#[derive(Args, Debug)]
pub struct RecordsArgs {
    /// YAML config file [default: ./procdeploy.yaml when present].
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "script")]
    script: String,
    #[tabled(rename = "hash")]
    hash: String,
    #[tabled(rename = "first deployed")]
    first_deployed: String,
    #[tabled(rename = "last updated")]
    last_updated: String,
}

impl From<&DeploymentRecord> for RecordRow {
    fn from(record: &DeploymentRecord) -> Self {
        Self {
            script: record.script_name.to_string(),
            hash: record.script_hash.short(HASH_PREFIX_LEN).to_string(),
            first_deployed: record.first_deployed_at.format(TIMESTAMP_FORMAT).to_string(),
            last_updated: record.last_updated_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl RecordsArgs {
    pub fn run(self) -> Result<ExitCode> {
        let config = super::load_config(self.config.as_deref())?;
        let _logging = logging::init(&config.log_file, true);

        let params = ConnectionParams::from_env().context("cannot read records without database settings")?;
        let provider = ConnectionProvider::new(PostgresConnector::new(params), config.retry);
        let mut conn = provider.connect().context("database unavailable")?;

        let store = MetadataStore::new(config.metadata_table.as_str());
        let records = store.load_records(&mut conn);
        if let Err(err) = conn.close() {
            tracing::warn!(error = %err, "error closing database connection");
        }
        let records = records
            .with_context(|| format!("failed to read deployment records from {}", store.table()))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            print_table(&records);
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn print_table(records: &[DeploymentRecord]) {
    if records.is_empty() {
        println!("{}", "No scripts have been deployed yet.".dimmed());
        return;
    }
    let mut table = Table::new(records.iter().map(RecordRow::from));
    table.with(Style::rounded());
    println!("{table}");
    println!("{} script(s) recorded", records.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn row_shortens_hash_and_formats_timestamps() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let record = DeploymentRecord {
            script_name: "usp_orders".into(),
            script_hash: "a".repeat(64).into(),
            first_deployed_at: at,
            last_updated_at: at,
        };
        let row = RecordRow::from(&record);
        assert_eq!(row.hash, "a".repeat(HASH_PREFIX_LEN));
        assert_eq!(row.first_deployed, "2024-03-01 09:30:00 UTC");
    }
}
