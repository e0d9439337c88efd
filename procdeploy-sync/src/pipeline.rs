//! One full deployment run: scan, connect, deploy, close.

use procdeploy_core::DeployConfig;
use procdeploy_db::{Connection, ConnectionProvider, Connector, MetadataStore, Sleeper};

use crate::engine::Deployer;
use crate::error::DeployError;
use crate::scan::scan_dir;
use crate::summary::RunSummary;

/// Run a deployment against the database reached through `provider`.
///
/// The scripts directory is scanned before any connection is attempted, so
/// a missing or empty directory never touches the database. Once a
/// connection is open it is closed on every path out of this function.
pub fn run<K, S>(
    config: &DeployConfig,
    provider: &ConnectionProvider<K, S>,
) -> Result<RunSummary, DeployError>
where
    K: Connector,
    S: Sleeper,
{
    let scripts = scan_dir(&config.scripts_dir, &config.extension)?;
    tracing::info!(
        dir = %config.scripts_dir.display(),
        count = scripts.len(),
        "found scripts",
    );

    let mut conn = provider.connect().map_err(DeployError::Connect)?;

    let store = MetadataStore::new(config.metadata_table.as_str());
    let result = Deployer::new(&store, &config.batch_separator).deploy_scripts(&mut conn, &scripts);

    match conn.close() {
        Ok(()) => tracing::info!("database connection closed"),
        Err(err) => tracing::warn!(error = %err, "error closing database connection"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use procdeploy_core::RetryPolicy;
    use procdeploy_db::testing::{FakeDatabase, RecordingSleeper};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn closes_connection_after_success() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("usp_a.sql"), "SELECT 1").unwrap();
        let config = DeployConfig {
            scripts_dir: tmp.path().to_path_buf(),
            ..DeployConfig::default()
        };
        let db = FakeDatabase::new();
        let sleeper = RecordingSleeper::default();
        let provider =
            ConnectionProvider::with_sleeper(db.connector(), RetryPolicy::default(), &sleeper);

        let summary = run(&config, &provider).unwrap();
        assert_eq!(summary.deployed, 1);
        assert_eq!(db.connects(), 1);
        assert_eq!(db.closes(), 1);
    }
}
