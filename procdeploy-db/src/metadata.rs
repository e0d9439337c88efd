//! Deployment metadata table: one row per script, keyed by script name.
//!
//! Persists the fingerprint of the last successfully deployed version of
//! every script. The table is created lazily by [`MetadataStore::ensure_schema`].
//!
//! Severity is deliberately asymmetric:
//! - `ensure_schema` and `upsert` failures are returned as errors and end the run
//! - `load_all` failures are logged and read as "nothing deployed yet"

use std::collections::HashMap;

use procdeploy_core::{DeploymentRecord, Fingerprint, ScriptName};

use crate::connection::Connection;
use crate::error::DbError;

/// In-memory view of the table: script name → last deployed fingerprint.
pub type DeployedHashes = HashMap<ScriptName, Fingerprint>;

/// SQL access to the metadata table named at construction.
///
/// The table name is interpolated into SQL and must already be validated
/// (see `DeployConfig::validate`).
#[derive(Debug, Clone)]
pub struct MetadataStore {
    table: String,
}

impl MetadataStore {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             script_name VARCHAR(255) PRIMARY KEY,\n    \
             script_hash VARCHAR(64) NOT NULL,\n    \
             deployment_timestamp TIMESTAMPTZ NOT NULL DEFAULT now(),\n    \
             last_updated_timestamp TIMESTAMPTZ NOT NULL DEFAULT now()\n)",
            self.table
        )
    }

    pub(crate) fn select_hashes_sql(&self) -> String {
        format!("SELECT script_name, script_hash FROM {}", self.table)
    }

    pub(crate) fn select_records_sql(&self) -> String {
        format!(
            "SELECT script_name, script_hash, deployment_timestamp, last_updated_timestamp \
             FROM {} ORDER BY script_name",
            self.table
        )
    }

    /// Single-statement insert-or-update; no window between check and write.
    pub(crate) fn upsert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (script_name, script_hash, deployment_timestamp, last_updated_timestamp) \
             VALUES ($1, $2, now(), now()) \
             ON CONFLICT (script_name) DO UPDATE \
             SET script_hash = EXCLUDED.script_hash, last_updated_timestamp = now()",
            self.table
        )
    }

    /// Create the table if it does not exist. Idempotent.
    pub fn ensure_schema<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<(), DbError> {
        let result = conn
            .execute(&self.create_table_sql(), &[])
            .and_then(|_| conn.commit());
        match result {
            Ok(()) => {
                tracing::info!(table = %self.table, "ensured metadata table exists");
                Ok(())
            }
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "error ensuring metadata table exists");
                rollback_quietly(conn);
                Err(err)
            }
        }
    }

    /// Every persisted fingerprint.
    ///
    /// Never fails: a missing table or failed query is logged as a warning
    /// and yields an empty map, so every script is treated as new.
    pub fn load_all<C: Connection + ?Sized>(&self, conn: &mut C) -> DeployedHashes {
        match self.try_load_all(conn) {
            Ok(hashes) => {
                tracing::info!(count = hashes.len(), "loaded deployed script hashes");
                hashes
            }
            Err(err) => {
                tracing::warn!(error = %err, "error fetching deployed hashes (may be first run)");
                rollback_quietly(conn);
                DeployedHashes::new()
            }
        }
    }

    fn try_load_all<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<DeployedHashes, DbError> {
        let rows = conn.query(&self.select_hashes_sql())?;
        let mut hashes = DeployedHashes::with_capacity(rows.len());
        for row in rows {
            hashes.insert(
                ScriptName::from(row.text(0)?),
                Fingerprint::from(row.text(1)?),
            );
        }
        Ok(hashes)
    }

    /// Full records, ordered by script name.
    pub fn load_records<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
    ) -> Result<Vec<DeploymentRecord>, DbError> {
        conn.query(&self.select_records_sql())?
            .into_iter()
            .map(|row| -> Result<DeploymentRecord, DbError> {
                Ok(DeploymentRecord {
                    script_name: ScriptName::from(row.text(0)?),
                    script_hash: Fingerprint::from(row.text(1)?),
                    first_deployed_at: row.timestamp(2)?,
                    last_updated_at: row.timestamp(3)?,
                })
            })
            .collect()
    }

    /// Record `hash` as the deployed fingerprint of `name` and commit.
    ///
    /// On failure the transaction is rolled back and the error returned;
    /// nothing is persisted for this script.
    pub fn upsert<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        name: &ScriptName,
        hash: &Fingerprint,
    ) -> Result<(), DbError> {
        let result = conn
            .execute(&self.upsert_sql(), &[name.as_str(), hash.as_str()])
            .and_then(|_| conn.commit());
        match result {
            Ok(()) => {
                tracing::info!(script = %name, "metadata updated");
                Ok(())
            }
            Err(err) => {
                tracing::error!(script = %name, error = %err, "error updating metadata");
                rollback_quietly(conn);
                Err(err)
            }
        }
    }
}

fn rollback_quietly<C: Connection + ?Sized>(conn: &mut C) {
    if let Err(err) = conn.rollback() {
        tracing::warn!(error = %err, "rollback failed");
    }
}
