//! Per-script deployment.
//!
//! Each statement of a script runs and commits on its own. A failing
//! statement rolls back only its own uncommitted work; earlier statements of
//! the same script stay committed and later ones are never attempted. The
//! metadata row is written only after every statement of the script has
//! committed, so a partially applied script is retried on the next run.

use procdeploy_core::{Fingerprint, ScriptName};
use procdeploy_db::{Connection, DbError, DeployedHashes, MetadataStore};

use crate::error::DeployError;
use crate::hasher;
use crate::scan::ScriptFile;
use crate::splitter::split_statements;
use crate::summary::{RunSummary, ScriptOutcome};

/// Applies scripts over an open connection.
#[derive(Debug)]
pub struct Deployer<'a> {
    store: &'a MetadataStore,
    separator: &'a str,
}

impl<'a> Deployer<'a> {
    pub fn new(store: &'a MetadataStore, separator: &'a str) -> Self {
        Self { store, separator }
    }

    /// Ensure the metadata table, load stored fingerprints, then deploy every
    /// script in order.
    ///
    /// Per-script failures are recorded in the summary and the run goes on.
    /// Schema and metadata write failures abort the run.
    pub fn deploy_scripts<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        scripts: &[ScriptFile],
    ) -> Result<RunSummary, DeployError> {
        self.store.ensure_schema(conn).map_err(DeployError::Schema)?;
        let deployed = self.store.load_all(conn);

        tracing::info!(scripts = scripts.len(), "starting deployment");
        let mut summary = RunSummary::default();
        for script in scripts {
            let outcome = self.deploy_script(conn, script, &deployed)?;
            summary.record(script.name.clone(), outcome);
        }

        tracing::info!(
            deployed = summary.deployed,
            skipped = summary.skipped,
            errored = summary.errored,
            "deployment finished",
        );
        for report in summary.errored_scripts() {
            tracing::warn!(script = %report.name, "script did not deploy");
        }
        Ok(summary)
    }

    /// Deploy one script if its fingerprint differs from the stored one.
    pub fn deploy_script<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        script: &ScriptFile,
        deployed: &DeployedHashes,
    ) -> Result<ScriptOutcome, DeployError> {
        let file_name = script.file_name();

        let hash = match hasher::hash_file(&script.path) {
            Ok(hash) => hash,
            Err(err) => return Ok(self.unreadable(conn, &file_name, &err.to_string())),
        };

        if deployed.get(&script.name) == Some(&hash) {
            tracing::info!(script = %file_name, "skipping (unchanged)");
            return Ok(ScriptOutcome::Skipped);
        }

        tracing::info!(script = %file_name, hash = %hash.short(12), "deploying");
        let text = match script.read_text() {
            Ok(text) => text,
            Err(err) => return Ok(self.unreadable(conn, &file_name, &err.to_string())),
        };

        let statements = split_statements(&text, self.separator);
        for (idx, statement) in statements.iter().enumerate() {
            let number = idx + 1;
            if let Err(err) = run_statement(conn, statement) {
                tracing::error!(
                    script = %file_name,
                    statement = number,
                    error = %err,
                    "error executing statement",
                );
                tracing::debug!(script = %file_name, statement = number, sql = %statement, "failing statement");
                rollback_quietly(conn);
                return Ok(ScriptOutcome::Errored {
                    statement: Some(number),
                    reason: err.to_string(),
                });
            }
            tracing::info!(script = %file_name, statement = number, "executed statement");
        }

        self.record_deployment(conn, &script.name, &hash)?;
        tracing::info!(script = %file_name, statements = statements.len(), "deployed");
        Ok(ScriptOutcome::Deployed {
            statements: statements.len(),
        })
    }

    fn record_deployment<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        name: &ScriptName,
        hash: &Fingerprint,
    ) -> Result<(), DeployError> {
        self.store
            .upsert(conn, name, hash)
            .map_err(|source| DeployError::MetadataWrite {
                script: name.clone(),
                source,
            })
    }

    fn unreadable<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        file_name: &str,
        reason: &str,
    ) -> ScriptOutcome {
        tracing::error!(script = %file_name, error = %reason, "unexpected error reading script");
        rollback_quietly(conn);
        ScriptOutcome::Errored {
            statement: None,
            reason: reason.to_string(),
        }
    }
}

fn run_statement<C: Connection + ?Sized>(conn: &mut C, statement: &str) -> Result<(), DbError> {
    conn.execute(statement, &[])?;
    conn.commit()
}

fn rollback_quietly<C: Connection + ?Sized>(conn: &mut C) {
    if let Err(err) = conn.rollback() {
        tracing::warn!(error = %err, "rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procdeploy_db::testing::FakeDatabase;
    use std::fs;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// In-memory sink for formatted log events.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn script(dir: &TempDir, name: &str, body: &str) -> ScriptFile {
        let path = dir.path().join(format!("{name}.sql"));
        fs::write(&path, body).unwrap();
        ScriptFile {
            name: ScriptName::from(name),
            path,
        }
    }

    #[test]
    fn unchanged_script_is_skipped_without_executing() {
        let tmp = TempDir::new().unwrap();
        let s = script(&tmp, "usp_a", "SELECT 1");
        let db = FakeDatabase::new();
        let mut conn = db.connection();
        let store = MetadataStore::new("meta");

        let mut deployed = DeployedHashes::new();
        deployed.insert(s.name.clone(), hasher::hash_file(&s.path).unwrap());

        let outcome = Deployer::new(&store, "GO")
            .deploy_script(&mut conn, &s, &deployed)
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Skipped);
        assert!(db.attempted().is_empty());
    }

    #[test]
    fn failing_statement_keeps_earlier_commits() {
        let tmp = TempDir::new().unwrap();
        let s = script(&tmp, "usp_a", "CREATE A\nGO\nBROKEN B\nGO\nCREATE C\n");
        let db = FakeDatabase::new();
        db.fail_statements_containing("BROKEN");
        let mut conn = db.connection();
        let store = MetadataStore::new("meta");
        store.ensure_schema(&mut conn).unwrap();

        let outcome = Deployer::new(&store, "GO")
            .deploy_script(&mut conn, &s, &DeployedHashes::new())
            .unwrap();

        match outcome {
            ScriptOutcome::Errored { statement, reason } => {
                assert_eq!(statement, Some(2));
                assert!(reason.contains("BROKEN B"), "reason: {reason}");
            }
            other => panic!("expected Errored, got {other:?}"),
        }
        assert_eq!(db.committed(), vec!["CREATE A"]);
        assert_eq!(db.attempted(), vec!["CREATE A", "BROKEN B"]);
        assert!(db.record("usp_a").is_none());
    }

    #[test]
    fn each_committed_statement_is_logged() {
        let tmp = TempDir::new().unwrap();
        let s = script(&tmp, "usp_a", "CREATE A\nGO\nCREATE B\nGO\nBROKEN C\n");
        let db = FakeDatabase::new();
        db.fail_statements_containing("BROKEN");
        let mut conn = db.connection();
        let store = MetadataStore::new("meta");
        store.ensure_schema(&mut conn).unwrap();

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            Deployer::new(&store, "GO")
                .deploy_script(&mut conn, &s, &DeployedHashes::new())
                .unwrap();
        });

        let contents = log.contents();
        assert_eq!(contents.matches("executed statement").count(), 2, "log: {contents}");
        assert!(contents.contains("statement=2"), "log: {contents}");
        assert!(contents.contains("usp_a.sql"), "log: {contents}");
    }

    #[test]
    fn script_without_statements_is_still_recorded() {
        let tmp = TempDir::new().unwrap();
        let s = script(&tmp, "usp_empty", "GO\n\nGO\n");
        let db = FakeDatabase::new();
        let mut conn = db.connection();
        let store = MetadataStore::new("meta");
        store.ensure_schema(&mut conn).unwrap();

        let outcome = Deployer::new(&store, "GO")
            .deploy_script(&mut conn, &s, &DeployedHashes::new())
            .unwrap();
        assert_eq!(outcome, ScriptOutcome::Deployed { statements: 0 });
        assert!(db.record("usp_empty").is_some());
    }

    #[test]
    fn unreadable_script_is_errored_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let s = ScriptFile {
            name: ScriptName::from("usp_gone"),
            path: tmp.path().join("usp_gone.sql"),
        };
        let db = FakeDatabase::new();
        let mut conn = db.connection();
        let store = MetadataStore::new("meta");

        let outcome = Deployer::new(&store, "GO")
            .deploy_script(&mut conn, &s, &DeployedHashes::new())
            .unwrap();
        assert!(matches!(outcome, ScriptOutcome::Errored { statement: None, .. }));
        assert_eq!(db.rollbacks(), 1);
    }
}
