//! Error types for procdeploy-sync.
//!
//! Only run-ending failures are errors. A script that fails to deploy is
//! reported as [`ScriptOutcome::Errored`](crate::ScriptOutcome::Errored)
//! and the run carries on.

use std::path::PathBuf;

use thiserror::Error;

use procdeploy_core::ScriptName;
use procdeploy_db::DbError;

/// Fatal conditions that abort a deployment run.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The configured scripts directory does not exist.
    #[error("stored procedures directory '{}' not found", path.display())]
    ScriptsDirMissing { path: PathBuf },

    /// The scripts directory exists but holds no matching files.
    #[error("no .{extension} scripts found in '{}'", path.display())]
    NoScripts { path: PathBuf, extension: String },

    /// An I/O error while listing the scripts directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No connection could be established within the retry policy.
    #[error("database unavailable: {0}")]
    Connect(#[source] DbError),

    /// The metadata table could not be checked or created.
    #[error("error ensuring metadata table exists: {0}")]
    Schema(#[source] DbError),

    /// A script ran cleanly but its new fingerprint could not be recorded.
    #[error("error updating metadata for {script}: {source}")]
    MetadataWrite {
        script: ScriptName,
        #[source]
        source: DbError,
    },
}

/// Convenience constructor for [`DeployError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DeployError {
    DeployError::Io {
        path: path.into(),
        source,
    }
}
