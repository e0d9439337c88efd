//! # procdeploy-sync
//!
//! Change-detecting deployment of stored-procedure scripts.
//!
//! Call [`run`] to scan the configured directory, connect through a
//! [`ConnectionProvider`](procdeploy_db::ConnectionProvider), and deploy
//! every script whose SHA-256 fingerprint differs from the one recorded by
//! the last successful deployment.

pub mod engine;
pub mod error;
pub mod hasher;
pub mod pipeline;
pub mod scan;
pub mod splitter;
pub mod summary;

pub use engine::Deployer;
pub use error::DeployError;
pub use pipeline::run;
pub use scan::{scan_dir, ScriptFile};
pub use splitter::split_statements;
pub use summary::{RunSummary, ScriptOutcome, ScriptReport};
