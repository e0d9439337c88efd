//! procdeploy core library: domain types, configuration, errors.
//!
//! - [`types`]: script identity, fingerprints, deployment records
//! - [`config`]: `procdeploy.yaml` settings and environment connection parameters
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConnectionParams, DeployConfig, RetryPolicy, DEFAULT_CONFIG_FILE};
pub use error::ConfigError;
pub use types::{DeploymentRecord, Fingerprint, ScriptName};
