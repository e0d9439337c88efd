//! Error types for procdeploy-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required connection variables are unset or empty.
    #[error("database connection environment variables must be set: {}", names.join(", "))]
    MissingEnv { names: Vec<&'static str> },

    /// `DB_PORT` is present but not a valid port number.
    #[error("DB_PORT must be a valid port number, got '{value}'")]
    InvalidPort { value: String },

    /// Underlying I/O failure reading a config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A setting parsed but holds a value the deployer cannot use.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
