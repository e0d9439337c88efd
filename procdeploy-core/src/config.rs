//! Deployer configuration.
//!
//! Two sources:
//! - connection parameters from the process environment (`DB_SERVER`,
//!   `DB_DATABASE`, `DB_USERNAME`, `DB_PASSWORD`, `DB_PORT`), all required
//! - deployment settings from an optional `procdeploy.yaml`, every field
//!   defaulted
//!
//! # API pattern
//!
//! - `fn_at(dir: &Path, …)` / `from_lookup(…)`: explicit inputs; used in tests
//! - `fn(…)` / `from_env()`: reads the real working directory or environment
//!
//! Tests must NEVER call the environment-reading wrappers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "procdeploy.yaml";

pub const ENV_SERVER: &str = "DB_SERVER";
pub const ENV_DATABASE: &str = "DB_DATABASE";
pub const ENV_USERNAME: &str = "DB_USERNAME";
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_PORT: &str = "DB_PORT";

/// Every variable [`ConnectionParams::from_env`] requires, in report order.
pub const REQUIRED_ENV: [&str; 5] = [ENV_SERVER, ENV_DATABASE, ENV_USERNAME, ENV_PASSWORD, ENV_PORT];

// ---------------------------------------------------------------------------
// 1. Deployment settings
// ---------------------------------------------------------------------------

/// Settings read from `procdeploy.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Directory scanned for scripts (not recursive).
    pub scripts_dir: PathBuf,
    /// Script file extension, without the dot. Matched case-insensitively.
    pub extension: String,
    /// Table holding one deployment record per script.
    pub metadata_table: String,
    /// Keyword that, alone on a line, separates two statements.
    pub batch_separator: String,
    /// Log file appended to on every run.
    pub log_file: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("sql").join("stored_procedures"),
            extension: "sql".to_string(),
            metadata_table: "custom_stored_procedure_deployment_metadata".to_string(),
            batch_separator: "GO".to_string(),
            log_file: PathBuf::from("logs").join("deployment.log"),
            retry: RetryPolicy::default(),
        }
    }
}

/// Connection retry policy: fixed delay between a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_secs: 5,
        }
    }
}

impl DeployConfig {
    /// Load and validate the config file at `path`.
    ///
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::Parse` (with path + line context) if it is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        // An empty file is a valid "all defaults" config.
        let config: DeployConfig = if contents.trim().is_empty() {
            DeployConfig::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load `<dir>/procdeploy.yaml` if it exists, defaults otherwise.
    pub fn discover_at(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// `discover_at` for the current working directory.
    pub fn discover() -> Result<Self, ConfigError> {
        Self::discover_at(Path::new("."))
    }

    /// Reject values the deployer cannot use safely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_table_identifier(&self.metadata_table) {
            return Err(ConfigError::Invalid(format!(
                "metadata_table '{}' is not a plain SQL identifier",
                self.metadata_table
            )));
        }
        let sep = self.batch_separator.trim();
        if sep.is_empty() || sep.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "batch_separator '{}' must be a single word",
                self.batch_separator
            )));
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(ConfigError::Invalid(format!(
                "extension '{}' must be non-empty and given without a leading dot",
                self.extension
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// `name` or `schema.name`, each part `[A-Za-z_][A-Za-z0-9_]*`.
fn is_table_identifier(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    if parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}

// ---------------------------------------------------------------------------
// 2. Connection parameters
// ---------------------------------------------------------------------------

/// Target database coordinates. All fields are required.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub port: u16,
}

impl ConnectionParams {
    /// Build from an arbitrary variable lookup.
    ///
    /// Every missing (or empty) variable is reported in a single
    /// `ConfigError::MissingEnv`, before the port is parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let values: Vec<Option<String>> = REQUIRED_ENV.iter().map(|&name| get(name)).collect();
        let missing: Vec<&'static str> = REQUIRED_ENV
            .iter()
            .zip(&values)
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv { names: missing });
        }

        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        let server = next();
        let database = next();
        let username = next();
        let password = next();
        let raw_port = next();
        let port = raw_port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort { value: raw_port.clone() })?;

        Ok(Self {
            server,
            database,
            username,
            password,
            port,
        })
    }

    /// `from_lookup` over the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Server={}, User={}, DB={}, Port={}",
            self.server, self.username, self.database, self.port
        )
    }
}
