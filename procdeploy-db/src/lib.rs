//! # procdeploy-db
//!
//! Database access for the deployer: the blocking [`Connection`] seam, a
//! retrying [`ConnectionProvider`], the PostgreSQL driver, and the
//! [`MetadataStore`] that persists deployed script fingerprints.

pub mod connection;
pub mod error;
pub mod metadata;
pub mod postgres;
pub mod provider;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use connection::{Connection, Connector, Row, Value};
pub use error::DbError;
pub use metadata::{DeployedHashes, MetadataStore};
pub use postgres::{PostgresConnection, PostgresConnector};
pub use provider::{ConnectionProvider, Sleeper, ThreadSleeper};
