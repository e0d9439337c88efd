//! Error types for procdeploy-db.

use thiserror::Error;

/// All errors that can arise from talking to the target database.
///
/// Driver errors are carried as rendered messages so that every
/// [`Connection`](crate::Connection) implementation reports through the same
/// surface.
#[derive(Debug, Error)]
pub enum DbError {
    /// A single connection attempt failed.
    #[error("connection error: {0}")]
    Connect(String),

    /// Every attempt allowed by the retry policy failed.
    #[error("failed to connect to the database after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<DbError>,
    },

    #[error("execute error: {0}")]
    Execute(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("commit error: {0}")]
    Commit(String),

    #[error("rollback error: {0}")]
    Rollback(String),

    /// A result column could not be read as the expected type.
    #[error("decode error: {0}")]
    Decode(String),

    /// The blocking runtime backing a driver could not be built.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
