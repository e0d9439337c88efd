//! The connection seam between the deployer and a database driver.
//!
//! Everything is blocking: one connection, one statement at a time.
//! Transactions are implicit. The first `execute` after a `commit` or
//! `rollback` opens a new one; `query` reads outside of any explicit
//! transaction work.

use chrono::{DateTime, Utc};

use crate::error::DbError;

/// A single open connection to the target database.
pub trait Connection {
    /// Execute `sql` inside the current transaction. `params` bind to the
    /// driver's positional placeholders in order.
    ///
    /// Returns the number of rows affected as reported by the driver.
    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64, DbError>;

    /// Run a read query and return every row.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>, DbError>;

    /// Commit the current transaction. A no-op when nothing is pending.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Roll back the current transaction. A no-op when nothing is pending.
    fn rollback(&mut self) -> Result<(), DbError>;

    /// Release the connection. Further calls are driver-defined.
    fn close(&mut self) -> Result<(), DbError>;
}

/// Opens connections. One call is one attempt; retry lives in
/// [`ConnectionProvider`](crate::ConnectionProvider).
pub trait Connector {
    type Connection: Connection;

    fn connect(&self) -> Result<Self::Connection, DbError>;
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A decoded column value. Only the shapes the deployer reads are modelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// One result row, columns in select order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(pub Vec<Value>);

impl Row {
    fn column(&self, idx: usize) -> Result<&Value, DbError> {
        self.0
            .get(idx)
            .ok_or_else(|| DbError::Decode(format!("row has no column {idx}")))
    }

    /// Column `idx` as text. NULL is an error.
    pub fn text(&self, idx: usize) -> Result<&str, DbError> {
        match self.column(idx)? {
            Value::Text(s) => Ok(s),
            other => Err(DbError::Decode(format!(
                "column {idx}: expected text, got {other:?}"
            ))),
        }
    }

    /// Column `idx` as a UTC timestamp. NULL is an error.
    pub fn timestamp(&self, idx: usize) -> Result<DateTime<Utc>, DbError> {
        match self.column(idx)? {
            Value::Timestamp(ts) => Ok(*ts),
            other => Err(DbError::Decode(format!(
                "column {idx}: expected timestamp, got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_check_shape() {
        let now = Utc::now();
        let row = Row(vec![
            Value::Text("usp_orders".into()),
            Value::Timestamp(now),
            Value::Null,
        ]);
        assert_eq!(row.text(0).unwrap(), "usp_orders");
        assert_eq!(row.timestamp(1).unwrap(), now);
        assert!(matches!(row.text(1), Err(DbError::Decode(_))));
        assert!(matches!(row.text(2), Err(DbError::Decode(_))));
        assert!(matches!(row.text(9), Err(DbError::Decode(_))));
    }
}
