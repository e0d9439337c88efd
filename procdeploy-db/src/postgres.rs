//! PostgreSQL driver built on `sqlx`.
//!
//! `sqlx` is async; each connection owns a current-thread tokio runtime and
//! blocks on every call so the rest of the deployer stays synchronous.
//! Transactions are opened lazily with `BEGIN` on the first `execute` and
//! closed by `commit` / `rollback`.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Column, ConnectOptions, Connection as _, Row as _, TypeInfo};
use tokio::runtime::Runtime;

use procdeploy_core::ConnectionParams;

use crate::connection::{Connection, Connector, Row, Value};
use crate::error::DbError;

/// Opens [`PostgresConnection`]s from validated [`ConnectionParams`].
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    params: ConnectionParams,
}

impl PostgresConnector {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    /// Driver options for `params`. Pure; no I/O.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.params.server)
            .port(self.params.port)
            .database(&self.params.database)
            .username(&self.params.username)
            .password(&self.params.password)
            .application_name("procdeploy")
    }
}

impl Connector for PostgresConnector {
    type Connection = PostgresConnection;

    fn connect(&self) -> Result<PostgresConnection, DbError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let conn = runtime
            .block_on(self.connect_options().connect())
            .map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(PostgresConnection {
            runtime,
            conn: Some(conn),
            in_transaction: false,
        })
    }
}

/// One blocking PostgreSQL session.
pub struct PostgresConnection {
    runtime: Runtime,
    conn: Option<sqlx::PgConnection>,
    in_transaction: bool,
}

impl PostgresConnection {
    fn session(&mut self) -> Result<(&Runtime, &mut sqlx::PgConnection), DbError> {
        match self.conn.as_mut() {
            Some(conn) => Ok((&self.runtime, conn)),
            None => Err(DbError::Execute("connection already closed".to_string())),
        }
    }

    /// Run a transaction-control statement (`BEGIN`, `COMMIT`, `ROLLBACK`).
    fn control(&mut self, sql: &str, wrap: fn(String) -> DbError) -> Result<(), DbError> {
        let (runtime, conn) = self.session()?;
        runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut *conn))
            .map(|_| ())
            .map_err(|e| wrap(format!("{sql} failed: {e}")))
    }

    fn begin_if_needed(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            self.control("BEGIN", DbError::Execute)?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

impl Connection for PostgresConnection {
    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64, DbError> {
        self.begin_if_needed()?;
        let (runtime, conn) = self.session()?;
        let result = if params.is_empty() {
            // Simple-query protocol: accepts multi-statement bodies such as
            // procedure definitions.
            runtime.block_on(sqlx::raw_sql(sql).execute(&mut *conn))
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = query.bind(*param);
            }
            runtime.block_on(query.execute(&mut *conn))
        };
        result
            .map(|done| done.rows_affected())
            .map_err(|e| DbError::Execute(e.to_string()))
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        let (runtime, conn) = self.session()?;
        let rows = runtime
            .block_on(sqlx::query(sql).fetch_all(&mut *conn))
            .map_err(|e| DbError::Query(e.to_string()))?;
        rows.iter().map(decode_row).collect()
    }

    fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.control("COMMIT", DbError::Commit)
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.control("ROLLBACK", DbError::Rollback)
    }

    fn close(&mut self) -> Result<(), DbError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.in_transaction = false;
        self.runtime
            .block_on(conn.close())
            .map_err(|e| DbError::Connect(format!("close failed: {e}")))
    }
}

fn decode_row(row: &PgRow) -> Result<Row, DbError> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let decoded = match column.type_info().name() {
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(idx)
                .map(|v| v.map_or(Value::Null, Value::Timestamp)),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(idx)
                .map(|v| v.map_or(Value::Null, |ts| Value::Timestamp(ts.and_utc()))),
            _ => row
                .try_get::<Option<String>, _>(idx)
                .map(|v| v.map_or(Value::Null, Value::Text)),
        };
        let value = decoded
            .map_err(|e| DbError::Decode(format!("column '{}': {e}", column.name())))?;
        values.push(value);
    }
    Ok(Row(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            server: "db.internal".into(),
            database: "erp".into(),
            username: "deployer".into(),
            password: "hunter2".into(),
            port: 6543,
        }
    }

    #[test]
    fn connect_options_follow_params() {
        let connector = PostgresConnector::new(params());
        let options = connector.connect_options();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("erp"));
        assert_eq!(options.get_username(), "deployer");
    }

    #[test]
    fn connector_debug_hides_password() {
        let connector = PostgresConnector::new(params());
        assert!(!format!("{connector:?}").contains("hunter2"));
    }
}
