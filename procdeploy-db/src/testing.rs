//! In-memory database double for tests.
//!
//! [`FakeDatabase`] understands just enough of the metadata store's SQL to
//! model the table (create, select, upsert) and treats every other
//! statement as an opaque script statement. Effects are staged until
//! `commit` and discarded on `rollback`, so tests can observe exactly what
//! became durable.
//!
//! Failures are injected by flag or by statement substring.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::connection::{Connection, Connector, Row, Value};
use crate::error::DbError;
use crate::provider::Sleeper;

/// A persisted metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRecord {
    pub hash: String,
    pub first_deployed_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug)]
enum Staged {
    Statement(String),
    Upsert { name: String, hash: String },
}

#[derive(Debug, Default)]
struct FakeState {
    table_exists: bool,
    records: BTreeMap<String, FakeRecord>,
    staged: Vec<Staged>,
    attempted: Vec<String>,
    committed: Vec<String>,
    rolled_back: Vec<String>,
    rollbacks: usize,
    connects: usize,
    refuse_connects: usize,
    closes: usize,
    fail_on: Vec<String>,
    fail_commit_on: Vec<String>,
    fail_schema: bool,
    fail_load: bool,
    fail_upsert: bool,
}

/// Shared handle to one fake database. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    state: Rc<RefCell<FakeState>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose connections all share this database.
    pub fn connector(&self) -> FakeConnector {
        FakeConnector { db: self.clone() }
    }

    /// A connection opened directly, bypassing connect accounting.
    pub fn connection(&self) -> FakeConnection {
        FakeConnection { db: self.clone() }
    }

    // -- failure injection ---------------------------------------------------

    /// Fail any script statement containing `needle`.
    pub fn fail_statements_containing(&self, needle: &str) {
        self.state.borrow_mut().fail_on.push(needle.to_string());
    }

    /// Accept any script statement containing `needle`, then fail the
    /// commit that would make it durable. The statement stays staged for
    /// the caller's rollback.
    pub fn fail_commit_containing(&self, needle: &str) {
        self.state.borrow_mut().fail_commit_on.push(needle.to_string());
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_connects(&self, n: usize) {
        self.state.borrow_mut().refuse_connects = n;
    }

    pub fn fail_schema(&self) {
        self.state.borrow_mut().fail_schema = true;
    }

    pub fn fail_load(&self) {
        self.state.borrow_mut().fail_load = true;
    }

    pub fn fail_upsert(&self) {
        self.state.borrow_mut().fail_upsert = true;
    }

    /// Clear every injected failure.
    pub fn heal(&self) {
        let mut state = self.state.borrow_mut();
        state.fail_on.clear();
        state.fail_commit_on.clear();
        state.fail_schema = false;
        state.fail_load = false;
        state.fail_upsert = false;
        state.refuse_connects = 0;
    }

    /// Insert a committed metadata row (creating the table).
    pub fn seed_record(&self, name: &str, hash: &str) {
        let mut state = self.state.borrow_mut();
        state.table_exists = true;
        let now = Utc::now();
        state.records.insert(
            name.to_string(),
            FakeRecord {
                hash: hash.to_string(),
                first_deployed_at: now,
                last_updated_at: now,
            },
        );
    }

    // -- observation ---------------------------------------------------------

    pub fn table_exists(&self) -> bool {
        self.state.borrow().table_exists
    }

    pub fn record(&self, name: &str) -> Option<FakeRecord> {
        self.state.borrow().records.get(name).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state.borrow().records.len()
    }

    /// Every script statement passed to `execute`, including failed ones.
    pub fn attempted(&self) -> Vec<String> {
        self.state.borrow().attempted.clone()
    }

    /// Script statements made durable, in commit order.
    pub fn committed(&self) -> Vec<String> {
        self.state.borrow().committed.clone()
    }

    /// Script statements executed successfully but then rolled back.
    pub fn rolled_back(&self) -> Vec<String> {
        self.state.borrow().rolled_back.clone()
    }

    pub fn rollbacks(&self) -> usize {
        self.state.borrow().rollbacks
    }

    pub fn connects(&self) -> usize {
        self.state.borrow().connects
    }

    pub fn closes(&self) -> usize {
        self.state.borrow().closes
    }

    /// Metadata writes plus committed script statements.
    pub fn write_count(&self) -> usize {
        let state = self.state.borrow();
        state.committed.len() + state.records.len() + usize::from(state.table_exists)
    }
}

/// Opens [`FakeConnection`]s, honouring [`FakeDatabase::refuse_connects`].
#[derive(Debug, Clone)]
pub struct FakeConnector {
    db: FakeDatabase,
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    fn connect(&self) -> Result<FakeConnection, DbError> {
        let mut state = self.db.state.borrow_mut();
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            return Err(DbError::Connect("connection refused".to_string()));
        }
        state.connects += 1;
        Ok(self.db.connection())
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    db: FakeDatabase,
}

fn is_create_table(sql: &str) -> bool {
    sql.trim_start().starts_with("CREATE TABLE IF NOT EXISTS")
}

fn is_metadata_upsert(sql: &str, params: &[&str]) -> bool {
    sql.trim_start().starts_with("INSERT INTO") && sql.contains("ON CONFLICT") && params.len() == 2
}

impl Connection for FakeConnection {
    fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64, DbError> {
        let mut state = self.db.state.borrow_mut();

        if is_create_table(sql) {
            if state.fail_schema {
                return Err(DbError::Execute("permission denied for schema".to_string()));
            }
            state.table_exists = true;
            return Ok(0);
        }

        if is_metadata_upsert(sql, params) {
            if state.fail_upsert || !state.table_exists {
                return Err(DbError::Execute("metadata write rejected".to_string()));
            }
            state.staged.push(Staged::Upsert {
                name: params[0].to_string(),
                hash: params[1].to_string(),
            });
            return Ok(1);
        }

        state.attempted.push(sql.to_string());
        if state.fail_on.iter().any(|needle| sql.contains(needle.as_str())) {
            return Err(DbError::Execute(format!("syntax error near '{}'", first_line(sql))));
        }
        state.staged.push(Staged::Statement(sql.to_string()));
        Ok(0)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        let state = self.db.state.borrow();
        if state.fail_load {
            return Err(DbError::Query("canceling statement due to timeout".to_string()));
        }
        if !state.table_exists {
            return Err(DbError::Query("relation does not exist".to_string()));
        }
        let wants_timestamps = sql.contains("deployment_timestamp");
        Ok(state
            .records
            .iter()
            .map(|(name, record)| {
                let mut values = vec![Value::Text(name.clone()), Value::Text(record.hash.clone())];
                if wants_timestamps {
                    values.push(Value::Timestamp(record.first_deployed_at));
                    values.push(Value::Timestamp(record.last_updated_at));
                }
                Row(values)
            })
            .collect())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        let mut state = self.db.state.borrow_mut();
        let poisoned = state.staged.iter().find_map(|item| match item {
            Staged::Statement(sql)
                if state.fail_commit_on.iter().any(|needle| sql.contains(needle.as_str())) =>
            {
                Some(first_line(sql).to_string())
            }
            _ => None,
        });
        if let Some(line) = poisoned {
            return Err(DbError::Commit(format!(
                "deferred constraint violated by '{line}'"
            )));
        }
        let staged = std::mem::take(&mut state.staged);
        for item in staged {
            match item {
                Staged::Statement(sql) => state.committed.push(sql),
                Staged::Upsert { name, hash } => {
                    let now = Utc::now();
                    state
                        .records
                        .entry(name)
                        .and_modify(|r| {
                            r.hash = hash.clone();
                            r.last_updated_at = now;
                        })
                        .or_insert(FakeRecord {
                            hash,
                            first_deployed_at: now,
                            last_updated_at: now,
                        });
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        let mut state = self.db.state.borrow_mut();
        state.rollbacks += 1;
        let staged = std::mem::take(&mut state.staged);
        for item in staged {
            if let Staged::Statement(sql) = item {
                state.rolled_back.push(sql);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.db.state.borrow_mut().closes += 1;
        Ok(())
    }
}

fn first_line(sql: &str) -> &str {
    sql.lines().next().unwrap_or_default()
}

/// Records requested sleeps instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}
