//! Retrying connection acquisition.

use std::time::Duration;

use procdeploy_core::RetryPolicy;

use crate::connection::Connector;
use crate::error::DbError;

/// Waits between connection attempts. Swapped for a recording fake in tests.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Hands out connections, retrying with a fixed delay.
#[derive(Debug)]
pub struct ConnectionProvider<K, S = ThreadSleeper> {
    connector: K,
    policy: RetryPolicy,
    sleeper: S,
}

impl<K: Connector> ConnectionProvider<K, ThreadSleeper> {
    pub fn new(connector: K, policy: RetryPolicy) -> Self {
        Self::with_sleeper(connector, policy, ThreadSleeper)
    }
}

impl<K: Connector, S: Sleeper> ConnectionProvider<K, S> {
    pub fn with_sleeper(connector: K, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            connector,
            policy,
            sleeper,
        }
    }

    /// Try up to `max_attempts` times, sleeping `delay` between attempts
    /// (not after the last one).
    ///
    /// Returns `DbError::RetriesExhausted` carrying the last attempt's error.
    pub fn connect(&self) -> Result<K::Connection, DbError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            match self.connector.connect() {
                Ok(conn) => {
                    tracing::info!(attempt, "successfully connected to the database");
                    return Ok(conn);
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "database connection attempt failed",
                    );
                    last = Some(err);
                    if attempt < attempts {
                        self.sleeper.sleep(self.policy.delay());
                    }
                }
            }
        }

        tracing::error!(attempts, "failed to connect to the database after multiple retries");
        Err(DbError::RetriesExhausted {
            attempts,
            last: Box::new(
                last.unwrap_or_else(|| DbError::Connect("no connection attempt was made".into())),
            ),
        })
    }
}
