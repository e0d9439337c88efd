//! Process-wide `tracing` setup for one CLI invocation.
//!
//! Events go to stderr and to the append-mode log file. The file sink is
//! unbuffered, so every event is on disk once it has been emitted. The
//! subscriber is installed as the thread default for as long as the returned
//! [`LoggingGuard`] lives; dropping the guard restores the previous
//! dispatcher.

use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::log_rotation::{rotate_if_needed, MAX_LOG_BYTES, MAX_ROTATED_FILES};

const DEFAULT_FILTER: &str = "info";
const QUIET_FILTER: &str = "warn";

/// Keeps the run's subscriber installed.
pub struct LoggingGuard {
    _subscriber: DefaultGuard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Rotate and open `log_file`, then install the stderr and file sinks.
///
/// `quiet` limits stderr to warnings; the file keeps the full level. A log
/// file that cannot be opened degrades to stderr only.
pub fn init(log_file: &Path, quiet: bool) -> LoggingGuard {
    let rotation = rotate_if_needed(log_file, MAX_LOG_BYTES, MAX_ROTATED_FILES);
    let opened = open_log_file(log_file).map(Arc::new);

    let stderr_filter = if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        env_filter()
    };
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .with_filter(stderr_filter);

    let file_layer = opened.as_ref().ok().cloned().map(|file| {
        fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(false)
            .with_filter(env_filter())
    });

    let subscriber = Registry::default().with(stderr_layer).with(file_layer);
    let guard = LoggingGuard {
        _subscriber: tracing::subscriber::set_default(subscriber),
    };

    match rotation {
        Ok(true) => tracing::info!(path = %log_file.display(), "log file rotated"),
        Ok(false) => {}
        Err(err) => tracing::warn!(path = %log_file.display(), error = %err, "log rotation failed"),
    }
    if let Err(err) = &opened {
        tracing::warn!(path = %log_file.display(), error = %err, "cannot open log file; logging to stderr only");
    }
    guard
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn events_reach_the_log_file() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("logs").join("deployment.log");
        {
            let _guard = init(&log, true);
            tracing::warn!("retained for the audit trail");
        }
        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.contains("retained for the audit trail"), "log: {contents}");
        assert!(contents.contains("WARN"));
    }

    #[test]
    fn events_are_on_disk_while_the_guard_is_alive() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("deployment.log");
        let _guard = init(&log, true);
        tracing::warn!(statement = 2, "executed statement");

        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.contains("executed statement"), "log: {contents}");
    }

    #[test]
    fn appends_across_runs() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("deployment.log");
        for run in 1..=2 {
            let _guard = init(&log, true);
            tracing::warn!(run, "run finished");
        }
        let contents = fs::read_to_string(&log).unwrap();
        assert_eq!(contents.matches("run finished").count(), 2);
    }
}
