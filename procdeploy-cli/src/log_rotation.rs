//! Size-based rotation for the deployment log.
//!
//! The live file is rotated before the logger opens it, so a run never
//! appends to a file that is already over the threshold:
//!   deployment.log → deployment.log.1 → … → deployment.log.5

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotate once the live file reaches this size (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Numbered backups kept next to the live file.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` if its size is at least `max_bytes`.
///
/// `<name>.<max_files>` is deleted, every `<name>.<n>` moves to
/// `<name>.<n+1>`, and the live file becomes `<name>.1`. The caller opens
/// a fresh live file afterwards.
///
/// Returns `true` if rotation occurred. A missing log file is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes || max_files == 0 {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

/// Path of the `n`-th backup of `base`, e.g. `deployment.log.2`.
pub fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("deployment.log");
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SMALL_LIMIT: u64 = 64;

    fn write_log(path: &Path, bytes: usize) {
        fs::write(path, vec![b'x'; bytes]).unwrap();
    }

    #[test]
    fn small_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("deployment.log");
        write_log(&log, 10);
        assert!(!rotate_if_needed(&log, SMALL_LIMIT, MAX_ROTATED_FILES).unwrap());
        assert!(log.exists());
        assert!(!numbered_path(&log, 1).exists());
    }

    #[test]
    fn oversized_file_moves_to_first_backup() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("deployment.log");
        write_log(&log, SMALL_LIMIT as usize + 1);

        assert!(rotate_if_needed(&log, SMALL_LIMIT, MAX_ROTATED_FILES).unwrap());
        assert!(!log.exists(), "live file is reopened by the logger");
        assert_eq!(
            fs::metadata(numbered_path(&log, 1)).unwrap().len(),
            SMALL_LIMIT + 1
        );
    }

    #[test]
    fn backups_are_capped() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("deployment.log");
        for n in 1..=MAX_ROTATED_FILES {
            fs::write(numbered_path(&log, n), format!("backup-{n}")).unwrap();
        }
        write_log(&log, SMALL_LIMIT as usize + 1);

        assert!(rotate_if_needed(&log, SMALL_LIMIT, MAX_ROTATED_FILES).unwrap());
        assert_eq!(
            fs::read_to_string(numbered_path(&log, MAX_ROTATED_FILES)).unwrap(),
            format!("backup-{}", MAX_ROTATED_FILES - 1)
        );
        assert!(!numbered_path(&log, MAX_ROTATED_FILES + 1).exists());
    }

    #[test]
    fn missing_file_is_not_rotated() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("absent.log");
        assert!(!rotate_if_needed(&log, SMALL_LIMIT, MAX_ROTATED_FILES).unwrap());
    }
}
