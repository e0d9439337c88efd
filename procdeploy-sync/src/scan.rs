//! Script discovery and loading.

use std::io;
use std::path::{Path, PathBuf};

use procdeploy_core::ScriptName;

use crate::error::{io_err, DeployError};

/// UTF-8 byte-order mark, tolerated at the start of a script.
const UTF8_BOM: &str = "\u{feff}";

/// A script file found in the scripts directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub name: ScriptName,
    pub path: PathBuf,
}

impl ScriptFile {
    /// File name with extension, for log lines.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.to_string())
    }

    /// Full text, leading BOM stripped. Non-UTF-8 content is an
    /// `InvalidData` error.
    pub fn read_text(&self) -> io::Result<String> {
        let bytes = std::fs::read(&self.path)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(match text.strip_prefix(UTF8_BOM) {
            Some(rest) => rest.to_string(),
            None => text,
        })
    }
}

/// List the scripts directly inside `dir` whose extension matches
/// `extension` (case-insensitive), sorted by script name.
///
/// A missing directory and a directory with no scripts are both fatal.
/// When two files share a stem (`a.sql`, `a.SQL`) the first in name order
/// wins and the other is skipped with a warning.
pub fn scan_dir(dir: &Path, extension: &str) -> Result<Vec<ScriptFile>, DeployError> {
    if !dir.is_dir() {
        return Err(DeployError::ScriptsDirMissing {
            path: dir.to_path_buf(),
        });
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, extension))
        .collect();
    paths.sort();

    let mut scripts: Vec<ScriptFile> = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            tracing::warn!(path = %path.display(), "skipping script with non UTF-8 name");
            continue;
        };
        let name = ScriptName::from(stem);
        if let Some(existing) = scripts.iter().find(|s| s.name == name) {
            tracing::warn!(
                path = %path.display(),
                kept = %existing.path.display(),
                "skipping script with duplicate name",
            );
            continue;
        }
        scripts.push(ScriptFile { name, path });
    }

    if scripts.is_empty() {
        return Err(DeployError::NoScripts {
            path: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }
    scripts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(scripts)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(scripts: &[ScriptFile]) -> Vec<&str> {
        scripts.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn lists_matching_files_sorted_by_name() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("usp_b.sql"), "SELECT 2").unwrap();
        fs::write(tmp.path().join("usp_a.SQL"), "SELECT 1").unwrap();
        fs::write(tmp.path().join("README.md"), "docs").unwrap();
        fs::write(tmp.path().join("usp_c.sql.bak"), "old").unwrap();
        fs::create_dir(tmp.path().join("nested.sql")).unwrap();

        let scripts = scan_dir(tmp.path(), "sql").unwrap();
        assert_eq!(names(&scripts), vec!["usp_a", "usp_b"]);
        assert_eq!(scripts[0].file_name(), "usp_a.SQL");
    }

    #[test]
    fn missing_directory_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = scan_dir(&tmp.path().join("nope"), "sql").unwrap_err();
        assert!(matches!(err, DeployError::ScriptsDirMissing { .. }), "got: {err}");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn directory_without_scripts_is_fatal() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        let err = scan_dir(tmp.path(), "sql").unwrap_err();
        assert!(matches!(err, DeployError::NoScripts { .. }), "got: {err}");
    }

    #[test]
    fn duplicate_stems_keep_first() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("usp_a.SQL"), "upper").unwrap();
        fs::write(tmp.path().join("usp_a.sql"), "lower").unwrap();
        let scripts = scan_dir(tmp.path(), "sql").unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].file_name(), "usp_a.SQL");
    }

    #[test]
    fn read_text_strips_bom() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("usp_bom.sql");
        fs::write(&path, b"\xEF\xBB\xBFSELECT 1").unwrap();
        let script = ScriptFile {
            name: ScriptName::from("usp_bom"),
            path,
        };
        assert_eq!(script.read_text().unwrap(), "SELECT 1");
    }

    #[test]
    fn read_text_rejects_invalid_utf8() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("usp_latin1.sql");
        fs::write(&path, b"SELECT '\xE9'").unwrap();
        let script = ScriptFile {
            name: ScriptName::from("usp_latin1"),
            path,
        };
        assert_eq!(script.read_text().unwrap_err().kind(), io::ErrorKind::InvalidData);
    }
}
