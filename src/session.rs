//! Session directory discovery
//!
//! A raw-sessions root holds one directory per session; the directory name
//! is the session identifier.

use crate::error::QcError;
use crate::table::CsvTable;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One session directory under the raw-sessions root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDir {
    /// Session identifier (the directory name)
    pub session_id: String,
    /// Directory path
    pub path: PathBuf,
}

impl SessionDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { session_id, path }
    }

    /// Path of a file inside the session directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Whether the session directory holds a regular file with this name
    pub fn has_file(&self, name: &str) -> bool {
        self.file(name).is_file()
    }

    /// Load a CSV file of the session, or `None` if it does not exist
    pub fn load_table(&self, name: &str) -> Result<Option<CsvTable>, QcError> {
        let path = self.file(name);
        if !path.is_file() {
            return Ok(None);
        }
        debug!(session = %self.session_id, file = %path.display(), "loading table");
        CsvTable::from_path(&path).map(Some)
    }
}

/// List session directories under `root`, sorted by name
///
/// A missing root yields no sessions rather than an error.
pub fn discover_sessions(root: &Path) -> Result<Vec<SessionDir>, QcError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.path().is_dir() {
            sessions.push(SessionDir::new(entry.path()));
        }
    }

    sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_sorted_directories_only() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("s2")).unwrap();
        fs::create_dir(root.path().join("s1")).unwrap();
        fs::write(root.path().join("notes.txt"), "x").unwrap();

        let sessions = discover_sessions(root.path()).unwrap();
        let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let root = TempDir::new().unwrap();
        let sessions = discover_sessions(&root.path().join("absent")).unwrap();
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_load_table_absent_file() {
        let root = TempDir::new().unwrap();
        let session = SessionDir::new(root.path());
        assert!(!session.has_file("auth_windows.csv"));
        assert!(session.load_table("auth_windows.csv").unwrap().is_none());

        fs::write(session.file("auth_windows.csv"), "a\n1\n").unwrap();
        let table = session.load_table("auth_windows.csv").unwrap().unwrap();
        assert_eq!(table.len(), 1);
    }
}
