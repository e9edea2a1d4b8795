//! Persistent Login Flag.
//!
//! A single durable boolean recording that a session existed before. It is
//! stored as the string `"true"` or `"false"`; anything else reads as false.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

/// Durable "was previously logged in" flag.
///
/// Writes never fail the caller: losing the flag only costs one skipped
/// restore on the next start.
pub trait LoginFlag: Send + Sync + std::fmt::Debug {
    /// Read the flag.
    fn get(&self) -> bool;

    /// Write the flag.
    fn set(&self, value: bool);
}

/// Login flag stored in a file under the state directory.
#[derive(Debug, Clone)]
pub struct FileLoginFlag {
    path: PathBuf,
}

impl FileLoginFlag {
    /// Use the flag file at `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the flag file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LoginFlag for FileLoginFlag {
    fn get(&self) -> bool {
        std::fs::read_to_string(&self.path).is_ok_and(|raw| raw.trim() == "true")
    }

    fn set(&self, value: bool) {
        if let Some(dir) = self.path.parent()
            && let Err(e) = std::fs::create_dir_all(dir)
        {
            warn!(error = %e, path = %dir.display(), "Failed to create state directory");
            return;
        }
        if let Err(e) = std::fs::write(&self.path, if value { "true" } else { "false" }) {
            warn!(error = %e, path = %self.path.display(), "Failed to write login flag");
        }
    }
}

/// In-memory login flag, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryLoginFlag {
    value: AtomicBool,
}

impl MemoryLoginFlag {
    /// Create a flag with an initial value.
    #[must_use]
    pub const fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }
}

impl LoginFlag for MemoryLoginFlag {
    fn get(&self) -> bool {
        self.value.load(Ordering::SeqCst)
    }

    fn set(&self, value: bool) {
        self.value.store(value, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::LOGIN_FLAG_KEY;

    #[test]
    fn test_missing_file_reads_false() {
        let dir = tempfile::tempdir().unwrap();
        let flag = FileLoginFlag::new(dir.path().join(LOGIN_FLAG_KEY));
        assert!(!flag.get());
    }

    #[test]
    fn test_file_flag_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join(LOGIN_FLAG_KEY);
        FileLoginFlag::new(&path).set(true);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "true");
        assert!(FileLoginFlag::new(&path).get());

        FileLoginFlag::new(&path).set(false);
        assert!(!FileLoginFlag::new(&path).get());
    }

    #[test]
    fn test_garbage_reads_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOGIN_FLAG_KEY);
        std::fs::write(&path, "yes").unwrap();
        assert!(!FileLoginFlag::new(&path).get());
    }

    #[test]
    fn test_memory_flag() {
        let flag = MemoryLoginFlag::new(true);
        assert!(flag.get());
        flag.set(false);
        assert!(!flag.get());
    }
}
