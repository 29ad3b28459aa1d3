//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::file::File;

/// Storage layout for the agent
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the update lock file path
    pub fn lock_file(&self) -> PathBuf {
        self.base_dir.join("hup.lock")
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // Shared with other updaters on the host
        Self::new("/tmp/work")
    }
}
