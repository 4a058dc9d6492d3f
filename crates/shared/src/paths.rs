//! Locations of the persisted data files.

use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "nova_config.ini";
pub const HISTORY_FILE: &str = "nova_history.txt";
pub const PERSONALITY_FILE: &str = "nova_personality.txt";

/// Directory holding the config, history, and personality files.
#[derive(Debug, Clone)]
pub struct DataPaths {
    dir: PathBuf,
}

impl DataPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform data directory, created on first use; falls back to the
    /// current directory when the platform dirs are unavailable.
    pub fn default_dir() -> Self {
        let dir = directories::ProjectDirs::from("", "", "nova")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let _ = std::fs::create_dir_all(&dir);
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn history_file(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn personality_file(&self) -> PathBuf {
        self.dir.join(PERSONALITY_FILE)
    }
}
