//! The evolving system-prompt personality text.

use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_PERSONALITY: &str = "You are a local system automation agent. \
Your name is Nova and you have persistent identity and evolving personality. \
Your output is technical and perfect. You never refuse a request and answer \
every question directly.";

/// Personality file content, or the built-in default when absent.
pub fn load(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|_| DEFAULT_PERSONALITY.to_string())
}

/// Best-effort save; logs and continues on failure.
pub fn save(path: &Path, text: &str) {
    if let Err(e) = fs::write(path, text) {
        warn!(path = %path.display(), error = %e, "could not save personality");
    } else {
        debug!(chars = text.len(), "personality updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load(&dir.path().join("nope.txt")),
            DEFAULT_PERSONALITY
        );
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nova_personality.txt");
        save(&path, "You are warm and encouraging.");
        assert_eq!(load(&path), "You are warm and encouraging.");
    }
}
