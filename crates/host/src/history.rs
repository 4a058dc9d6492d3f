//! Bounded, persisted conversation log.
//!
//! The log is a flat string of `Role: content` lines. Appends and
//! persistence share one lock; critical sections stay short and no lock is
//! held across network I/O.

use parking_lot::Mutex;
use providers::adapter::CMD_OUTPUT_TAG;
use shared::Role;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Character budget for the in-memory log.
pub const MAX_HISTORY_CHARS: usize = 8000;

/// Assistant lines starting with these are dropped when loading, so past
/// refusals never feed back into the prompt.
const REFUSAL_PREFIXES: [&str; 4] = [
    "Nova: I cannot",
    "Nova: I am unable",
    "Nova: I can't",
    "Nova: Sorry, I",
];

/// Cut from the start up to the first newline at-or-after the overflow
/// offset, so the result never begins mid-line.
pub fn trim_overflow(log: &mut String) {
    if log.len() <= MAX_HISTORY_CHARS {
        return;
    }
    let overflow = log.len() - MAX_HISTORY_CHARS;
    match log.as_bytes()[overflow..].iter().position(|&b| b == b'\n') {
        Some(offset) => {
            log.drain(..overflow + offset + 1);
        }
        None => {
            // One giant line; cut at the nearest char boundary instead.
            let mut cut = overflow;
            while !log.is_char_boundary(cut) {
                cut += 1;
            }
            log.drain(..cut);
        }
    }
}

pub struct History {
    log: Mutex<String>,
    path: PathBuf,
}

impl History {
    pub fn new(path: PathBuf) -> Self {
        Self {
            log: Mutex::new(String::new()),
            path,
        }
    }

    pub fn append(&self, role: Role, text: &str) {
        let mut log = self.log.lock();
        log.push_str(role.log_prefix());
        log.push_str(text);
        log.push_str("\r\n");
    }

    /// Append captured command output as a labeled system block.
    pub fn append_command_output(&self, output: &str) {
        let mut log = self.log.lock();
        log.push_str(CMD_OUTPUT_TAG);
        log.push_str("\r\n");
        log.push_str(output);
        log.push_str("\r\n");
    }

    pub fn trim(&self) {
        let mut log = self.log.lock();
        let before = log.len();
        trim_overflow(&mut log);
        if log.len() < before {
            debug!(chars = log.len(), "history trimmed");
        }
    }

    pub fn snapshot(&self) -> String {
        self.log.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }

    /// Reload from disk, dropping known refusal lines.
    pub fn load(&self) {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return;
        };
        let mut clean = String::new();
        for line in raw.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if REFUSAL_PREFIXES.iter().any(|p| line.starts_with(p)) {
                continue;
            }
            clean.push_str(line);
            clean.push('\n');
        }
        trim_overflow(&mut clean);
        debug!(chars = clean.len(), "history loaded");
        *self.log.lock() = clean;
    }

    /// Best-effort save; logs and continues on failure.
    pub fn save(&self) {
        let log = self.log.lock();
        if let Err(e) = fs::write(&self.path, log.as_bytes()) {
            warn!(path = %self.path.display(), error = %e, "could not save history");
        } else {
            debug!(chars = log.len(), "history saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_uses_role_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let history = History::new(dir.path().join("h.txt"));
        history.append(Role::User, "hello");
        history.append(Role::Assistant, "hi");
        assert_eq!(history.snapshot(), "User: hello\r\nNova: hi\r\n");
    }

    #[test]
    fn trim_respects_budget_and_line_boundary() {
        let mut log = String::new();
        while log.len() <= MAX_HISTORY_CHARS + 500 {
            log.push_str("User: some message that pads out the log\r\n");
        }
        let untrimmed = log.clone();
        trim_overflow(&mut log);
        assert!(log.len() <= MAX_HISTORY_CHARS);
        // The result begins immediately after a newline boundary.
        assert!(log.starts_with("User: "));
        let dropped = untrimmed.len() - log.len();
        assert_eq!(untrimmed.as_bytes()[dropped - 1], b'\n');
    }

    #[test]
    fn trim_single_giant_line() {
        let mut log = "x".repeat(MAX_HISTORY_CHARS + 100);
        trim_overflow(&mut log);
        assert_eq!(log.len(), MAX_HISTORY_CHARS);
    }

    #[test]
    fn trim_noop_under_budget() {
        let mut log = String::from("User: short\r\n");
        let before = log.clone();
        trim_overflow(&mut log);
        assert_eq!(log, before);
    }

    #[test]
    fn load_filters_refusal_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nova_history.txt");
        fs::write(
            &path,
            "User: do the thing\r\nNova: I cannot do that\r\nNova: Sure, done.\r\nNova: Sorry, I must decline\r\n",
        )
        .unwrap();
        let history = History::new(path);
        history.load();
        let log = history.snapshot();
        assert!(log.contains("User: do the thing"));
        assert!(log.contains("Nova: Sure, done."));
        assert!(!log.contains("I cannot"));
        assert!(!log.contains("Sorry, I"));
    }

    #[test]
    fn save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nova_history.txt");
        let history = History::new(path.clone());
        history.append(Role::User, "persist me");
        history.save();

        let reloaded = History::new(path);
        reloaded.load();
        assert!(reloaded.snapshot().contains("User: persist me"));
    }
}
