//! Command execution pipeline: directive extraction, the security
//! blocklist, and bounded shell execution.
//!
//! The blocklist is advisory — a substring match on Nova's own files — not
//! a sandbox. Commands that time out are force-terminated rather than left
//! running.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Literal marker that introduces an embedded shell command in a reply.
pub const EXEC_TAG: &str = "EXEC:";

/// Default and extended execution timeouts.
const EXEC_TIMEOUT_SECS: u64 = 60;
const TOOLCHAIN_TIMEOUT_SECS: u64 = 300;

/// Build-tool invocations get the extended timeout.
const TOOLCHAIN_TOKENS: [&str; 4] = ["cl ", "msbuild", "cargo build", "make "];

/// Nova's own files; any command mentioning one is dropped whole.
const BLOCKED_TARGETS: [&str; 6] = [
    "nova_personality",
    "nova_history",
    "nova_config",
    "nova_dev_log",
    "nova.exe",
    "nova.pdb",
];

/// Result of one executed command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: String,
    pub output: String,
    pub success: bool,
    pub timed_out: bool,
}

/// Scan a reply for `EXEC:` directives; each runs to the end of its line.
pub fn extract_commands(reply: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut rest = reply;
    while let Some(idx) = rest.find(EXEC_TAG) {
        rest = &rest[idx + EXEC_TAG.len()..];
        let line = match rest.find('\n') {
            Some(end) => &rest[..end],
            None => rest,
        };
        let cmd = line.trim();
        if !cmd.is_empty() {
            commands.push(cmd.to_string());
        }
    }
    commands
}

/// Case-insensitive substring check against the protected targets.
pub fn is_blocked(command: &str) -> bool {
    let lower = command.to_lowercase();
    BLOCKED_TARGETS.iter().any(|b| lower.contains(b))
}

/// Byte-wise case-insensitive search for an ASCII needle. Indexing the
/// haystack at a returned position is safe: the match is pure ASCII, so it
/// always starts on a char boundary, even in multibyte text.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Recognize the quoted `Set-Content -Path '…' -Value '…'` idiom and
/// return (path, decoded content). Backtick-n sequences become newlines.
fn parse_content_write(command: &str) -> Option<(String, String)> {
    find_ascii_ci(command, "set-content")?;
    let path_tag = find_ascii_ci(command, "-path")?;
    let p1 = path_tag + command[path_tag..].find('\'')?;
    let p2 = p1 + 1 + command[p1 + 1..].find('\'')?;
    let val_tag = find_ascii_ci(command, "-value")?;
    let v1 = val_tag + command[val_tag..].find('\'')?;
    let v2 = command.rfind('\'')?;
    if v2 <= v1 {
        return None;
    }
    let path = command[p1 + 1..p2].to_string();
    let content = command[v1 + 1..v2].replace("`n", "\n");
    Some((path, content))
}

/// Execute one extracted command.
///
/// Returns `None` when the blocklist drops it (logged, never surfaced).
/// File-content writes are serviced directly without spawning a shell;
/// everything else goes through the system shell with piped output and a
/// bounded wait. The child is killed when the wait expires.
pub async fn run_command(command: &str) -> Option<CommandOutcome> {
    if is_blocked(command) {
        warn!(command, "blocked by security list");
        return None;
    }
    info!(command, "executing");

    if let Some((path, content)) = parse_content_write(command) {
        let success = match std::fs::write(&path, &content) {
            Ok(()) => {
                info!(path, "file write ok");
                true
            }
            Err(e) => {
                warn!(path, error = %e, "file write failed");
                false
            }
        };
        return Some(CommandOutcome {
            command: command.to_string(),
            output: String::new(),
            success,
            timed_out: false,
        });
    }

    let lower = command.to_lowercase();
    let timeout_secs = if TOOLCHAIN_TOKENS.iter().any(|t| lower.contains(t)) {
        TOOLCHAIN_TIMEOUT_SECS
    } else {
        EXEC_TIMEOUT_SECS
    };

    let (shell, shell_arg) = if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    };

    let child = Command::new(shell)
        .arg(shell_arg)
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            warn!(command, error = %e, "failed to spawn shell");
            return Some(CommandOutcome {
                command: command.to_string(),
                output: format!("Failed to execute: {e}"),
                success: false,
                timed_out: false,
            });
        }
    };

    // Dropping the wait future on timeout kills the child (kill_on_drop),
    // so a runaway command does not outlive its window.
    match tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        child.wait_with_output(),
    )
    .await
    {
        Ok(Ok(out)) => {
            let mut output = String::from_utf8_lossy(&out.stdout).to_string();
            let stderr = String::from_utf8_lossy(&out.stderr);
            if !stderr.is_empty() {
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&stderr);
            }
            debug!(command, bytes = output.len(), "command finished");
            Some(CommandOutcome {
                command: command.to_string(),
                output,
                success: out.status.success(),
                timed_out: false,
            })
        }
        Ok(Err(e)) => Some(CommandOutcome {
            command: command.to_string(),
            output: format!("Failed to execute: {e}"),
            success: false,
            timed_out: false,
        }),
        Err(_) => {
            warn!(command, timeout_secs, "command timed out, killed");
            Some(CommandOutcome {
                command: command.to_string(),
                output: format!("Command timed out after {timeout_secs} seconds"),
                success: false,
                timed_out: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_every_directive_in_order() {
        let reply = "Sure.\nEXEC: echo one\nsome text\nEXEC:   echo two  \r\nEXEC:\nEXEC: echo three";
        assert_eq!(
            extract_commands(reply),
            vec!["echo one", "echo two", "echo three"]
        );
    }

    #[test]
    fn no_directives_no_commands() {
        assert!(extract_commands("just a normal reply").is_empty());
    }

    #[test]
    fn blocklist_is_case_insensitive() {
        assert!(is_blocked("del NOVA_CONFIG.ini"));
        assert!(is_blocked("cat nova_history.txt | grep secret"));
        assert!(is_blocked("copy Nova.EXE backup.exe"));
        assert!(!is_blocked("echo hello world"));
    }

    #[tokio::test]
    async fn blocked_command_never_executes() {
        assert!(run_command("rm -f nova_personality.txt").await.is_none());
    }

    #[test]
    fn content_write_idiom_parses() {
        let cmd = "Set-Content -Path 'out.txt' -Value 'line one`nline two'";
        let (path, content) = parse_content_write(cmd).unwrap();
        assert_eq!(path, "out.txt");
        assert_eq!(content, "line one\nline two");
    }

    #[test]
    fn multibyte_text_around_tags_still_parses() {
        // Lowercasing some characters changes their byte length; tag
        // scanning must not carry offsets across that shift.
        let cmd = "set-content İİİİİİ-path€'a' -value 'b'";
        let (path, content) = parse_content_write(cmd).unwrap();
        assert_eq!(path, "a");
        assert_eq!(content, "b");
        assert!(parse_content_write("İ€ no directive here").is_none());
    }

    #[test]
    fn content_write_requires_both_quoted_args() {
        assert!(parse_content_write("Set-Content -Path out.txt").is_none());
        assert!(parse_content_write("echo Set-Content").is_none());
    }

    #[tokio::test]
    async fn direct_file_write_bypasses_shell() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("note.txt");
        let cmd = format!(
            "Set-Content -Path '{}' -Value 'hello`nworld'",
            target.display()
        );
        let outcome = run_command(&cmd).await.unwrap();
        assert!(outcome.success);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello\nworld");
    }

    #[tokio::test]
    async fn shell_output_is_captured() {
        let outcome = run_command("echo captured").await.unwrap();
        assert!(outcome.success);
        assert!(outcome.output.contains("captured"));
        assert!(!outcome.timed_out);
    }
}
