//! Deny-list for obviously destructive shell commands.
//!
//! This is not a sandbox. It only stops the handful of commands that wipe a
//! root-like path or a block device when a model gets creative.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// `rm` with both recursive and force flags, in any spelling.
const RM_RECURSIVE_FORCE: &str = r"\brm\s+(?:-[a-zA-Z]*[rR][a-zA-Z]*f[a-zA-Z]*|-[a-zA-Z]*f[a-zA-Z]*[rR][a-zA-Z]*|(?:-[rR]|--recursive)\s+(?:-f|--force)|(?:-f|--force)\s+(?:-[rR]|--recursive))\s+(?:--no-preserve-root\s+)?";

/// Targets that count as root-like.
const ROOT_LIKE: &str = r#"["']?(?:/|/\*|~|~/|~/\*|\$HOME|\$HOME/|\$HOME/\*|\$\{HOME\}|\$\{HOME\}/)["']?(?:\s|;|&|\||$)"#;

static DENY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let rm = format!("{}{}", RM_RECURSIVE_FORCE, ROOT_LIKE);
    [
        ("recursive delete of a root-like path", rm.as_str()),
        ("filesystem format", r"\bmkfs(?:\.[a-z0-9]+)?\b"),
        ("raw write to a block device", r"\bdd\b[^|;&]*\bof=/dev/(?:sd|hd|nvme|disk|mmcblk|vd)"),
        ("redirect onto a block device", r">\s*/dev/(?:sd|hd|nvme|disk|mmcblk|vd)[a-z0-9]*"),
        ("fork bomb", r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:"),
        ("recursive permission change on /", r"\bch(?:mod|own)\s+-[a-zA-Z]*R[a-zA-Z]*\s+\S+\s+/(?:\s|;|&|\||$)"),
    ]
    .into_iter()
    .filter_map(|(label, pattern)| match Regex::new(pattern) {
        Ok(re) => Some((label, re)),
        Err(e) => {
            tracing::error!(pattern, error = %e, "Invalid guard pattern");
            None
        }
    })
    .collect()
});

/// Scans shell tool arguments against the deny-list.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandGuard;

impl CommandGuard {
    pub fn new() -> Self {
        Self
    }

    /// Returns the reason a single command is refused, if it is.
    pub fn check_command(&self, command: &str) -> Option<&'static str> {
        DENY_PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(command))
            .map(|(label, _)| *label)
    }

    /// Checks every string inside `args`, nested values included.
    ///
    /// Returns the offending string and the reason.
    pub fn check_args<'a>(&self, args: &'a Value) -> Option<(&'a str, &'static str)> {
        match args {
            Value::String(s) => self.check_command(s).map(|reason| (s.as_str(), reason)),
            Value::Array(items) => items.iter().find_map(|v| self.check_args(v)),
            Value::Object(map) => map.values().find_map(|v| self.check_args(v)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blocked(cmd: &str) -> bool {
        CommandGuard::new().check_command(cmd).is_some()
    }

    #[test]
    fn test_blocks_root_deletes() {
        assert!(blocked("rm -rf /"));
        assert!(blocked("rm -rf /*"));
        assert!(blocked("sudo rm -fr / "));
        assert!(blocked("rm -Rf ~"));
        assert!(blocked("rm -r -f $HOME"));
        assert!(blocked("rm --recursive --force /"));
        assert!(blocked("rm -rf --no-preserve-root /"));
        assert!(blocked("cd /tmp && rm -rf / ; echo done"));
        assert!(blocked("rm -rf \"/\""));
    }

    #[test]
    fn test_allows_scoped_deletes() {
        assert!(!blocked("rm -rf /tmp/build"));
        assert!(!blocked("rm -rf ./target"));
        assert!(!blocked("rm -rf ~/projects/old"));
        assert!(!blocked("rm file.txt"));
        assert!(!blocked("rm -r /var/tmp/cache"));
    }

    #[test]
    fn test_blocks_device_and_format_commands() {
        assert!(blocked("mkfs.ext4 /dev/sda1"));
        assert!(blocked("dd if=/dev/zero of=/dev/sda bs=1M"));
        assert!(blocked("echo x > /dev/sda"));
        assert!(blocked(":(){ :|:& };:"));
        assert!(blocked("chmod -R 777 /"));
    }

    #[test]
    fn test_allows_ordinary_commands() {
        assert!(!blocked("ls -la"));
        assert!(!blocked("dd if=in.img of=out.img"));
        assert!(!blocked("cargo build --release"));
        assert!(!blocked("chmod -R 755 ./scripts"));
    }

    #[test]
    fn test_check_args_scans_every_string() {
        let guard = CommandGuard::new();
        let args = json!({"cwd": "/work", "cmd": "rm -rf /"});
        let (offending, reason) = guard.check_args(&args).unwrap();
        assert_eq!(offending, "rm -rf /");
        assert!(reason.contains("recursive delete"));

        let nested = json!({"steps": ["echo hi", "rm -rf ~"]});
        assert!(guard.check_args(&nested).is_some());

        assert!(guard.check_args(&json!({"command": "ls", "timeout": 5})).is_none());
    }
}
