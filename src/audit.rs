use crate::config::Settings;
use crate::git::ExecutionResult;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Append-only record of what the agent ran (or tried to run) on the
/// user's behalf. Autonomous execution deserves a paper trail even when
/// the session transcript is long gone.
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create a logger at the default path,
    /// `~/.config/repo-analog/history.log`.
    pub fn new() -> std::io::Result<Self> {
        let dir = Settings::config_dir().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "HOME environment variable not set",
            )
        })?;

        Self::with_path(dir.join("history.log"))
    }

    /// Create a logger with a custom log path
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Record an executed command and how it ended.
    pub fn log_execution(
        &self,
        result: &ExecutionResult,
        repo_path: &Path,
    ) -> std::io::Result<()> {
        let status = if result.timed_out {
            "timeout".to_string()
        } else {
            format!(
                "exit:{}",
                result
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "?".to_string())
            )
        };

        self.append(&format!(
            "[{}] [{}] [{}] [{}] {}\n",
            Utc::now().to_rfc3339(),
            whoami(),
            repo_path.display(),
            status,
            result.spec.display_line()
        ))
    }

    /// Record a command the validator refused. Useful forensics when a
    /// model misbehaves or a prompt injection is attempted.
    pub fn log_rejection(
        &self,
        command: &str,
        rejection: &str,
        repo_path: &Path,
    ) -> std::io::Result<()> {
        self.append(&format!(
            "[{}] [{}] [{}] [REJECTED] command=\"{}\" reason=\"{}\"\n",
            Utc::now().to_rfc3339(),
            whoami(),
            repo_path.display(),
            command,
            rejection
        ))
    }

    fn append(&self, entry: &str) -> std::io::Result<()> {
        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(entry.as_bytes())?;
        file.flush()
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            let backup_path = self.log_path.with_extension("log.1");
            fs::rename(&self.log_path, backup_path)?;
        }

        Ok(())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}
