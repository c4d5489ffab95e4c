use crate::error::{GitError, GitResult};
use crate::git::command::CommandSpec;
use crate::git::repository::Repository;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time;

/// Marker appended to captured output that exceeded the size bound.
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Result of executing one git command. Immutable once produced; the
/// agent loop appends these to its transcript in execution order.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub spec: CommandSpec,
    /// None when the process was killed before exiting on its own.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Executes git commands within a repository as direct process
/// invocations.
///
/// Arguments are passed as an argument vector; pipes, redirection,
/// substitution, and variable expansion are never interpreted. That is a
/// deliberate security and determinism boundary, not a limitation.
#[derive(Debug)]
pub struct GitExecutor {
    repo_path: PathBuf,
    program: PathBuf,
    timeout: Duration,
    max_output_chars: usize,
}

impl GitExecutor {
    /// Create an executor with bounded output capture, for commands whose
    /// output feeds LLM context.
    pub fn new(repo: &Repository, timeout: Duration, max_output_chars: usize) -> Self {
        Self {
            repo_path: repo.path().to_path_buf(),
            program: PathBuf::from("git"),
            timeout,
            max_output_chars,
        }
    }

    /// Create an executor that does not truncate, for pass-through
    /// commands whose output goes straight to the user.
    pub fn passthrough(repo: &Repository, timeout: Duration) -> Self {
        Self::new(repo, timeout, usize::MAX)
    }

    /// Override the executed binary. Exists for tests and for unusual
    /// installations where `git` is not on PATH.
    pub fn with_program<P: AsRef<Path>>(mut self, program: P) -> Self {
        self.program = program.as_ref().to_path_buf();
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Run one command spec to completion or deadline.
    ///
    /// A non-zero exit or a timeout is data (an `ExecutionResult`), not an
    /// error; `Err` is reserved for the repository disappearing or the
    /// process failing to spawn at all.
    pub async fn run(&self, spec: &CommandSpec) -> GitResult<ExecutionResult> {
        // The repository reference is re-validated on every execution
        // rather than trusted from resolution time.
        Repository::validate_at(&self.repo_path)?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-pager")
            .arg(&spec.subcommand)
            .args(&spec.args)
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let child = cmd.spawn().map_err(|e| {
            GitError::CommandFailed(format!("failed to spawn {}: {e}", self.program.display()))
        })?;

        match time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                let duration = started.elapsed();
                let (stdout, stdout_truncated) =
                    self.truncate(String::from_utf8_lossy(&output.stdout).into_owned());
                let (stderr, stderr_truncated) =
                    self.truncate(String::from_utf8_lossy(&output.stderr).into_owned());

                Ok(ExecutionResult {
                    spec: spec.clone(),
                    exit_code: output.status.code(),
                    stdout,
                    stderr,
                    duration,
                    timed_out: false,
                    stdout_truncated,
                    stderr_truncated,
                })
            }
            Err(_) => {
                // Deadline hit: dropping the wait future kills the child
                // (kill_on_drop). Captured output is lost with it.
                let duration = started.elapsed();
                log::warn!(
                    "git {} timed out after {:?}",
                    spec.subcommand,
                    self.timeout
                );

                Ok(ExecutionResult {
                    spec: spec.clone(),
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!("timed out after {:?}", self.timeout),
                    duration,
                    timed_out: true,
                    stdout_truncated: false,
                    stderr_truncated: false,
                })
            }
        }
    }

    fn truncate(&self, text: String) -> (String, bool) {
        if text.chars().count() <= self.max_output_chars {
            return (text, false);
        }

        let mut kept: String = text.chars().take(self.max_output_chars).collect();
        kept.truncate(kept.trim_end().len());
        kept.push_str(TRUNCATION_MARKER);
        (kept, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, Repository) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        StdCommand::new("git")
            .args(["init"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        StdCommand::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        StdCommand::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        let repo = Repository::open(&repo_path).unwrap();
        (temp_dir, repo)
    }

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) {
        fs::write(repo.path().join(name), content).unwrap();
        StdCommand::new("git")
            .args(["add", name])
            .current_dir(repo.path())
            .output()
            .unwrap();
        StdCommand::new("git")
            .args(["commit", "-m", message])
            .current_dir(repo.path())
            .output()
            .unwrap();
    }

    #[tokio::test]
    async fn test_execute_status() {
        let (_temp, repo) = create_test_repo();
        let executor = GitExecutor::new(&repo, Duration::from_secs(30), 4000);

        let result = executor
            .run(&CommandSpec::new("status", vec!["--porcelain".to_string()]))
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_data_not_error() {
        let (_temp, repo) = create_test_repo();
        let executor = GitExecutor::new(&repo, Duration::from_secs(30), 4000);

        // Log fails in an empty repository; that is an ExecutionResult,
        // not an Err.
        let result = executor
            .run(&CommandSpec::new("log", vec!["--oneline".to_string()]))
            .await
            .unwrap();

        assert!(!result.success());
        assert_ne!(result.exit_code, Some(0));
        assert!(!result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_hostile_pattern_is_literal() {
        let (_temp, repo) = create_test_repo();
        commit_file(&repo, "a.txt", "hello\n", "initial");
        let executor = GitExecutor::new(&repo, Duration::from_secs(30), 4000);

        // No shell is involved, so this is a search pattern and nothing
        // else. It matches nothing and the repository survives.
        let result = executor
            .run(&CommandSpec::new("grep", vec!["; rm -rf /".to_string()]))
            .await
            .unwrap();

        assert!(!result.success()); // no match -> exit 1
        assert!(repo.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_output_truncation() {
        let (_temp, repo) = create_test_repo();
        let big = "x".repeat(500);
        commit_file(&repo, "big.txt", &big, "big file");
        let executor = GitExecutor::new(&repo, Duration::from_secs(30), 100);

        let result = executor
            .run(&CommandSpec::new(
                "show",
                vec!["HEAD:big.txt".to_string()],
            ))
            .await
            .unwrap();

        assert!(result.stdout_truncated);
        assert!(result.stdout.ends_with(TRUNCATION_MARKER));
        assert!(result.stdout.chars().count() <= 100 + TRUNCATION_MARKER.len());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_produces_flagged_result() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, repo) = create_test_repo();

        // Stand-in binary that ignores its arguments and sleeps well past
        // the deadline.
        let script = repo.path().join("slow-git.sh");
        fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let executor =
            GitExecutor::new(&repo, Duration::from_secs(1), 4000).with_program(&script);

        let result = executor
            .run(&CommandSpec::new("log", vec![]))
            .await
            .unwrap();

        assert!(result.timed_out);
        assert!(!result.success());
        assert_eq!(result.exit_code, None);
        assert!(result.duration < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_repo_validity_rechecked_per_run() {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        StdCommand::new("git")
            .args(["init"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        let repo = Repository::open(&repo_path).unwrap();
        let executor = GitExecutor::new(&repo, Duration::from_secs(30), 4000);

        // Repository vanishes between resolution and execution
        fs::remove_dir_all(repo_path.join(".git")).unwrap();

        let result = executor.run(&CommandSpec::new("status", vec![])).await;
        assert!(matches!(result, Err(GitError::NotARepository(_))));
    }
}
