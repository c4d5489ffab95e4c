use crate::config::Settings;
use crate::error::GitResult;
use crate::git::{CommandSpec, CommitEntry, GitExecutor, LOG_FORMAT, Repository, parse_log};
use std::path::PathBuf;

/// Fixed-shape snapshot of repository state for the ask path.
///
/// Building a snapshot is deterministic: the same repository state and
/// the same settings produce a structurally identical snapshot, so
/// repeated questions send identical context to the model.
#[derive(Debug, Clone)]
pub struct RepoSnapshot {
    pub repo_path: PathBuf,
    pub branch: Option<String>,
    pub status: String,
    pub commits: Vec<CommitEntry>,
    pub grep_matches: Option<Vec<CommitEntry>>,
    pub staged_diff: Option<String>,
    pub working_diff: Option<String>,
}

impl RepoSnapshot {
    /// Render the snapshot as the context block sent to the model.
    pub fn render(&self) -> String {
        let mut parts = vec![format!("Repository: {}", self.repo_path.display())];

        match &self.branch {
            Some(branch) => parts.push(format!("Branch: {branch}")),
            None => parts.push("Branch: (detached HEAD)".to_string()),
        }

        parts.push(format!("Status:\n{}", self.status));

        parts.push(format!(
            "Recent commits:\n{}",
            render_commits(&self.commits)
        ));

        if let Some(matches) = &self.grep_matches {
            parts.push(format!("Grep results:\n{}", render_commits(matches)));
        }

        if let Some(diff) = &self.staged_diff {
            parts.push(format!("Staged diff:\n{diff}"));
        }

        if let Some(diff) = &self.working_diff {
            parts.push(format!("Working diff:\n{diff}"));
        }

        parts.join("\n\n")
    }
}

fn render_commits(commits: &[CommitEntry]) -> String {
    if commits.is_empty() {
        return "(none)".to_string();
    }

    commits
        .iter()
        .map(|c| {
            format!(
                "{} | {} | {} | {}",
                c.short_hash(),
                c.author,
                c.date,
                c.subject
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Gathers the ask-path snapshot with one bounded git command per field.
pub struct ContextBuilder<'a> {
    executor: GitExecutor,
    repo: &'a Repository,
    settings: &'a Settings,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(repo: &'a Repository, settings: &'a Settings) -> Self {
        let executor = GitExecutor::new(repo, settings.git_timeout, settings.max_output_chars);
        Self {
            executor,
            repo,
            settings,
        }
    }

    /// Build the snapshot. Individual command failures degrade to
    /// placeholder text rather than aborting: a question about a repo
    /// with no commits yet is still answerable.
    pub async fn snapshot(&self, grep: Option<&str>) -> GitResult<RepoSnapshot> {
        let branch = self.current_branch().await?;
        let status = self.capture(CommandSpec::new("status", svec(&["-sb"]))).await?;
        let commits = self.recent_commits().await?;

        let grep_matches = match grep {
            Some(pattern) => Some(self.grep_commits(pattern).await?),
            None => None,
        };

        let (staged_diff, working_diff) = if self.settings.include_diff {
            (
                Some(self.capture(CommandSpec::new("diff", svec(&["--staged"]))).await?),
                Some(self.capture(CommandSpec::new("diff", vec![])).await?),
            )
        } else {
            (None, None)
        };

        Ok(RepoSnapshot {
            repo_path: self.repo.path().to_path_buf(),
            branch,
            status,
            commits,
            grep_matches,
            staged_diff,
            working_diff,
        })
    }

    async fn current_branch(&self) -> GitResult<Option<String>> {
        let spec = CommandSpec::new("rev-parse", svec(&["--abbrev-ref", "HEAD"]));
        let result = self.executor.run(&spec).await?;

        if !result.success() {
            return Ok(None);
        }

        let branch = result.stdout.trim();
        if branch.is_empty() || branch == "HEAD" {
            Ok(None) // detached HEAD
        } else {
            Ok(Some(branch.to_string()))
        }
    }

    async fn recent_commits(&self) -> GitResult<Vec<CommitEntry>> {
        let spec = CommandSpec::new(
            "log",
            vec![
                format!("-n{}", self.settings.commit_limit),
                "--date=short".to_string(),
                format!("--pretty=format:{LOG_FORMAT}"),
            ],
        );

        let result = self.executor.run(&spec).await?;
        if !result.success() {
            // Typically an unborn branch; report no history
            return Ok(Vec::new());
        }

        parse_log(&result.stdout)
    }

    async fn grep_commits(&self, pattern: &str) -> GitResult<Vec<CommitEntry>> {
        let spec = CommandSpec::new(
            "log",
            vec![
                format!("-n{}", self.settings.commit_limit),
                "--date=short".to_string(),
                format!("--pretty=format:{LOG_FORMAT}"),
                format!("--grep={pattern}"),
            ],
        );

        let result = self.executor.run(&spec).await?;
        if !result.success() {
            return Ok(Vec::new());
        }

        parse_log(&result.stdout)
    }

    async fn capture(&self, spec: CommandSpec) -> GitResult<String> {
        let result = self.executor.run(&spec).await?;
        if result.success() {
            Ok(result.stdout.trim().to_string())
        } else {
            Ok(format!("<git error: {}>", result.stderr.trim()))
        }
    }
}

fn svec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
