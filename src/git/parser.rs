use crate::error::GitResult;

/// Log pretty-format used whenever commit history is parsed:
/// NUL-separated so subjects may contain any printable character.
pub const LOG_FORMAT: &str = "%H%x00%an%x00%ad%x00%s";

/// One commit as reported by `git log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub subject: String,
}

impl CommitEntry {
    /// Abbreviated hash for display.
    pub fn short_hash(&self) -> &str {
        let end = self.hash.len().min(7);
        &self.hash[..end]
    }
}

/// Parse `git log` output produced with [`LOG_FORMAT`].
pub fn parse_log(output: &str) -> GitResult<Vec<CommitEntry>> {
    let mut commits = Vec::new();

    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        let mut parts = line.splitn(4, '\0');
        let hash = parts.next().unwrap_or_default().to_string();
        if hash.is_empty() {
            continue;
        }

        commits.push(CommitEntry {
            hash,
            author: parts.next().unwrap_or_default().to_string(),
            date: parts.next().unwrap_or_default().to_string(),
            subject: parts.next().unwrap_or_default().to_string(),
        });
    }

    Ok(commits)
}
