use crate::error::{GitError, GitResult};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the repository to operate on when no
/// `--repo` flag is given.
pub const REPO_ENV_VAR: &str = "REPO_ANALOG_REPO";

/// A validated reference to a git working tree.
///
/// Resolution happens once per invocation with the precedence
/// flag > environment > current directory; validity is re-checked by the
/// executor before every command rather than cached indefinitely.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    /// Resolve the repository for this invocation.
    pub fn resolve(flag: Option<&Path>) -> GitResult<Self> {
        let path = match flag {
            Some(p) => p.to_path_buf(),
            None => match env::var_os(REPO_ENV_VAR) {
                Some(v) => PathBuf::from(v),
                None => env::current_dir()?,
            },
        };

        Self::open(path)
    }

    /// Open a specific path, validating that it is a git working tree.
    pub fn open<P: AsRef<Path>>(path: P) -> GitResult<Self> {
        let path = path.as_ref().to_path_buf();
        Self::validate_at(&path)?;
        Ok(Self { path })
    }

    /// Check that `path` currently holds a git working tree.
    ///
    /// `.git` may be a directory (normal clone) or a file (linked
    /// worktree); both count.
    pub fn validate_at(path: &Path) -> GitResult<()> {
        if path.join(".git").exists() {
            Ok(())
        } else {
            Err(GitError::NotARepository(path.to_path_buf()))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
