use std::io;
use std::path::PathBuf;
use thiserror::Error;

// Import module-level errors for AppError
use crate::agent::AgentError;
use crate::config::settings::ConfigError;
use crate::llm::client::LlmError;
use crate::security::validator::ValidationError;

/// Errors that can occur during git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("git command failed: {0}")]
    CommandFailed(String),

    #[error("failed to parse git output: {0}")]
    ParseError(String),

    #[error("invalid command line: {0}")]
    InvalidCommandLine(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Top-level application error that wraps all module-specific errors
///
/// This provides a unified error type for application-level code while preserving
/// the specific error context from each module. All module errors automatically
/// convert to AppError via the `From` trait.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Command rejected: {0}")]
    Security(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    /// Exit code reported to the OS. The contract is zero on success,
    /// non-zero on any fatal failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Result type for git operations
pub type GitResult<T> = std::result::Result<T, GitError>;

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
