pub mod planner;
pub mod session;
pub mod transcript;

pub use planner::{Plan, PlannedCommand, Planner};
pub use session::{AgentOutcome, AgentSession, AgentState};
pub use transcript::{Transcript, TranscriptEntry};

use crate::error::GitError;
use crate::llm::client::LlmError;
use thiserror::Error;

/// Errors that abort an agent session. Individual command failures never
/// appear here; those are transcript data.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("planner returned an invalid plan: {0}")]
    InvalidPlan(String),

    #[error("planning budget exhausted without an answer: {0}")]
    BudgetExceeded(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Git(#[from] GitError),
}
