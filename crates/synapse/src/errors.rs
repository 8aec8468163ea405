use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors attached to a single tool request or tool result.
///
/// These travel inside the conversation, so the model sees them as the outcome
/// of its call instead of the turn failing.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
