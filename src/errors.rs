use thiserror::Error;

use crate::types::RiskLevel;

/// Errors surfaced by the debugger API.
///
/// `Validation`, `Capacity` and `NotFound` fail the request without touching any session.
/// The remaining variants describe step-level failures: they are recorded in the session's
/// `error_state` and returned inside the command outcome instead of failing the call.
#[derive(Debug, Error)]
pub enum DebuggerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session limit reached: {max} active sessions")]
    Capacity { max: usize },

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Command blocked in safe mode: classified as {level} risk")]
    RiskBlocked { level: RiskLevel },

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Execution stopped: limit of {limit} steps reached")]
    StepLimitExceeded { limit: u64 },
}

impl From<ExecError> for DebuggerError {
    fn from(error: ExecError) -> Self {
        DebuggerError::Execution(error.to_string())
    }
}

/// Failures of the command executor
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to read command output: {0}")]
    Io(#[source] std::io::Error),

    #[error("command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("command output exceeded {limit} bytes")]
    OutputOverflow { limit: usize },
}

pub type Result<T> = std::result::Result<T, DebuggerError>;
