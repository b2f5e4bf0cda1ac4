//! Error handling for the coordination engine

use crate::operation::OperationHash;
use thiserror::Error;

/// Engine error taxonomy that crosses module boundaries.
///
/// Loosely-typed failures from the chain and the coordination service are
/// normalized into these variants at the collaborator seams, never propagated
/// raw into the lifecycle code.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("no signer available in this session")]
    NoSignerAvailable,

    #[error("insufficient confirmations: have {have}, need {need}")]
    InsufficientConfirmations { have: usize, need: usize },

    #[error("operation already executed: {0}")]
    AlreadyExecuted(OperationHash),

    #[error("execution already in flight: {0}")]
    ExecutionInFlight(OperationHash),

    #[error("unknown operation: {0}")]
    UnknownOperation(OperationHash),

    #[error("coordination service unavailable: {0}")]
    RemoteServiceUnavailable(String),

    #[error("execution reverted: {0}")]
    ExecutionReverted(String),

    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether this failure is recovered locally and shown to the user as
    /// plain text rather than propagated as a fault.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRecipient(_)
                | EngineError::NoSignerAvailable
                | EngineError::InsufficientConfirmations { .. }
                | EngineError::AlreadyExecuted(_)
                | EngineError::ExecutionInFlight(_)
        )
    }

    /// Render the user-facing message for recoverable failures
    pub fn user_message(&self) -> String {
        match self {
            EngineError::InsufficientConfirmations { have, need } => {
                format!("{have} of {need} required confirmations collected")
            }
            EngineError::AlreadyExecuted(_) => "operation was already executed".to_string(),
            EngineError::ExecutionInFlight(_) => "execution already in progress".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
