//! Error types for the repair loop.

use super::ledger::HypothesisState;

/// Hypothesis lifecycle violations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("hypothesis proposal must contain at least one explanation")]
    EmptyProposal,

    #[error("unknown hypothesis {0}")]
    UnknownHypothesis(u32),

    #[error("hypothesis {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: u32,
        from: HypothesisState,
        to: HypothesisState,
    },

    #[error("hypothesis {0} is already selected")]
    SelectionActive(u32),
}

/// Failure of an external collaborator call.
///
/// Always local to a cycle: it rejects a hypothesis or aborts the cycle,
/// never the session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("diagnosis failed: {0}")]
    Diagnosis(String),

    #[error("advisor failed: {0}")]
    Advice(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: String, secs: u64 },

    #[error("cancelled")]
    Cancelled,
}

/// Fatal construction errors for a repair session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;
