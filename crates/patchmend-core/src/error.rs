//! Error taxonomy for patchmend.
//!
//! Only structural problems are `Err` values here. A hunk that fails to
//! match is reported inside [`crate::engine::ApplyOutcome`], and an
//! exhausted repair session is an ordinary [`crate::repair::SessionOutcome`].

use crate::recorder::RecordError;
use crate::repair::error::{CollaboratorError, LedgerError, SessionError};

/// Errors raised while parsing or applying an edit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    #[error("malformed edit at hunk {hunk}: {reason}")]
    MalformedEdit { hunk: usize, reason: String },

    #[error("unified diff parse error at line {line}: {reason}")]
    DiffParse { line: usize, reason: String },

    #[error("invalid apply options: {0}")]
    InvalidOptions(String),
}

impl PatchError {
    pub fn malformed(hunk: usize, reason: impl Into<String>) -> Self {
        PatchError::MalformedEdit {
            hunk,
            reason: reason.into(),
        }
    }
}

/// Umbrella error for callers that drive several subsystems.
#[derive(Debug, thiserror::Error)]
pub enum PatchmendError {
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("record error: {0}")]
    Record(#[from] RecordError),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for patchmend operations.
pub type Result<T> = std::result::Result<T, PatchmendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_error_display() {
        let err = PatchError::malformed(2, "empty anchor without insertion point");
        let msg = err.to_string();
        assert!(msg.contains("hunk 2"));
        assert!(msg.contains("empty anchor"));

        let err = PatchError::DiffParse {
            line: 7,
            reason: "bad header".to_string(),
        };
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn test_umbrella_from_conversions() {
        let err: PatchmendError = PatchError::InvalidOptions("threshold".to_string()).into();
        assert!(err.to_string().starts_with("patch error"));

        let err: PatchmendError = LedgerError::EmptyProposal.into();
        assert!(err.to_string().contains("ledger error"));
    }
}
