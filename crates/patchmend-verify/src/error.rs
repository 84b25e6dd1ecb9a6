//! Error types for command verification.

use patchmend_core::CollaboratorError;

/// Failures while staging or running a verification command.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("compile command is empty")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write candidate document: {0}")]
    Stage(#[source] std::io::Error),

    #[error("command failed while running: {0}")]
    Wait(#[source] std::io::Error),

    #[error("command timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Result type for verification operations.
pub type VerifyResult<T> = std::result::Result<T, VerifyError>;

impl From<VerifyError> for CollaboratorError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Timeout { secs } => CollaboratorError::Timeout {
                stage: "verify".to_string(),
                secs,
            },
            other => CollaboratorError::Verification(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_collaborator_timeout() {
        let err: CollaboratorError = VerifyError::Timeout { secs: 5 }.into();
        assert_eq!(
            err,
            CollaboratorError::Timeout {
                stage: "verify".to_string(),
                secs: 5
            }
        );
    }

    #[test]
    fn test_other_errors_map_to_verification() {
        let err: CollaboratorError = VerifyError::EmptyCommand.into();
        assert!(matches!(err, CollaboratorError::Verification(msg) if msg.contains("empty")));
    }
}
