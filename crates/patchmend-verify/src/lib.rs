//! patchmend verify - compile/test verification via external commands
//!
//! Provides the process-backed [`Verifier`](patchmend_core::Verifier):
//! - Writes the candidate document to disk
//! - Runs the configured command under a timeout
//! - Parses compiler and interpreter output into error signatures

pub mod diagnostics;
pub mod error;
pub mod runner;

// Re-export key types
pub use diagnostics::{parse_signatures, signatures_from_output};
pub use error::{VerifyError, VerifyResult};
pub use runner::{CommandOutput, CommandVerifier, FILE_PLACEHOLDER};
