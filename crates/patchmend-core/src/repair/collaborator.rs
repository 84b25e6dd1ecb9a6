//! External collaborators consumed by the repair loop.
//!
//! These are the only suspension points of a session: diagnosis, advice
//! (hypotheses, plan, edit) and compile/test verification. Implementations
//! own their own timeouts and report them as [`CollaboratorError::Timeout`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::CollaboratorResult;
use super::signature::ErrorSignature;
use crate::document::SourceDocument;
use crate::edit::EditSpec;

/// What the loop knows about the error it is targeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticContext {
    /// First blocking error.
    pub target: ErrorSignature,
    /// Every signature reported alongside the target.
    pub baseline: Vec<ErrorSignature>,
    /// Line-numbered source window around the target.
    pub window: String,
    /// Rejection reasons carried forward from earlier cycles.
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl DiagnosticContext {
    /// Plain-text rendering suitable for an advisor prompt.
    pub fn render(&self) -> String {
        let mut out = format!("error: {}\n\n{}", self.target.label(), self.window);
        if !self.evidence.is_empty() {
            out.push_str("\npreviously rejected:\n");
            for reason in &self.evidence {
                out.push_str("- ");
                out.push_str(reason);
                out.push('\n');
            }
        }
        out
    }
}

/// Captured result of one compile/test run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub stdout: String,
    pub stderr: String,
    pub signatures: Vec<ErrorSignature>,
    pub exit_code: Option<i32>,
}

impl VerifyReport {
    pub fn clean() -> Self {
        Self {
            exit_code: Some(0),
            ..Default::default()
        }
    }

    pub fn with_signatures(signatures: Vec<ErrorSignature>) -> Self {
        let exit_code = if signatures.iter().any(ErrorSignature::is_blocking) {
            Some(1)
        } else {
            Some(0)
        };
        Self {
            signatures,
            exit_code,
            ..Default::default()
        }
    }

    /// No blocking signatures.
    pub fn is_clean(&self) -> bool {
        !self.signatures.iter().any(ErrorSignature::is_blocking)
    }
}

/// Produces the diagnostic context for a cycle.
#[async_trait]
pub trait Diagnoser: Send + Sync {
    /// `Ok(None)` means the document has no blocking error.
    async fn get_diagnostic(
        &self,
        document: &SourceDocument,
        previous_rejections: &[String],
    ) -> CollaboratorResult<Option<DiagnosticContext>>;
}

/// Model-backed advice: hypotheses, plans and edits.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Mutually exclusive root-cause explanations, most likely first.
    async fn propose_hypotheses(&self, context: &DiagnosticContext)
        -> CollaboratorResult<Vec<String>>;

    async fn propose_plan(
        &self,
        hypothesis: &str,
        context: &DiagnosticContext,
    ) -> CollaboratorResult<String>;

    async fn generate_edit(
        &self,
        plan: &str,
        context: &DiagnosticContext,
    ) -> CollaboratorResult<EditSpec>;
}

/// Compiles or tests a candidate document.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn compile_or_test(
        &self,
        document: &SourceDocument,
        compile_command: &[String],
    ) -> CollaboratorResult<VerifyReport>;
}
