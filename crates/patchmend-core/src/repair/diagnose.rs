//! Default diagnoser built on a verifier.

use std::sync::Arc;

use async_trait::async_trait;

use super::collaborator::{DiagnosticContext, Diagnoser, Verifier};
use super::error::CollaboratorResult;
use super::signature::first_error;
use crate::document::SourceDocument;

/// Compiles the document and targets its first blocking error.
pub struct VerifierDiagnoser {
    verifier: Arc<dyn Verifier>,
    compile_command: Vec<String>,
    context_radius: usize,
}

impl VerifierDiagnoser {
    pub fn new(verifier: Arc<dyn Verifier>, compile_command: Vec<String>, context_radius: usize) -> Self {
        Self {
            verifier,
            compile_command,
            context_radius,
        }
    }
}

#[async_trait]
impl Diagnoser for VerifierDiagnoser {
    async fn get_diagnostic(
        &self,
        document: &SourceDocument,
        previous_rejections: &[String],
    ) -> CollaboratorResult<Option<DiagnosticContext>> {
        let report = self
            .verifier
            .compile_or_test(document, &self.compile_command)
            .await?;

        let Some(target) = first_error(&report.signatures).cloned() else {
            return Ok(None);
        };

        let center = target.line_index().unwrap_or(0);
        Ok(Some(DiagnosticContext {
            window: document.numbered_window(center, self.context_radius),
            target,
            baseline: report.signatures,
            evidence: previous_rejections.to_vec(),
        }))
    }
}
