//! Scripted collaborators for tests and offline replay.
//!
//! `ScriptedAdvisor` replays a [`ReplayScript`] (one entry per cycle) and
//! `ScriptedVerifier` computes signatures from the candidate document with a
//! caller-supplied rule, so sessions run without a model or a compiler.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::collaborator::{Advisor, DiagnosticContext, Verifier, VerifyReport};
use super::error::{CollaboratorError, CollaboratorResult};
use super::signature::ErrorSignature;
use crate::document::SourceDocument;
use crate::edit::EditSpec;
use crate::error::{PatchmendError, Result};

/// One scripted hypothesis with its plan and edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedHypothesis {
    pub explanation: String,
    #[serde(default)]
    pub plan: String,
    pub edit: EditSpec,
}

/// Hypotheses offered in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptedCycle {
    pub hypotheses: Vec<ScriptedHypothesis>,
}

/// Full advisor replay, one entry per diagnose call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    pub cycles: Vec<ScriptedCycle>,
}

impl ReplayScript {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| match e {
            PatchmendError::Serialization(inner) => {
                PatchmendError::Config(format!("{}: {inner}", path.display()))
            }
            other => other,
        })
    }
}

/// Advisor that replays a [`ReplayScript`].
///
/// Runs past the end of the script propose no hypotheses.
#[derive(Debug, Default)]
pub struct ScriptedAdvisor {
    script: ReplayScript,
    cycle: AtomicUsize,
    current: Mutex<Option<ScriptedHypothesis>>,
}

impl ScriptedAdvisor {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            script,
            cycle: AtomicUsize::new(0),
            current: Mutex::new(None),
        }
    }

    /// Number of `propose_hypotheses` calls so far.
    pub fn cycles_served(&self) -> usize {
        self.cycle.load(Ordering::SeqCst)
    }

    fn current_cycle(&self) -> Option<&ScriptedCycle> {
        let served = self.cycle.load(Ordering::SeqCst);
        served.checked_sub(1).and_then(|i| self.script.cycles.get(i))
    }
}

#[async_trait]
impl Advisor for ScriptedAdvisor {
    async fn propose_hypotheses(
        &self,
        _context: &DiagnosticContext,
    ) -> CollaboratorResult<Vec<String>> {
        self.cycle.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .current_cycle()
            .map(|c| c.hypotheses.iter().map(|h| h.explanation.clone()).collect())
            .unwrap_or_default())
    }

    async fn propose_plan(
        &self,
        hypothesis: &str,
        _context: &DiagnosticContext,
    ) -> CollaboratorResult<String> {
        let found = self
            .current_cycle()
            .and_then(|c| c.hypotheses.iter().find(|h| h.explanation.trim() == hypothesis))
            .cloned()
            .ok_or_else(|| {
                CollaboratorError::Advice(format!("no scripted plan for hypothesis {hypothesis:?}"))
            })?;
        let plan = if found.plan.is_empty() {
            found.explanation.clone()
        } else {
            found.plan.clone()
        };
        *self.current.lock().unwrap() = Some(found);
        Ok(plan)
    }

    async fn generate_edit(
        &self,
        _plan: &str,
        _context: &DiagnosticContext,
    ) -> CollaboratorResult<EditSpec> {
        self.current
            .lock()
            .unwrap()
            .take()
            .map(|h| h.edit)
            .ok_or_else(|| CollaboratorError::Advice("edit requested before plan".to_string()))
    }
}

type SignatureRule = dyn Fn(&SourceDocument) -> Vec<ErrorSignature> + Send + Sync;

/// Verifier whose signatures are computed from the document by a rule.
pub struct ScriptedVerifier {
    rule: Box<SignatureRule>,
    calls: AtomicUsize,
}

impl ScriptedVerifier {
    pub fn from_fn<F>(rule: F) -> Self
    where
        F: Fn(&SourceDocument) -> Vec<ErrorSignature> + Send + Sync + 'static,
    {
        Self {
            rule: Box::new(rule),
            calls: AtomicUsize::new(0),
        }
    }

    /// Report `signature` whenever the document contains `needle`.
    pub fn error_while_contains(needle: impl Into<String>, signature: ErrorSignature) -> Self {
        let needle = needle.into();
        Self::from_fn(move |doc| {
            doc.lines()
                .iter()
                .position(|l| l.text.contains(&needle))
                .map(|i| vec![signature.clone().with_location(i as u32 + 1, Some(1))])
                .unwrap_or_default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn compile_or_test(
        &self,
        document: &SourceDocument,
        _compile_command: &[String],
    ) -> CollaboratorResult<VerifyReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(VerifyReport::with_signatures((self.rule)(document)))
    }
}
