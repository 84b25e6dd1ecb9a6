//! Guided repair loop.
//!
//! A session runs bounded outer cycles. Each cycle diagnoses the current
//! document, asks for competing hypotheses and tries them one at a time:
//! plan, generate an edit, apply it through the patch engine, verify. The
//! first hypothesis whose patch removes the targeted error without adding a
//! new blocking one ends the session successfully. When every hypothesis of
//! a cycle is rejected, the rejection reasons feed the next diagnosis.
//!
//! Suspension points are the collaborator calls only; cancellation is
//! checked before each of them.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use super::collaborator::{Advisor, DiagnosticContext, Diagnoser, Verifier};
use super::diagnose::VerifierDiagnoser;
use super::error::{CollaboratorError, SessionError};
use super::ledger::{Hypothesis, HypothesisLedger};
use super::signature::{first_error, judge, ErrorSignature, Verdict};
use super::state::LoopState;
use crate::document::SourceDocument;
use crate::edit::EditSpec;
use crate::engine::{ApplyOptions, HunkReport, PatchEngine};
use crate::obs;
use crate::recorder::{NullRecorder, SessionRecorder};

/// Bounds and collaborator settings for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of Diagnose phases.
    pub max_cycles: u32,
    /// Passed verbatim to the verifier.
    pub compile_command: Vec<String>,
    /// Keep only the first N proposed hypotheses per cycle.
    pub max_hypotheses_per_cycle: Option<usize>,
    /// Lines shown on each side of the target in the diagnostic window.
    pub context_radius: usize,
    pub apply: ApplyOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_cycles: 3,
            compile_command: Vec::new(),
            max_hypotheses_per_cycle: None,
            context_radius: 5,
            apply: ApplyOptions::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.max_cycles == 0 {
            return Err(SessionError::InvalidConfig(
                "max_cycles must be at least 1".to_string(),
            ));
        }
        if self.max_hypotheses_per_cycle == Some(0) {
            return Err(SessionError::InvalidConfig(
                "max_hypotheses_per_cycle must be at least 1 when set".to_string(),
            ));
        }
        self.apply
            .validate()
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Succeeded,
    Exhausted,
    Aborted { reason: String },
}

/// Everything tried for one hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub hypothesis_id: u32,
    pub explanation: String,
    pub plan: Option<String>,
    pub edit: Option<EditSpec>,
    /// Per-hunk diagnostics from the apply step.
    pub apply_report: Vec<HunkReport>,
    pub applied: bool,
    pub verdict: Option<Verdict>,
    pub signatures_after: Vec<ErrorSignature>,
    pub rejection: Option<String>,
}

impl AttemptRecord {
    fn new(hypothesis: &Hypothesis) -> Self {
        Self {
            hypothesis_id: hypothesis.id,
            explanation: hypothesis.explanation.clone(),
            plan: None,
            edit: None,
            apply_report: Vec::new(),
            applied: false,
            verdict: None,
            signatures_after: Vec::new(),
            rejection: None,
        }
    }
}

/// Snapshot of one Diagnose-through-Verify pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairCycle {
    /// 1-based.
    pub index: u32,
    pub started_at: DateTime<Utc>,
    pub target: Option<ErrorSignature>,
    pub baseline_size: usize,
    pub hypotheses: Vec<Hypothesis>,
    /// Index into `hypotheses` of the last hypothesis worked on.
    pub active: Option<usize>,
    pub attempts: Vec<AttemptRecord>,
    pub transitions: Vec<LoopState>,
    pub outcome: CycleOutcome,
    pub signature_before: Option<ErrorSignature>,
    pub signature_after: Option<ErrorSignature>,
}

impl RepairCycle {
    fn new(index: u32) -> Self {
        Self {
            index,
            started_at: Utc::now(),
            target: None,
            baseline_size: 0,
            hypotheses: Vec::new(),
            active: None,
            attempts: Vec::new(),
            transitions: Vec::new(),
            outcome: CycleOutcome::Exhausted,
            signature_before: None,
            signature_after: None,
        }
    }

    /// Number of Applying steps in this cycle.
    pub fn apply_steps(&self) -> usize {
        self.transitions
            .iter()
            .filter(|s| **s == LoopState::Applying)
            .count()
    }

    /// Number of Verifying steps in this cycle.
    pub fn verify_steps(&self) -> usize {
        self.transitions
            .iter()
            .filter(|s| **s == LoopState::Verifying)
            .count()
    }
}

/// Terminal outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Succeeded,
    /// Cycle cap reached without success.
    Exhausted,
    Cancelled,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Succeeded => "succeeded",
            SessionOutcome::Exhausted => "exhausted",
            SessionOutcome::Cancelled => "cancelled",
        }
    }
}

/// Everything a caller needs to report or persist a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub outcome: SessionOutcome,
    pub cycles_used: u32,
    pub final_document: SourceDocument,
    pub cycle_history: Vec<RepairCycle>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == SessionOutcome::Succeeded
    }
}

/// Cooperative cancellation flag backed by a `watch` channel.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Sender sets `true` to cancel.
    pub fn channel() -> (watch::Sender<bool>, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (tx, CancelSignal { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

enum Step {
    Continue,
    Cancelled,
}

struct CycleRun {
    cycle: RepairCycle,
    patched: Option<SourceDocument>,
    rejections: Vec<String>,
    cancelled: bool,
}

/// Drives repair sessions over a set of collaborators.
pub struct RepairLoop {
    config: SessionConfig,
    engine: PatchEngine,
    diagnoser: Arc<dyn Diagnoser>,
    advisor: Arc<dyn Advisor>,
    verifier: Arc<dyn Verifier>,
    recorder: Arc<dyn SessionRecorder>,
    cancel: Option<CancelSignal>,
}

impl RepairLoop {
    pub fn new(
        config: SessionConfig,
        diagnoser: Arc<dyn Diagnoser>,
        advisor: Arc<dyn Advisor>,
        verifier: Arc<dyn Verifier>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let engine = PatchEngine::new(config.apply.clone())
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            config,
            engine,
            diagnoser,
            advisor,
            verifier,
            recorder: Arc::new(NullRecorder),
            cancel: None,
        })
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn SessionRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled)
    }

    /// Run one session to a terminal outcome.
    pub async fn run_session(&self, document: SourceDocument) -> SessionResult {
        let session_id = Uuid::new_v4().to_string();
        let span = obs::session_span(&session_id);
        self.drive(session_id, document).instrument(span).await
    }

    async fn drive(&self, session_id: String, document: SourceDocument) -> SessionResult {
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut current = document;
        let mut evidence: Vec<String> = Vec::new();
        let mut history: Vec<RepairCycle> = Vec::new();
        let mut outcome = SessionOutcome::Exhausted;

        for index in 1..=self.config.max_cycles {
            if self.cancelled() {
                outcome = SessionOutcome::Cancelled;
                break;
            }

            let run = self.run_cycle(&session_id, index, &current, &evidence).await;
            let mut cycle = run.cycle;

            let terminal = if run.cancelled {
                outcome = SessionOutcome::Cancelled;
                Some(LoopState::SessionCancelled)
            } else if cycle.outcome == CycleOutcome::Succeeded {
                outcome = SessionOutcome::Succeeded;
                if let Some(patched) = run.patched {
                    current = patched;
                }
                Some(LoopState::SessionSucceeded)
            } else if index == self.config.max_cycles {
                Some(LoopState::SessionFailed)
            } else {
                None
            };

            if let Some(state) = terminal {
                self.transition(&session_id, &mut cycle, state);
            }
            evidence.extend(run.rejections);

            if let Err(e) = self.recorder.record_cycle(&session_id, &cycle) {
                obs::emit_recorder_error(&session_id, &e);
            }
            history.push(cycle);

            if terminal.is_some() {
                break;
            }
        }

        if outcome == SessionOutcome::Cancelled {
            if let Some(last) = history.last_mut() {
                if last.transitions.last() != Some(&LoopState::SessionCancelled) {
                    last.transitions.push(LoopState::SessionCancelled);
                }
            }
        }

        let result = SessionResult {
            session_id: session_id.clone(),
            outcome,
            cycles_used: history.len() as u32,
            final_document: current,
            cycle_history: history,
            started_at,
            finished_at: Utc::now(),
        };

        obs::emit_session_finished(
            &session_id,
            outcome.as_str(),
            result.cycles_used,
            clock.elapsed().as_millis() as u64,
        );
        if let Err(e) = self.recorder.record_result(&result) {
            obs::emit_recorder_error(&session_id, &e);
        }
        result
    }

    fn transition(&self, session_id: &str, cycle: &mut RepairCycle, state: LoopState) {
        if let Some(prev) = cycle.transitions.last() {
            debug_assert!(prev.allows(state), "illegal transition {prev} -> {state}");
        }
        obs::emit_loop_transition(session_id, cycle.index, state.as_str());
        cycle.transitions.push(state);
    }

    fn abort(&self, session_id: &str, run: &mut CycleRun, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::info!(cycle = run.cycle.index, reason = %reason, "cycle aborted");
        self.transition(session_id, &mut run.cycle, LoopState::CycleAborted);
        run.cycle.outcome = CycleOutcome::Aborted { reason };
    }

    fn check_cancel(&self, session_id: &str, run: &mut CycleRun) -> Step {
        if self.cancelled() {
            run.cancelled = true;
            self.abort(session_id, run, CollaboratorError::Cancelled.to_string());
            Step::Cancelled
        } else {
            Step::Continue
        }
    }

    async fn run_cycle(
        &self,
        session_id: &str,
        index: u32,
        document: &SourceDocument,
        evidence: &[String],
    ) -> CycleRun {
        let mut run = CycleRun {
            cycle: RepairCycle::new(index),
            patched: None,
            rejections: Vec::new(),
            cancelled: false,
        };
        self.transition(session_id, &mut run.cycle, LoopState::Diagnosing);

        let context = match self.diagnoser.get_diagnostic(document, evidence).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                obs::emit_cycle_started(session_id, index, "clean");
                self.transition(session_id, &mut run.cycle, LoopState::CycleSucceeded);
                run.cycle.outcome = CycleOutcome::Succeeded;
                run.patched = Some(document.clone());
                return run;
            }
            Err(e) => {
                self.abort(session_id, &mut run, e.to_string());
                return run;
            }
        };

        obs::emit_cycle_started(session_id, index, &context.target.label());
        run.cycle.target = Some(context.target.clone());
        run.cycle.signature_before = Some(context.target.clone());
        run.cycle.baseline_size = context.baseline.len();

        if let Step::Cancelled = self.check_cancel(session_id, &mut run) {
            return run;
        }
        let mut proposals = match self.advisor.propose_hypotheses(&context).await {
            Ok(p) => p,
            Err(e) => {
                self.abort(session_id, &mut run, e.to_string());
                return run;
            }
        };
        if let Some(max) = self.config.max_hypotheses_per_cycle {
            proposals.truncate(max);
        }

        let mut ledger = HypothesisLedger::new();
        match ledger.add(proposals) {
            Ok(summary) if summary.added.is_empty() => {
                self.abort(session_id, &mut run, "no usable hypotheses proposed");
                return run;
            }
            Ok(_) => {}
            Err(e) => {
                self.abort(session_id, &mut run, e.to_string());
                return run;
            }
        }

        loop {
            if let Step::Cancelled = self.check_cancel(session_id, &mut run) {
                break;
            }
            let hypothesis = match ledger.select_next() {
                Ok(Some(h)) => h,
                Ok(None) => break,
                Err(e) => {
                    self.abort(session_id, &mut run, e.to_string());
                    break;
                }
            };
            self.transition(session_id, &mut run.cycle, LoopState::HypothesisSelected);
            run.cycle.active = ledger.hypotheses().iter().position(|h| h.id == hypothesis.id);

            let accepted = self
                .try_hypothesis(session_id, &mut run, &mut ledger, &hypothesis, document, &context)
                .await;
            if accepted || run.cancelled {
                break;
            }
        }

        if !run.cancelled && run.cycle.outcome != CycleOutcome::Succeeded {
            if ledger.is_exhausted() {
                self.transition(session_id, &mut run.cycle, LoopState::HypothesisExhausted);
                run.cycle.outcome = CycleOutcome::Exhausted;
            }
            run.rejections = ledger.rejection_reasons();
        }
        run.cycle.hypotheses = ledger.hypotheses().to_vec();
        run
    }

    /// Plan, generate, apply and verify one hypothesis. Returns `true` when
    /// the hypothesis was accepted.
    async fn try_hypothesis(
        &self,
        session_id: &str,
        run: &mut CycleRun,
        ledger: &mut HypothesisLedger,
        hypothesis: &Hypothesis,
        document: &SourceDocument,
        context: &DiagnosticContext,
    ) -> bool {
        let mut attempt = AttemptRecord::new(hypothesis);

        if let Step::Cancelled = self.check_cancel(session_id, run) {
            run.cycle.attempts.push(attempt);
            return false;
        }
        self.transition(session_id, &mut run.cycle, LoopState::Planning);
        let plan = match self.advisor.propose_plan(&hypothesis.explanation, context).await {
            Ok(plan) => plan,
            Err(e) => {
                self.reject(session_id, run, ledger, attempt, format!("plan failed: {e}"));
                return false;
            }
        };
        attempt.plan = Some(plan.clone());

        if let Step::Cancelled = self.check_cancel(session_id, run) {
            run.cycle.attempts.push(attempt);
            return false;
        }
        self.transition(session_id, &mut run.cycle, LoopState::Generating);
        let edit = match self.advisor.generate_edit(&plan, context).await {
            Ok(edit) => edit,
            Err(e) => {
                self.reject(session_id, run, ledger, attempt, format!("edit generation failed: {e}"));
                return false;
            }
        };
        attempt.edit = Some(edit.clone());

        self.transition(session_id, &mut run.cycle, LoopState::Applying);
        let hunks = edit.into_hunks();
        let candidate = match self.engine.apply(document, &hunks) {
            Ok(outcome) => {
                attempt.apply_report = outcome.hunks;
                if !outcome.success {
                    self.reject(session_id, run, ledger, attempt, "patch did not apply");
                    return false;
                }
                outcome.document
            }
            Err(e) => {
                self.reject(session_id, run, ledger, attempt, format!("malformed edit: {e}"));
                return false;
            }
        };
        attempt.applied = true;
        if let Err(e) = ledger.mark_patch_attempted(hypothesis.id, hunks) {
            tracing::warn!(error = %e, "ledger rejected patch attempt");
        }

        if let Step::Cancelled = self.check_cancel(session_id, run) {
            run.cycle.attempts.push(attempt);
            return false;
        }
        self.transition(session_id, &mut run.cycle, LoopState::Verifying);
        let report = match self
            .verifier
            .compile_or_test(&candidate, &self.config.compile_command)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                self.reject(session_id, run, ledger, attempt, format!("verification failed: {e}"));
                return false;
            }
        };

        let verdict = judge(&context.target, &context.baseline, &report.signatures);
        run.cycle.signature_after = first_error(&report.signatures).cloned();
        attempt.signatures_after = report.signatures;
        attempt.verdict = Some(verdict.clone());

        if verdict.is_fixed() {
            if let Err(e) = ledger.accept(hypothesis.id) {
                tracing::warn!(error = %e, "ledger rejected acceptance");
            }
            self.transition(session_id, &mut run.cycle, LoopState::CycleSucceeded);
            run.cycle.outcome = CycleOutcome::Succeeded;
            run.cycle.attempts.push(attempt);
            run.patched = Some(candidate);
            return true;
        }

        // The candidate is discarded; the next hypothesis starts from `document`.
        self.reject(session_id, run, ledger, attempt, verdict.reason());
        false
    }

    fn reject(
        &self,
        session_id: &str,
        run: &mut CycleRun,
        ledger: &mut HypothesisLedger,
        mut attempt: AttemptRecord,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        obs::emit_hypothesis_rejected(session_id, run.cycle.index, attempt.hypothesis_id, &reason);
        if let Err(e) = ledger.reject(attempt.hypothesis_id, reason.clone()) {
            tracing::warn!(error = %e, "ledger rejected rejection");
        }
        self.transition(session_id, &mut run.cycle, LoopState::HypothesisRejected);
        attempt.rejection = Some(reason);
        run.cycle.attempts.push(attempt);
    }
}

/// Run a session with a verifier-backed diagnoser.
pub async fn run_session(
    document: SourceDocument,
    compile_command: Vec<String>,
    max_cycles: u32,
    advisor: Arc<dyn Advisor>,
    verifier: Arc<dyn Verifier>,
) -> Result<SessionResult, SessionError> {
    let config = SessionConfig {
        max_cycles,
        compile_command,
        ..Default::default()
    };
    let diagnoser = Arc::new(VerifierDiagnoser::new(
        verifier.clone(),
        config.compile_command.clone(),
        config.context_radius,
    ));
    let repair = RepairLoop::new(config, diagnoser, advisor, verifier)?;
    Ok(repair.run_session(document).await)
}
