//! Guided repair: hypotheses, verification verdicts and the session loop.

pub mod collaborator;
pub mod diagnose;
pub mod error;
pub mod ledger;
pub mod scripted;
pub mod session;
pub mod signature;
pub mod state;

pub use collaborator::{Advisor, DiagnosticContext, Diagnoser, Verifier, VerifyReport};
pub use diagnose::VerifierDiagnoser;
pub use error::{CollaboratorError, LedgerError, SessionError};
pub use ledger::{Hypothesis, HypothesisLedger, HypothesisState};
pub use session::{
    run_session, AttemptRecord, CancelSignal, CycleOutcome, RepairCycle, RepairLoop,
    SessionConfig, SessionOutcome, SessionResult,
};
pub use signature::{first_error, judge, ErrorSignature, Severity, Verdict};
pub use state::LoopState;
