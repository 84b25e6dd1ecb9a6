//! patchmend core library
//!
//! Tolerant patch application for imprecise, model-generated edits, plus a
//! bounded hypothesis-driven repair loop built on top of it.
//!
//! - [`document`]: byte-exact line view of a source file
//! - [`edit`]: diff and snippet-pair edit input
//! - [`matching`]: the four anchor location strategies
//! - [`engine`]: the strategy cascade and splicing
//! - [`repair`]: hypotheses, verdicts and the session state machine
//! - [`recorder`]: cycle and session snapshots

pub mod config;
pub mod document;
pub mod edit;
pub mod engine;
pub mod error;
pub mod matching;
pub mod obs;
pub mod recorder;
pub mod repair;
pub mod telemetry;

pub use config::{load_config, PatchmendConfig, VerifierConfig};
pub use document::{Line, LineEnding, SourceDocument};
pub use edit::{EditHunk, EditSpec};
pub use engine::{
    apply, apply_text, ApplyOptions, ApplyOutcome, HunkFailure, HunkReport, PatchEngine,
    StrategyAttempt, TextOutcome,
};
pub use error::{PatchError, PatchmendError, Result};
pub use matching::{LocateStrategy, MatchCandidate, Matcher, StrategyKind};
pub use recorder::{FsRecorder, MemoryRecorder, NullRecorder, RecordError, SessionRecorder};
pub use repair::{
    run_session, Advisor, CancelSignal, CollaboratorError, CycleOutcome, DiagnosticContext,
    Diagnoser, ErrorSignature, Hypothesis, HypothesisLedger, HypothesisState, LedgerError,
    LoopState, RepairCycle, RepairLoop, SessionConfig, SessionError, SessionOutcome,
    SessionResult, Severity, Verdict, Verifier, VerifierDiagnoser, VerifyReport,
};

/// Crate version, as recorded in snapshots.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
