//! Structured tracing events emitted by the engine and the repair loop.

use std::sync::Arc;

use patchmend_core::obs::{emit_hypothesis_rejected, emit_recorder_error, emit_session_finished};
use patchmend_core::repair::scripted::{ReplayScript, ScriptedAdvisor, ScriptedVerifier};
use patchmend_core::{apply, run_session, ApplyOptions, EditHunk, ErrorSignature, SourceDocument};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn apply_emits_hunk_and_summary_events() {
    let doc = SourceDocument::parse("a\nb\n");
    let hunks = vec![
        EditHunk::new(["a"], ["A"]),
        EditHunk::new(["nothing in this document resembles this anchor line"], ["x"]),
    ];

    let outcome = apply(&doc, &hunks, &ApplyOptions::default()).expect("apply");

    assert!(!outcome.success);
    assert!(logs_contain("hunk.matched"));
    assert!(logs_contain("hunk.failed"));
    assert!(logs_contain("apply.finished"));
}

#[traced_test]
#[test]
fn session_events_do_not_panic() {
    emit_hypothesis_rejected("sess-1", 1, 2, "target error persists");
    emit_session_finished("sess-1", "exhausted", 3, 1200);
    emit_recorder_error("sess-1", &"disk full");

    assert!(logs_contain("hypothesis.rejected"));
    assert!(logs_contain("recorder.error"));
}

#[tokio::test]
#[traced_test]
async fn session_run_logs_cycle_and_finish() {
    let verifier = Arc::new(ScriptedVerifier::error_while_contains(
        "bad",
        ErrorSignature::error("bad token"),
    ));
    let advisor = Arc::new(ScriptedAdvisor::new(ReplayScript::default()));

    let result = run_session(SourceDocument::parse("bad\n"), vec![], 1, advisor, verifier)
        .await
        .expect("session");

    assert!(!result.succeeded());
    assert!(logs_contain("cycle.started"));
    assert!(logs_contain("session.finished"));
}
