//! Structured observability hooks for apply calls and repair sessions.
//!
//! This module provides:
//! - A session-scoped tracing span via [`session_span`]
//! - Emission functions for key events: hunk matched/failed, apply
//!   finished, cycle started, loop transitions, hypothesis rejection and
//!   session completion
//!
//! Every event carries an `event = "..."` field so log pipelines can filter
//! on it. Verbosity follows `RUST_LOG` (see [`crate::telemetry`]).

use tracing::{debug, info, warn, Span};

use crate::matching::StrategyKind;

/// Span tagging everything inside a repair session with its id.
///
/// Attach it with `tracing::Instrument` so the session future stays `Send`.
///
/// # Example
///
/// ```ignore
/// async { /* ... */ }.instrument(session_span(&session_id)).await;
/// ```
pub fn session_span(session_id: &str) -> Span {
    tracing::info_span!("patchmend.session", session_id = %session_id)
}

/// Emit event: a hunk was located and spliced.
pub fn emit_hunk_matched(
    index: usize,
    strategy: StrategyKind,
    confidence: f64,
    start: usize,
    end: usize,
    ambiguous: bool,
) {
    debug!(
        event = "hunk.matched",
        index,
        strategy = %strategy,
        confidence,
        start,
        end,
        ambiguous,
        fuzzy = strategy.is_fuzzy(),
    );
}

/// Emit event: no strategy accepted a hunk.
pub fn emit_hunk_failed(index: usize, best_confidence: Option<f64>) {
    info!(
        event = "hunk.failed",
        index,
        best_confidence = best_confidence.unwrap_or(0.0),
    );
}

/// Emit event: an apply call finished.
pub fn emit_apply_finished(total_hunks: usize, matched_hunks: usize, success: bool) {
    info!(
        event = "apply.finished",
        total_hunks,
        matched_hunks,
        success,
    );
}

/// Emit event: an outer repair cycle started.
pub fn emit_cycle_started(session_id: &str, cycle: u32, target: &str) {
    info!(event = "cycle.started", session_id = %session_id, cycle, target = %target);
}

/// Emit event: the repair loop moved to a new state.
pub fn emit_loop_transition(session_id: &str, cycle: u32, state: &str) {
    debug!(event = "loop.transition", session_id = %session_id, cycle, state = %state);
}

/// Emit event: a hypothesis was rejected.
pub fn emit_hypothesis_rejected(session_id: &str, cycle: u32, hypothesis_id: u32, reason: &str) {
    info!(
        event = "hypothesis.rejected",
        session_id = %session_id,
        cycle,
        hypothesis_id,
        reason = %reason,
    );
}

/// Emit event: a session reached a terminal state.
pub fn emit_session_finished(session_id: &str, outcome: &str, cycles_used: u32, duration_ms: u64) {
    info!(
        event = "session.finished",
        session_id = %session_id,
        outcome = %outcome,
        cycles_used,
        duration_ms,
    );
}

/// Emit event: recording a cycle or result failed (warning level).
pub fn emit_recorder_error(session_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "recorder.error", session_id = %session_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_span_create() {
        let _entered = session_span("test-session-id").entered();
        emit_cycle_started("test-session-id", 1, "E0425");
        emit_hunk_matched(0, StrategyKind::ApproximateText, 0.91, 3, 5, false);
    }
}
