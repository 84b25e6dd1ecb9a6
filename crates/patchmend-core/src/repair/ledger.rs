//! Hypothesis lifecycle for a single repair cycle.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{LedgerError, LedgerResult};
use crate::edit::EditHunk;

/// Lifecycle state of a hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisState {
    Proposed,
    Selected,
    PatchAttempted,
    Rejected,
    Accepted,
}

impl HypothesisState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HypothesisState::Proposed => "proposed",
            HypothesisState::Selected => "selected",
            HypothesisState::PatchAttempted => "patch_attempted",
            HypothesisState::Rejected => "rejected",
            HypothesisState::Accepted => "accepted",
        }
    }

    /// Selected or patch attempted.
    pub fn is_active(&self) -> bool {
        matches!(self, HypothesisState::Selected | HypothesisState::PatchAttempted)
    }
}

impl fmt::Display for HypothesisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate root-cause explanation and what was tried for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: u32,
    pub explanation: String,
    pub state: HypothesisState,
    /// Hunks derived from this hypothesis' generated edit.
    #[serde(default)]
    pub hunks: Vec<EditHunk>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Summary of an [`HypothesisLedger::add`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddSummary {
    pub added: Vec<u32>,
    /// Blank or already-present explanations that were dropped.
    pub duplicates: usize,
}

/// Owns the hypotheses of one cycle, in proposal order.
#[derive(Debug, Clone, Default)]
pub struct HypothesisLedger {
    hypotheses: Vec<Hypothesis>,
    next_id: u32,
}

impl HypothesisLedger {
    pub fn new() -> Self {
        Self {
            hypotheses: Vec::new(),
            next_id: 1,
        }
    }

    /// Register new explanations; identical text (after trimming) is dropped.
    pub fn add<I, S>(&mut self, explanations: I) -> LedgerResult<AddSummary>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let explanations: Vec<String> = explanations.into_iter().map(Into::into).collect();
        if explanations.is_empty() {
            return Err(LedgerError::EmptyProposal);
        }

        let mut summary = AddSummary::default();
        for explanation in explanations {
            let text = explanation.trim();
            if text.is_empty() || self.hypotheses.iter().any(|h| h.explanation == text) {
                summary.duplicates += 1;
                continue;
            }
            let id = self.next_id.max(1);
            self.next_id = id + 1;
            self.hypotheses.push(Hypothesis {
                id,
                explanation: text.to_string(),
                state: HypothesisState::Proposed,
                hunks: Vec::new(),
                rejection_reason: None,
            });
            summary.added.push(id);
        }
        Ok(summary)
    }

    /// Select the first proposed hypothesis.
    pub fn select_next(&mut self) -> LedgerResult<Option<Hypothesis>> {
        if let Some(active) = self.active() {
            return Err(LedgerError::SelectionActive(active.id));
        }
        match self
            .hypotheses
            .iter_mut()
            .find(|h| h.state == HypothesisState::Proposed)
        {
            Some(h) => {
                h.state = HypothesisState::Selected;
                Ok(Some(h.clone()))
            }
            None => Ok(None),
        }
    }

    /// Record the hunks applied for the selected hypothesis.
    pub fn mark_patch_attempted(&mut self, id: u32, hunks: Vec<EditHunk>) -> LedgerResult<()> {
        let h = self.transition(id, HypothesisState::PatchAttempted, |s| {
            s == HypothesisState::Selected
        })?;
        h.hunks = hunks;
        Ok(())
    }

    pub fn reject(&mut self, id: u32, reason: impl Into<String>) -> LedgerResult<()> {
        let h = self.transition(id, HypothesisState::Rejected, |s| s.is_active())?;
        h.rejection_reason = Some(reason.into());
        Ok(())
    }

    pub fn accept(&mut self, id: u32) -> LedgerResult<()> {
        self.transition(id, HypothesisState::Accepted, |s| s.is_active())?;
        Ok(())
    }

    fn transition(
        &mut self,
        id: u32,
        to: HypothesisState,
        allowed: impl Fn(HypothesisState) -> bool,
    ) -> LedgerResult<&mut Hypothesis> {
        let h = self
            .hypotheses
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or(LedgerError::UnknownHypothesis(id))?;
        if !allowed(h.state) {
            return Err(LedgerError::InvalidTransition {
                id,
                from: h.state,
                to,
            });
        }
        h.state = to;
        Ok(h)
    }

    pub fn active(&self) -> Option<&Hypothesis> {
        self.hypotheses.iter().find(|h| h.state.is_active())
    }

    pub fn get(&self, id: u32) -> Option<&Hypothesis> {
        self.hypotheses.iter().find(|h| h.id == id)
    }

    pub fn hypotheses(&self) -> &[Hypothesis] {
        &self.hypotheses
    }

    pub fn len(&self) -> usize {
        self.hypotheses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }

    /// Every hypothesis has been rejected.
    pub fn is_exhausted(&self) -> bool {
        !self.hypotheses.is_empty()
            && self
                .hypotheses
                .iter()
                .all(|h| h.state == HypothesisState::Rejected)
    }

    pub fn accepted(&self) -> Option<&Hypothesis> {
        self.hypotheses
            .iter()
            .find(|h| h.state == HypothesisState::Accepted)
    }

    /// `"<explanation>: <reason>"` for each rejected hypothesis.
    pub fn rejection_reasons(&self) -> Vec<String> {
        self.hypotheses
            .iter()
            .filter_map(|h| {
                h.rejection_reason
                    .as_ref()
                    .map(|r| format!("{}: {}", h.explanation, r))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_empty_and_dedupes() {
        let mut ledger = HypothesisLedger::new();
        assert_eq!(
            ledger.add(Vec::<String>::new()),
            Err(LedgerError::EmptyProposal)
        );

        let summary = ledger
            .add(["missing import", "missing import ", "typo in name", ""])
            .expect("add");
        assert_eq!(summary.added, vec![1, 2]);
        assert_eq!(summary.duplicates, 2);

        let summary = ledger.add(["typo in name"]).expect("add");
        assert!(summary.added.is_empty());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_select_in_proposal_order() {
        let mut ledger = HypothesisLedger::new();
        ledger.add(["first", "second"]).expect("add");

        let h = ledger.select_next().expect("select").expect("some");
        assert_eq!(h.explanation, "first");
        assert_eq!(h.state, HypothesisState::Selected);

        // Only one selection at a time.
        assert_eq!(ledger.select_next(), Err(LedgerError::SelectionActive(1)));

        ledger.reject(1, "patch did not apply").expect("reject");
        let h = ledger.select_next().expect("select").expect("some");
        assert_eq!(h.id, 2);
    }

    #[test]
    fn test_exhaustion_after_all_rejected() {
        let mut ledger = HypothesisLedger::new();
        ledger.add(["a", "b"]).expect("add");
        assert!(!ledger.is_exhausted());

        for _ in 0..2 {
            let h = ledger.select_next().expect("select").expect("some");
            ledger
                .mark_patch_attempted(h.id, vec![EditHunk::new(["x"], ["y"])])
                .expect("attempt");
            ledger.reject(h.id, "target error persists").expect("reject");
        }
        assert!(ledger.is_exhausted());
        assert_eq!(ledger.select_next(), Ok(None));
        assert_eq!(
            ledger.rejection_reasons(),
            vec!["a: target error persists", "b: target error persists"]
        );
    }

    #[test]
    fn test_rejected_is_permanent() {
        let mut ledger = HypothesisLedger::new();
        ledger.add(["only"]).expect("add");
        ledger.select_next().expect("select");
        ledger.reject(1, "nope").expect("reject");

        assert!(matches!(
            ledger.accept(1),
            Err(LedgerError::InvalidTransition {
                from: HypothesisState::Rejected,
                ..
            })
        ));
        assert_eq!(ledger.reject(9, "x"), Err(LedgerError::UnknownHypothesis(9)));
    }

    #[test]
    fn test_accept_is_terminal() {
        let mut ledger = HypothesisLedger::new();
        ledger.add(["fix"]).expect("add");
        ledger.select_next().expect("select");
        ledger.accept(1).expect("accept");
        assert_eq!(ledger.accepted().map(|h| h.id), Some(1));
        assert!(ledger.active().is_none());
        assert!(ledger.reject(1, "late").is_err());
    }
}
