//! Apply results and per-hunk diagnostics.

use serde::{Deserialize, Serialize};

use crate::document::SourceDocument;
use crate::matching::{MatchCandidate, StrategyKind};

/// Best score one strategy reached for a hunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    /// `None` when the strategy found no span at all.
    pub best_confidence: Option<f64>,
}

/// Why a hunk was not applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HunkFailure {
    /// No strategy met its acceptance threshold.
    NoMatch {
        best_strategy: Option<StrategyKind>,
        best_confidence: Option<f64>,
    },
}

/// Diagnostics for one hunk of an apply call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HunkReport {
    pub index: usize,
    pub matched: bool,
    pub candidate: Option<MatchCandidate>,
    pub strategy: Option<StrategyKind>,
    pub confidence: Option<f64>,
    /// Resolved by tie-breaking among equally good spans.
    pub ambiguous: bool,
    pub attempts: Vec<StrategyAttempt>,
    pub failure: Option<HunkFailure>,
}

impl HunkReport {
    pub(crate) fn matched(index: usize, candidate: MatchCandidate, attempts: Vec<StrategyAttempt>) -> Self {
        Self {
            index,
            matched: true,
            strategy: Some(candidate.strategy),
            confidence: Some(candidate.confidence),
            ambiguous: candidate.is_ambiguous(),
            candidate: Some(candidate),
            attempts,
            failure: None,
        }
    }

    pub(crate) fn failed(index: usize, attempts: Vec<StrategyAttempt>) -> Self {
        let best = attempts
            .iter()
            .filter_map(|a| a.best_confidence.map(|c| (a.strategy, c)))
            .fold(None, |acc: Option<(StrategyKind, f64)>, (s, c)| match acc {
                Some((_, best)) if best >= c => acc,
                _ => Some((s, c)),
            });
        Self {
            index,
            matched: false,
            candidate: None,
            strategy: None,
            confidence: None,
            ambiguous: false,
            failure: Some(HunkFailure::NoMatch {
                best_strategy: best.map(|(s, _)| s),
                best_confidence: best.map(|(_, c)| c),
            }),
            attempts,
        }
    }

    /// One-line human-readable summary.
    pub fn describe(&self) -> String {
        match (&self.candidate, &self.failure) {
            (Some(c), _) => format!(
                "hunk {}: {} at lines {}..{} (confidence {:.2}{})",
                self.index,
                c.strategy,
                c.start + 1,
                c.end,
                c.confidence,
                if self.ambiguous { ", ambiguous" } else { "" }
            ),
            (
                None,
                Some(HunkFailure::NoMatch {
                    best_strategy,
                    best_confidence,
                }),
            ) => match (best_strategy, best_confidence) {
                (Some(s), Some(conf)) => format!(
                    "hunk {}: no match (best {} at {:.2})",
                    self.index, s, conf
                ),
                _ => format!("hunk {}: no match", self.index),
            },
            (None, None) => format!("hunk {}: not applied", self.index),
        }
    }
}

/// Result of applying a list of hunks to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub hunks: Vec<HunkReport>,
    /// Patched document on success, the untouched input otherwise.
    pub document: SourceDocument,
    pub success: bool,
}

impl ApplyOutcome {
    pub fn failed_hunks(&self) -> Vec<&HunkReport> {
        self.hunks.iter().filter(|h| !h.matched).collect()
    }

    pub fn first_failure(&self) -> Option<&HunkReport> {
        self.hunks.iter().find(|h| !h.matched)
    }
}

/// Text-level apply result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOutcome {
    pub patched_text: String,
    pub success: bool,
    pub diagnostics: Vec<HunkReport>,
}

impl From<ApplyOutcome> for TextOutcome {
    fn from(outcome: ApplyOutcome) -> Self {
        Self {
            patched_text: outcome.document.to_text(),
            success: outcome.success,
            diagnostics: outcome.hunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_report_picks_best_attempt() {
        let attempts = vec![
            StrategyAttempt {
                strategy: StrategyKind::ExactContext,
                best_confidence: None,
            },
            StrategyAttempt {
                strategy: StrategyKind::ApproximateText,
                best_confidence: Some(0.42),
            },
            StrategyAttempt {
                strategy: StrategyKind::IntentBlock,
                best_confidence: Some(0.31),
            },
        ];
        let report = HunkReport::failed(1, attempts);
        assert!(!report.matched);
        assert_eq!(
            report.failure,
            Some(HunkFailure::NoMatch {
                best_strategy: Some(StrategyKind::ApproximateText),
                best_confidence: Some(0.42),
            })
        );
        assert!(report.describe().contains("approximate_text at 0.42"));
    }

    #[test]
    fn test_failure_serializes_tagged() {
        let failure = HunkFailure::NoMatch {
            best_strategy: None,
            best_confidence: None,
        };
        let json = serde_json::to_value(&failure).expect("serialize");
        assert_eq!(json["kind"], "no_match");
    }
}
