//! Strategy cascade and patch application.
//!
//! For each hunk, strategies run in the configured order until one accepts
//! a span. Hunks are applied one after another to an evolving document, so
//! later hunks see the effect of earlier ones. If any hunk fails, the
//! outcome carries the original document untouched along with per-hunk
//! diagnostics for every hunk.

pub mod outcome;
pub mod splice;

use serde::{Deserialize, Serialize};

use crate::document::SourceDocument;
use crate::edit::{EditHunk, EditSpec};
use crate::error::PatchError;
use crate::matching::{
    LocateStrategy, MatchCandidate, Matcher, StrategyKind, FUZZY_CONFIDENCE_CAP,
};
use crate::obs;

pub use outcome::{ApplyOutcome, HunkFailure, HunkReport, StrategyAttempt, TextOutcome};

/// Tunables for one apply call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyOptions {
    /// Acceptance threshold for approximate text matching.
    pub similarity_threshold: f64,
    /// Acceptance threshold for intent block matching.
    pub intent_threshold: f64,
    pub strategy_order: Vec<StrategyKind>,
    /// Reject edits with more hunks than this.
    pub max_hunks: Option<usize>,
    /// Extra/missing lines tolerated by approximate windows.
    pub window_slack: usize,
    /// Re-indent new lines to the located span's indentation.
    pub reindent: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            intent_threshold: 0.6,
            strategy_order: StrategyKind::CASCADE.to_vec(),
            max_hunks: None,
            window_slack: 2,
            reindent: true,
        }
    }
}

impl ApplyOptions {
    pub fn validate(&self) -> Result<(), PatchError> {
        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("intent_threshold", self.intent_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PatchError::InvalidOptions(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }

        if self.strategy_order.is_empty() {
            return Err(PatchError::InvalidOptions(
                "strategy_order must not be empty".to_string(),
            ));
        }
        for (i, kind) in self.strategy_order.iter().enumerate() {
            if !kind.locates() {
                return Err(PatchError::InvalidOptions(format!(
                    "{kind} cannot be part of strategy_order"
                )));
            }
            if self.strategy_order[..i].contains(kind) {
                return Err(PatchError::InvalidOptions(format!(
                    "strategy_order lists {kind} twice"
                )));
            }
        }

        if self.max_hunks == Some(0) {
            return Err(PatchError::InvalidOptions(
                "max_hunks must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// A validated, reusable cascade.
#[derive(Debug, Clone)]
pub struct PatchEngine {
    options: ApplyOptions,
    matchers: Vec<Matcher>,
}

impl PatchEngine {
    pub fn new(options: ApplyOptions) -> Result<Self, PatchError> {
        options.validate()?;
        let matchers = options
            .strategy_order
            .iter()
            .filter_map(|kind| Matcher::for_kind(*kind, &options))
            .collect();
        Ok(Self { options, matchers })
    }

    pub fn options(&self) -> &ApplyOptions {
        &self.options
    }

    /// Run the cascade for one hunk without modifying anything.
    pub fn locate(
        &self,
        document: &SourceDocument,
        hunk: &EditHunk,
        hint: Option<usize>,
    ) -> (Option<MatchCandidate>, Vec<StrategyAttempt>) {
        let mut attempts = Vec::with_capacity(self.matchers.len());
        for matcher in &self.matchers {
            let scan = matcher.scan(document, &hunk.anchor, hint);
            attempts.push(StrategyAttempt {
                strategy: matcher.kind(),
                best_confidence: scan.as_ref().map(|s| s.candidate.confidence),
            });
            if let Some(scan) = scan.filter(|s| matcher.accepts(s.score)) {
                return (Some(scan.candidate), attempts);
            }
        }
        (None, attempts)
    }

    /// Apply `hunks` in order. `Err` only for structurally invalid input.
    pub fn apply(
        &self,
        document: &SourceDocument,
        hunks: &[EditHunk],
    ) -> Result<ApplyOutcome, PatchError> {
        if let Some(max) = self.options.max_hunks {
            if hunks.len() > max {
                return Err(PatchError::malformed(
                    max,
                    format!("edit has {} hunks, limit is {max}", hunks.len()),
                ));
            }
        }
        for (index, hunk) in hunks.iter().enumerate() {
            hunk.validate(index)?;
        }

        let mut current = document.clone();
        let mut reports = Vec::with_capacity(hunks.len());
        // (start of the applied span, net line delta) for each applied hunk
        let mut applied: Vec<(usize, isize)> = Vec::new();

        for (index, hunk) in hunks.iter().enumerate() {
            let hint = hunk.hint.map(|h| shift_hint(h, &applied));

            let located = match hunk.insertion_point {
                Some(point) if hunk.is_insertion() => {
                    let at = shift_hint(point, &applied).min(current.len());
                    let candidate = MatchCandidate {
                        start: at,
                        end: at,
                        confidence: FUZZY_CONFIDENCE_CAP,
                        strategy: StrategyKind::InsertionPoint,
                        alternatives: 0,
                    };
                    let attempts = vec![StrategyAttempt {
                        strategy: StrategyKind::InsertionPoint,
                        best_confidence: Some(FUZZY_CONFIDENCE_CAP),
                    }];
                    (Some(candidate), attempts)
                }
                _ => self.locate(&current, hunk, hint),
            };

            match located {
                (Some(candidate), attempts) => {
                    obs::emit_hunk_matched(
                        index,
                        candidate.strategy,
                        candidate.confidence,
                        candidate.start,
                        candidate.end,
                        candidate.is_ambiguous(),
                    );
                    let before = current.len();
                    current = splice::splice_hunk(
                        &current,
                        candidate.range(),
                        hunk,
                        self.options.reindent,
                    );
                    let delta = current.len() as isize - before as isize;
                    applied.push((candidate.start, delta));
                    reports.push(HunkReport::matched(index, candidate, attempts));
                }
                (None, attempts) => {
                    let report = HunkReport::failed(index, attempts);
                    let best = match &report.failure {
                        Some(HunkFailure::NoMatch {
                            best_confidence, ..
                        }) => *best_confidence,
                        None => None,
                    };
                    obs::emit_hunk_failed(index, best);
                    reports.push(report);
                }
            }
        }

        let matched = reports.iter().filter(|r| r.matched).count();
        let success = matched == reports.len();
        obs::emit_apply_finished(reports.len(), matched, success);

        Ok(ApplyOutcome {
            hunks: reports,
            document: if success { current } else { document.clone() },
            success,
        })
    }

    pub fn apply_spec(
        &self,
        document: &SourceDocument,
        spec: &EditSpec,
    ) -> Result<ApplyOutcome, PatchError> {
        let hunks = spec.clone().into_hunks();
        self.apply(document, &hunks)
    }
}

/// Move a hint from pre-edit coordinates past earlier applied hunks.
fn shift_hint(hint: usize, applied: &[(usize, isize)]) -> usize {
    let mut shifted = hint as isize;
    for &(start, delta) in applied {
        if (start as isize) <= shifted {
            shifted += delta;
        }
    }
    shifted.max(0) as usize
}

/// Apply `hunks` to `document` with `options`.
pub fn apply(
    document: &SourceDocument,
    hunks: &[EditHunk],
    options: &ApplyOptions,
) -> Result<ApplyOutcome, PatchError> {
    PatchEngine::new(options.clone())?.apply(document, hunks)
}

/// Text in, text out.
pub fn apply_text(
    text: &str,
    spec: &EditSpec,
    options: &ApplyOptions,
) -> Result<TextOutcome, PatchError> {
    let document = SourceDocument::parse(text);
    let outcome = PatchEngine::new(options.clone())?.apply_spec(&document, spec)?;
    Ok(outcome.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(ApplyOptions::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let options = ApplyOptions {
            similarity_threshold: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            PatchEngine::new(options),
            Err(PatchError::InvalidOptions(_))
        ));

        let options = ApplyOptions {
            intent_threshold: 1.5,
            ..Default::default()
        };
        assert!(PatchEngine::new(options).is_err());
    }

    #[test]
    fn test_strategy_order_validation() {
        let empty = ApplyOptions {
            strategy_order: vec![],
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let dup = ApplyOptions {
            strategy_order: vec![StrategyKind::ExactContext, StrategyKind::ExactContext],
            ..Default::default()
        };
        assert!(dup.validate().is_err());

        let zero = ApplyOptions {
            max_hunks: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_max_hunks_cap() {
        let engine = PatchEngine::new(ApplyOptions {
            max_hunks: Some(1),
            ..Default::default()
        })
        .expect("engine");
        let doc = SourceDocument::parse("a\nb\n");
        let hunks = vec![EditHunk::new(["a"], ["A"]), EditHunk::new(["b"], ["B"])];
        assert!(matches!(
            engine.apply(&doc, &hunks),
            Err(PatchError::MalformedEdit { hunk: 1, .. })
        ));
    }

    #[test]
    fn test_shift_hint() {
        assert_eq!(shift_hint(10, &[]), 10);
        assert_eq!(shift_hint(10, &[(2, 3)]), 13);
        assert_eq!(shift_hint(10, &[(20, 3)]), 10);
        assert_eq!(shift_hint(1, &[(0, -5)]), 0);
    }

    #[test]
    fn test_restricted_order_skips_fuzzy() {
        let engine = PatchEngine::new(ApplyOptions {
            strategy_order: vec![StrategyKind::ExactContext],
            ..Default::default()
        })
        .expect("engine");
        let doc = SourceDocument::parse("let x = 1;\n");
        let outcome = engine
            .apply(&doc, &[EditHunk::new(["let x  = 1;"], ["let x = 2;"])])
            .expect("apply");
        assert!(!outcome.success);
        assert_eq!(outcome.hunks[0].attempts.len(), 1);
    }

    #[test]
    fn test_insertion_uses_shifted_point() {
        let doc = SourceDocument::parse("a\nb\nc\n");
        let hunks = vec![
            EditHunk::new(["a"], ["a1", "a2"]).with_hint(0),
            EditHunk::insertion(2, ["inserted"]),
        ];
        let outcome = apply(&doc, &hunks, &ApplyOptions::default()).expect("apply");
        assert!(outcome.success);
        assert_eq!(outcome.document.to_text(), "a1\na2\nb\ninserted\nc\n");
    }

    #[test]
    fn test_apply_text_snippet_pair() {
        let spec = EditSpec::snippets("    print('x')", "    print('y')");
        let out = apply_text("def hello():\n    print('x')\n", &spec, &ApplyOptions::default())
            .expect("apply");
        assert!(out.success);
        assert_eq!(out.patched_text, "def hello():\n    print('y')\n");
        assert_eq!(out.diagnostics.len(), 1);
    }
}
