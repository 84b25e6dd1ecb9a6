//! Anchor location strategies.
//!
//! Each strategy looks for a hunk's anchor inside a [`SourceDocument`] and
//! reports a [`MatchCandidate`]. The set is closed: the cascade picks
//! strategies by [`StrategyKind`] from an explicit ordered list, and
//! [`Matcher`] dispatches to the concrete implementation.

pub mod approximate;
pub mod exact;
pub mod intent;
pub mod similarity;
pub mod whitespace;

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::document::SourceDocument;
use crate::engine::ApplyOptions;
use self::similarity::SCORE_EPSILON;

pub use approximate::ApproximateText;
pub use exact::ExactContext;
pub use intent::IntentBlock;
pub use whitespace::WhitespaceTolerant;

/// Multiplier applied to the confidence of a match that had equally good
/// competitors elsewhere in the document.
pub const AMBIGUITY_PENALTY: f64 = 0.95;

/// Upper bound for any confidence that is not a byte-exact match.
pub const FUZZY_CONFIDENCE_CAP: f64 = 0.99;

/// Identifier of a matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ExactContext,
    WhitespaceTolerant,
    ApproximateText,
    IntentBlock,
    /// Placed at an explicit insertion point; nothing was located.
    InsertionPoint,
}

impl StrategyKind {
    /// Default cascade order, most precise first.
    pub const CASCADE: [StrategyKind; 4] = [
        StrategyKind::ExactContext,
        StrategyKind::WhitespaceTolerant,
        StrategyKind::ApproximateText,
        StrategyKind::IntentBlock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::ExactContext => "exact_context",
            StrategyKind::WhitespaceTolerant => "whitespace_tolerant",
            StrategyKind::ApproximateText => "approximate_text",
            StrategyKind::IntentBlock => "intent_block",
            StrategyKind::InsertionPoint => "insertion_point",
        }
    }

    /// Whether this kind can appear in a cascade.
    pub fn locates(&self) -> bool {
        *self != StrategyKind::InsertionPoint
    }

    /// Whether a match by this kind may differ from the anchor text.
    pub fn is_fuzzy(&self) -> bool {
        matches!(
            self,
            StrategyKind::WhitespaceTolerant
                | StrategyKind::ApproximateText
                | StrategyKind::IntentBlock
        )
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A located span of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// First matched line (0-based, inclusive).
    pub start: usize,
    /// One past the last matched line.
    pub end: usize,
    /// Confidence in `[0, 1]`; `1.0` only for unique byte-exact matches.
    pub confidence: f64,
    pub strategy: StrategyKind,
    /// Other non-overlapping spans that scored exactly as well.
    #[serde(default)]
    pub alternatives: usize,
}

impl MatchCandidate {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn is_ambiguous(&self) -> bool {
        self.alternatives > 0
    }
}

/// Result of a scan: the best span found and its raw score.
///
/// `score` is what the acceptance threshold is checked against; the
/// candidate's `confidence` is the reported value after capping and the
/// ambiguity penalty.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub candidate: MatchCandidate,
    pub score: f64,
}

/// One way of locating an anchor.
pub trait LocateStrategy {
    fn kind(&self) -> StrategyKind;

    /// Best span for `anchor`, whether or not it would be accepted.
    fn scan(&self, document: &SourceDocument, anchor: &[String], hint: Option<usize>)
        -> Option<Scan>;

    /// Whether a raw score clears this strategy's acceptance rule.
    fn accepts(&self, score: f64) -> bool;

    fn locate(
        &self,
        document: &SourceDocument,
        anchor: &[String],
        hint: Option<usize>,
    ) -> Option<MatchCandidate> {
        self.scan(document, anchor, hint)
            .filter(|scan| self.accepts(scan.score))
            .map(|scan| scan.candidate)
    }
}

/// The closed set of strategies, configured from [`ApplyOptions`].
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Exact(ExactContext),
    Whitespace(WhitespaceTolerant),
    Approximate(ApproximateText),
    Intent(IntentBlock),
}

impl Matcher {
    /// `None` for kinds that do not locate anything.
    pub fn for_kind(kind: StrategyKind, options: &ApplyOptions) -> Option<Self> {
        let matcher = match kind {
            StrategyKind::ExactContext => Matcher::Exact(ExactContext),
            StrategyKind::WhitespaceTolerant => Matcher::Whitespace(WhitespaceTolerant),
            StrategyKind::ApproximateText => Matcher::Approximate(ApproximateText::new(
                options.similarity_threshold,
                options.window_slack,
            )),
            StrategyKind::IntentBlock => Matcher::Intent(IntentBlock::new(options.intent_threshold)),
            StrategyKind::InsertionPoint => return None,
        };
        Some(matcher)
    }

    fn inner(&self) -> &dyn LocateStrategy {
        match self {
            Matcher::Exact(s) => s,
            Matcher::Whitespace(s) => s,
            Matcher::Approximate(s) => s,
            Matcher::Intent(s) => s,
        }
    }
}

impl LocateStrategy for Matcher {
    fn kind(&self) -> StrategyKind {
        self.inner().kind()
    }

    fn scan(
        &self,
        document: &SourceDocument,
        anchor: &[String],
        hint: Option<usize>,
    ) -> Option<Scan> {
        self.inner().scan(document, anchor, hint)
    }

    fn accepts(&self, score: f64) -> bool {
        self.inner().accepts(score)
    }
}

/// A scored window considered by a strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Window {
    pub start: usize,
    pub len: usize,
    pub score: f64,
}

/// Pick the best window and count equally scored, non-overlapping rivals.
///
/// Order: higher score, then smaller distance from `hint`, then smaller
/// length difference from `anchor_len`, then earliest start.
pub(crate) fn pick_best(
    windows: &[Window],
    anchor_len: usize,
    hint: Option<usize>,
) -> Option<(Window, usize)> {
    let top = windows.iter().map(|w| w.score).fold(f64::NEG_INFINITY, f64::max);
    if !top.is_finite() {
        return None;
    }

    let hint_distance = |w: &Window| hint.map_or(0, |h| w.start.abs_diff(h));
    let best = windows
        .iter()
        .filter(|w| (w.score - top).abs() <= SCORE_EPSILON)
        .min_by(|a, b| {
            hint_distance(a)
                .cmp(&hint_distance(b))
                .then(a.len.abs_diff(anchor_len).cmp(&b.len.abs_diff(anchor_len)))
                .then(a.start.cmp(&b.start))
        })
        .copied()?;

    let best_end = best.start + best.len;
    let rivals = windows
        .iter()
        .filter(|w| (w.score - top).abs() <= SCORE_EPSILON)
        .filter(|w| w.start + w.len <= best.start || w.start >= best_end)
        .count();

    Some((best, rivals))
}

/// Final reported confidence for a window.
pub(crate) fn reported_confidence(raw: f64, cap: f64, alternatives: usize) -> f64 {
    let capped = raw.min(cap).clamp(0.0, 1.0);
    if alternatives > 0 {
        capped * AMBIGUITY_PENALTY
    } else {
        capped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(start: usize, len: usize, score: f64) -> Window {
        Window { start, len, score }
    }

    #[test]
    fn test_pick_best_prefers_score() {
        let windows = [w(0, 2, 0.7), w(5, 2, 0.9)];
        let (best, rivals) = pick_best(&windows, 2, None).expect("best");
        assert_eq!(best.start, 5);
        assert_eq!(rivals, 0);
    }

    #[test]
    fn test_pick_best_breaks_ties_by_hint_then_earliest() {
        let windows = [w(2, 2, 0.9), w(10, 2, 0.9), w(20, 2, 0.9)];
        let (best, rivals) = pick_best(&windows, 2, Some(11)).expect("best");
        assert_eq!(best.start, 10);
        assert_eq!(rivals, 2);

        let (best, _) = pick_best(&windows, 2, None).expect("best");
        assert_eq!(best.start, 2);
    }

    #[test]
    fn test_pick_best_prefers_anchor_length() {
        let windows = [w(3, 4, 0.8), w(3, 3, 0.8)];
        let (best, rivals) = pick_best(&windows, 3, None).expect("best");
        assert_eq!(best.len, 3);
        // Overlapping equal windows are not rivals.
        assert_eq!(rivals, 0);
    }

    #[test]
    fn test_pick_best_empty() {
        assert!(pick_best(&[], 1, None).is_none());
    }

    #[test]
    fn test_reported_confidence() {
        assert_eq!(reported_confidence(1.0, 1.0, 0), 1.0);
        assert_eq!(reported_confidence(1.0, FUZZY_CONFIDENCE_CAP, 0), 0.99);
        assert!((reported_confidence(1.0, 1.0, 1) - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_matcher_dispatch_kinds() {
        let options = ApplyOptions::default();
        for kind in StrategyKind::CASCADE {
            let matcher = Matcher::for_kind(kind, &options).expect("cascade kind");
            assert_eq!(matcher.kind(), kind);
            assert!(kind.locates());
        }
        assert!(Matcher::for_kind(StrategyKind::InsertionPoint, &options).is_none());
        assert!(!StrategyKind::InsertionPoint.is_fuzzy());
    }

    #[test]
    fn test_strategy_kind_serde() {
        let json = serde_json::to_string(&StrategyKind::WhitespaceTolerant).expect("serialize");
        assert_eq!(json, "\"whitespace_tolerant\"");
        assert_eq!(StrategyKind::IntentBlock.to_string(), "intent_block");
    }
}
