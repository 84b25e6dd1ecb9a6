//! Sliding-window edit-distance matching.

use std::ops::RangeInclusive;

use super::similarity::{collapse_whitespace, similarity_at_least, SCORE_EPSILON};
use super::{
    pick_best, reported_confidence, LocateStrategy, MatchCandidate, Scan, StrategyKind, Window,
    FUZZY_CONFIDENCE_CAP,
};
use crate::document::SourceDocument;

/// Compares the anchor against windows of `n - slack ..= n + slack` lines
/// using the normalized Levenshtein ratio over whitespace-collapsed text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproximateText {
    pub threshold: f64,
    pub slack: usize,
}

impl ApproximateText {
    pub fn new(threshold: f64, slack: usize) -> Self {
        Self { threshold, slack }
    }
}

impl Default for ApproximateText {
    fn default() -> Self {
        Self::new(0.8, 2)
    }
}

impl LocateStrategy for ApproximateText {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ApproximateText
    }

    fn scan(
        &self,
        document: &SourceDocument,
        anchor: &[String],
        hint: Option<usize>,
    ) -> Option<Scan> {
        let n = anchor.len();
        if n == 0 || document.is_empty() {
            return None;
        }

        let normalized: Vec<String> = document
            .lines()
            .iter()
            .map(|l| collapse_whitespace(&l.text))
            .collect();
        let anchor_text = anchor
            .iter()
            .map(|l| collapse_whitespace(l))
            .collect::<Vec<_>>()
            .join("\n");

        let lengths = n.saturating_sub(self.slack).max(1)..=n + self.slack;
        let windows = scan_windows(&normalized, &anchor_text, lengths, false);
        let (best, alternatives) = pick_best(&windows, n, hint)?;

        Some(Scan {
            candidate: MatchCandidate {
                start: best.start,
                end: best.start + best.len,
                confidence: reported_confidence(best.score, FUZZY_CONFIDENCE_CAP, alternatives),
                strategy: StrategyKind::ApproximateText,
                alternatives,
            },
            score: best.score,
        })
    }

    fn accepts(&self, score: f64) -> bool {
        score + SCORE_EPSILON >= self.threshold
    }
}

/// Score every window of every length in `lengths` against `anchor_text`.
///
/// With `skip_blank`, blank lines are dropped from the joined text and a
/// window may not start or end on one. The running best score is the
/// pruning floor, so only windows that tie or beat it are returned.
pub(crate) fn scan_windows(
    normalized: &[String],
    anchor_text: &str,
    lengths: RangeInclusive<usize>,
    skip_blank: bool,
) -> Vec<Window> {
    let mut windows = Vec::new();
    let mut floor = 0.0f64;

    for len in lengths {
        if len == 0 || len > normalized.len() {
            continue;
        }
        for start in 0..=normalized.len() - len {
            let slice = &normalized[start..start + len];
            if skip_blank && (slice[0].is_empty() || slice[len - 1].is_empty()) {
                continue;
            }
            let text = slice
                .iter()
                .filter(|l| !skip_blank || !l.is_empty())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("\n");
            if let Some(score) = similarity_at_least(anchor_text, &text, floor) {
                floor = floor.max(score);
                windows.push(Window { start, len, score });
            }
        }
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_small_typo_matches() {
        let doc = SourceDocument::parse(
            "fn main() {\n    let total = compute(a, b);\n    println!(\"{total}\");\n}\n",
        );
        let strategy = ApproximateText::default();
        let found = strategy
            .locate(&doc, &anchor(&["    let total = compute(a, c);"]), None)
            .expect("match");
        assert_eq!(found.range(), 1..2);
        assert!(found.confidence < 1.0);
        assert!(found.confidence >= 0.8);
    }

    #[test]
    fn test_tolerates_inserted_line_inside_window() {
        let doc = SourceDocument::parse(
            "fn run(input: i32) {\n    let alpha = compute_alpha(input);\n    // x\n    let beta = compute_beta(alpha);\n    let gamma = compute_gamma(beta);\n}\n",
        );
        let strategy = ApproximateText::default();
        let found = strategy
            .locate(
                &doc,
                &anchor(&[
                    "    let alpha = compute_alpha(input);",
                    "    let beta = compute_beta(alpha);",
                    "    let gamma = compute_gamma(beta);",
                ]),
                None,
            )
            .expect("match");
        assert_eq!(found.range(), 1..5);
    }

    #[test]
    fn test_below_threshold_is_scanned_but_not_located() {
        let doc = SourceDocument::parse("alpha\nbeta\n");
        let strategy = ApproximateText::default();
        let a = anchor(&["completely unrelated text"]);
        assert!(strategy.locate(&doc, &a, None).is_none());
        let scan = strategy.scan(&doc, &a, None).expect("scan");
        assert!(scan.score < 0.8);
    }

    #[test]
    fn test_tie_breaks_by_hint_then_earliest() {
        let doc = SourceDocument::parse("value = 10\nother\nvalue = 10\n");
        let strategy = ApproximateText::new(0.7, 0);
        let a = anchor(&["value = 11"]);
        let found = strategy.locate(&doc, &a, Some(2)).expect("match");
        assert_eq!(found.start, 2);
        assert_eq!(found.alternatives, 1);

        let found = strategy.locate(&doc, &a, None).expect("match");
        assert_eq!(found.start, 0);
    }

    #[test]
    fn test_scan_keeps_every_window_tying_the_best() {
        let normalized: Vec<String> = ["value = 10", "other", "value = 10", "value = 10"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let windows = scan_windows(&normalized, "value = 11", 1..=1, false);
        let starts: Vec<usize> = windows
            .iter()
            .filter(|w| (w.score - 0.9).abs() < 1e-9)
            .map(|w| w.start)
            .collect();
        assert_eq!(starts, vec![0, 2, 3]);
    }

    #[test]
    fn test_window_exactly_at_threshold_is_accepted() {
        let doc = SourceDocument::parse("header
abcdefghXY
footer
");
        let strategy = ApproximateText::new(0.8, 0);
        let found = strategy
            .locate(&doc, &anchor(&["abcdefghij"]), None)
            .expect("match at threshold");
        assert_eq!(found.range(), 1..2);
    }

    #[test]
    fn test_confidence_is_capped_below_exact() {
        let doc = SourceDocument::parse("x  =  1\n");
        let strategy = ApproximateText::default();
        let found = strategy.locate(&doc, &anchor(&["x = 1"]), None).expect("match");
        assert_eq!(found.confidence, FUZZY_CONFIDENCE_CAP);
    }
}
