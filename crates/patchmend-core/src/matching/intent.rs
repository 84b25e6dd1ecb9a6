//! Last-resort block matching for paraphrased "before" snippets.

use super::approximate::scan_windows;
use super::similarity::{collapse_whitespace, SCORE_EPSILON};
use super::{
    pick_best, reported_confidence, LocateStrategy, MatchCandidate, Scan, StrategyKind,
    FUZZY_CONFIDENCE_CAP,
};
use crate::document::SourceDocument;

/// Finds the contiguous block most similar to the snippet.
///
/// Text is lowercased and whitespace-collapsed, blank lines are ignored,
/// and block lengths range from half to twice the snippet length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentBlock {
    pub threshold: f64,
}

impl IntentBlock {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for IntentBlock {
    fn default() -> Self {
        Self::new(0.6)
    }
}

fn normalize(line: &str) -> String {
    collapse_whitespace(line).to_lowercase()
}

impl LocateStrategy for IntentBlock {
    fn kind(&self) -> StrategyKind {
        StrategyKind::IntentBlock
    }

    fn scan(
        &self,
        document: &SourceDocument,
        anchor: &[String],
        hint: Option<usize>,
    ) -> Option<Scan> {
        let snippet: Vec<String> = anchor
            .iter()
            .map(|l| normalize(l))
            .filter(|l| !l.is_empty())
            .collect();
        let n = snippet.len();
        if n == 0 || document.is_empty() {
            return None;
        }

        let normalized: Vec<String> = document.lines().iter().map(|l| normalize(&l.text)).collect();
        let snippet_text = snippet.join("\n");
        let lengths = n.div_ceil(2)..=2 * n;

        let windows = scan_windows(&normalized, &snippet_text, lengths, true);
        let (best, alternatives) = pick_best(&windows, anchor.len(), hint)?;

        Some(Scan {
            candidate: MatchCandidate {
                start: best.start,
                end: best.start + best.len,
                confidence: reported_confidence(best.score, FUZZY_CONFIDENCE_CAP, alternatives),
                strategy: StrategyKind::IntentBlock,
                alternatives,
            },
            score: best.score,
        })
    }

    fn accepts(&self, score: f64) -> bool {
        score + SCORE_EPSILON >= self.threshold
    }
}
