//! Whitespace-insensitive line comparison.

use super::similarity::collapse_whitespace;
use super::{pick_best, reported_confidence, LocateStrategy, MatchCandidate, Scan, StrategyKind, Window};
use crate::document::SourceDocument;

/// Base confidence for a whitespace-tolerant match.
pub const WHITESPACE_BASE_CONFIDENCE: f64 = 0.9;

/// Matches line by line after collapsing whitespace runs and trimming.
///
/// Confidence starts at 0.9 and drops by 0.1 times the fraction of lines
/// that only matched after normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhitespaceTolerant;

impl LocateStrategy for WhitespaceTolerant {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WhitespaceTolerant
    }

    fn scan(
        &self,
        document: &SourceDocument,
        anchor: &[String],
        hint: Option<usize>,
    ) -> Option<Scan> {
        let n = anchor.len();
        if n == 0 || n > document.len() {
            return None;
        }

        let normalized_anchor: Vec<String> = anchor.iter().map(|l| collapse_whitespace(l)).collect();
        let normalized_doc: Vec<String> = document
            .lines()
            .iter()
            .map(|l| collapse_whitespace(&l.text))
            .collect();
        let lines = document.lines();

        let mut windows = Vec::new();
        for start in 0..=lines.len() - n {
            if normalized_doc[start..start + n] != normalized_anchor[..] {
                continue;
            }
            let differing = lines[start..start + n]
                .iter()
                .zip(anchor)
                .filter(|(line, a)| line.text != **a)
                .count();
            let score = WHITESPACE_BASE_CONFIDENCE - 0.1 * (differing as f64 / n as f64);
            windows.push(Window {
                start,
                len: n,
                score,
            });
        }

        let (best, alternatives) = pick_best(&windows, n, hint)?;
        Some(Scan {
            candidate: MatchCandidate {
                start: best.start,
                end: best.start + n,
                confidence: reported_confidence(best.score, WHITESPACE_BASE_CONFIDENCE, alternatives),
                strategy: StrategyKind::WhitespaceTolerant,
                alternatives,
            },
            score: best.score,
        })
    }

    fn accepts(&self, _score: f64) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_trailing_spaces_match_with_reduced_confidence() {
        let doc = SourceDocument::parse("def hello():\n    print('x')\n");
        let found = WhitespaceTolerant
            .locate(&doc, &anchor(&["    print('x')   "]), None)
            .expect("match");
        assert_eq!(found.range(), 1..2);
        assert!((found.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_internal_runs_collapse() {
        let doc = SourceDocument::parse("let  x =   1;\nlet y = 2;\n");
        let found = WhitespaceTolerant
            .locate(&doc, &anchor(&["let x = 1;", "let y = 2;"]), None)
            .expect("match");
        assert_eq!(found.range(), 0..2);
        // One of two lines needed normalization.
        assert!((found.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_verbatim_lines_score_base_confidence() {
        let doc = SourceDocument::parse("a\nb\n");
        let found = WhitespaceTolerant
            .locate(&doc, &anchor(&["a", "b"]), None)
            .expect("match");
        assert!((found.confidence - WHITESPACE_BASE_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn test_no_match_on_different_tokens() {
        let doc = SourceDocument::parse("let x = 1;\n");
        assert!(WhitespaceTolerant
            .locate(&doc, &anchor(&["let x = 2;"]), None)
            .is_none());
    }
}
