//! Verbatim anchor search.

use super::{pick_best, reported_confidence, LocateStrategy, MatchCandidate, Scan, StrategyKind, Window};
use crate::document::SourceDocument;

/// Finds the anchor lines byte for byte, whitespace included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExactContext;

impl LocateStrategy for ExactContext {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExactContext
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

        let lines = document.lines();
        let windows: Vec<Window> = (0..=lines.len() - n)
            .filter(|&start| {
                lines[start..start + n]
                    .iter()
                    .zip(anchor)
                    .all(|(line, a)| line.text == *a)
            })
            .map(|start| Window {
                start,
                len: n,
                score: 1.0,
            })
            .collect();

        let (best, alternatives) = pick_best(&windows, n, hint)?;
        Some(Scan {
            candidate: MatchCandidate {
                start: best.start,
                end: best.start + n,
                confidence: reported_confidence(1.0, 1.0, alternatives),
                strategy: StrategyKind::ExactContext,
                alternatives,
            },
            score: 1.0,
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
    fn test_exact_unique_match() {
        let doc = SourceDocument::parse("def hello():\n    print('x')\n");
        let found = ExactContext
            .locate(&doc, &anchor(&["    print('x')"]), None)
            .expect("match");
        assert_eq!(found.range(), 1..2);
        assert_eq!(found.confidence, 1.0);
        assert!(!found.is_ambiguous());
    }

    #[test]
    fn test_exact_is_whitespace_sensitive() {
        let doc = SourceDocument::parse("def hello():\n    print('x')\n");
        assert!(ExactContext
            .locate(&doc, &anchor(&["  print('x')"]), None)
            .is_none());
    }

    #[test]
    fn test_exact_ambiguous_prefers_hint() {
        let doc = SourceDocument::parse("x = 1\ny = 2\nx = 1\ny = 2\n");
        let found = ExactContext
            .locate(&doc, &anchor(&["x = 1", "y = 2"]), Some(2))
            .expect("match");
        assert_eq!(found.start, 2);
        assert_eq!(found.alternatives, 1);
        assert!(found.confidence < 1.0);

        let found = ExactContext
            .locate(&doc, &anchor(&["x = 1", "y = 2"]), None)
            .expect("match");
        assert_eq!(found.start, 0);
    }

    #[test]
    fn test_exact_anchor_longer_than_document() {
        let doc = SourceDocument::parse("a\n");
        assert!(ExactContext.locate(&doc, &anchor(&["a", "b"]), None).is_none());
        assert!(ExactContext.locate(&doc, &[], None).is_none());
    }
}
