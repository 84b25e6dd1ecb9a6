//! Edit descriptions accepted by the patch engine.
//!
//! Callers provide either a unified diff or a before/after snippet pair.
//! Both are normalized into [`EditHunk`]s before entering the cascade.

pub mod unified;

use serde::{Deserialize, Serialize};

use crate::error::PatchError;

/// A single localized change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditHunk {
    /// "Before" lines used to find the location.
    pub anchor: Vec<String>,

    /// Lines that take the anchor's place.
    pub replacement: Vec<String>,

    /// Advisory 0-based starting line.
    #[serde(default)]
    pub hint: Option<usize>,

    /// Explicit 0-based insertion index; required when `anchor` is empty.
    #[serde(default)]
    pub insertion_point: Option<usize>,
}

impl EditHunk {
    pub fn new<A, R>(anchor: A, replacement: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            anchor: anchor.into_iter().map(Into::into).collect(),
            replacement: replacement.into_iter().map(Into::into).collect(),
            hint: None,
            insertion_point: None,
        }
    }

    /// Pure insertion of `lines` before line `at` (0-based).
    pub fn insertion<R>(at: usize, lines: R) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            anchor: Vec::new(),
            replacement: lines.into_iter().map(Into::into).collect(),
            hint: Some(at),
            insertion_point: Some(at),
        }
    }

    pub fn with_hint(mut self, hint: usize) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn is_insertion(&self) -> bool {
        self.anchor.is_empty()
    }

    /// Reject structurally invalid hunks.
    pub fn validate(&self, index: usize) -> Result<(), PatchError> {
        if self.anchor.iter().chain(&self.replacement).any(|l| l.contains('\n')) {
            return Err(PatchError::malformed(
                index,
                "anchor and replacement lines must not contain line breaks",
            ));
        }
        if self.anchor.is_empty() {
            if self.insertion_point.is_none() {
                return Err(PatchError::malformed(
                    index,
                    "empty anchor without an insertion point",
                ));
            }
            return Ok(());
        }
        if self.anchor.iter().all(|l| l.trim().is_empty()) {
            return Err(PatchError::malformed(
                index,
                "anchor contains only blank lines",
            ));
        }
        Ok(())
    }
}

/// Tagged edit input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditSpec {
    Diff { hunks: Vec<EditHunk> },
    SnippetPair { before: String, after: String },
}

impl EditSpec {
    pub fn diff(hunks: Vec<EditHunk>) -> Self {
        EditSpec::Diff { hunks }
    }

    pub fn snippets(before: impl Into<String>, after: impl Into<String>) -> Self {
        EditSpec::SnippetPair {
            before: before.into(),
            after: after.into(),
        }
    }

    /// Parse raw unified-diff text (fenced or bare).
    pub fn parse_diff(raw: &str) -> Result<Self, PatchError> {
        Ok(EditSpec::Diff {
            hunks: unified::parse_unified_diff(raw)?,
        })
    }

    /// Treat `raw` as a diff when it carries a hunk header.
    pub fn parse_auto(raw: &str) -> Result<Self, PatchError> {
        if unified::looks_like_diff(raw) {
            Self::parse_diff(raw)
        } else {
            Err(PatchError::malformed(
                0,
                "input is not diff-shaped; supply a before/after snippet pair",
            ))
        }
    }

    pub fn is_snippet_pair(&self) -> bool {
        matches!(self, EditSpec::SnippetPair { .. })
    }

    /// Normalize into the common hunk shape.
    pub fn into_hunks(self) -> Vec<EditHunk> {
        match self {
            EditSpec::Diff { hunks } => hunks,
            EditSpec::SnippetPair { before, after } => {
                vec![EditHunk::new(snippet_lines(&before), snippet_lines(&after))]
            }
        }
    }
}

/// Split a snippet into lines, dropping one trailing terminator and
/// surrounding blank lines.
fn snippet_lines(snippet: &str) -> Vec<String> {
    let lines: Vec<&str> = snippet.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last]
            .iter()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect(),
        _ => Vec::new(),
    }
}
