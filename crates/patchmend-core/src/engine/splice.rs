//! Rewriting a located span with a hunk's replacement.

use std::collections::HashMap;
use std::ops::Range;

use crate::document::{Line, LineEnding, SourceDocument};
use crate::edit::EditHunk;
use crate::matching::similarity::lcs_alignment;

fn leading_whitespace(s: &str) -> &str {
    &s[..s.len() - s.trim_start().len()]
}

fn first_indent<'a, I>(lines: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .find(|l| !l.trim().is_empty())
        .map(leading_whitespace)
}

/// Replace `range` of `document` with the hunk's replacement lines.
///
/// Replacement lines that correspond to anchor lines keep the document's
/// original text when the span is exactly as long as the anchor. Other
/// lines are re-indented to the document's indentation when `reindent` is
/// set and the span's indentation differs from the anchor's.
pub fn splice_hunk(
    document: &SourceDocument,
    range: Range<usize>,
    hunk: &EditHunk,
    reindent: bool,
) -> SourceDocument {
    let end = range.end.min(document.len());
    let start = range.start.min(end);
    let matched = &document.lines()[start..end];
    let dominant = document.dominant_ending();

    // replacement index -> matched line index
    let preserved: HashMap<usize, usize> = if matched.len() == hunk.anchor.len() {
        lcs_alignment(&hunk.anchor, &hunk.replacement)
            .into_iter()
            .map(|(a, r)| (r, a))
            .collect()
    } else {
        HashMap::new()
    };

    let indent_shift = if reindent {
        let anchor_indent = first_indent(hunk.anchor.iter().map(String::as_str));
        let doc_indent = first_indent(matched.iter().map(|l| l.text.as_str()));
        match (anchor_indent, doc_indent) {
            (Some(a), Some(d)) if a != d => Some((a.to_string(), d.to_string())),
            _ => None,
        }
    } else {
        None
    };

    let mut lines: Vec<Line> = hunk
        .replacement
        .iter()
        .enumerate()
        .map(|(j, text)| {
            if let Some(&i) = preserved.get(&j) {
                return matched[i].clone();
            }
            let text = match &indent_shift {
                Some((from, to)) if !text.trim().is_empty() => match text.strip_prefix(from.as_str()) {
                    Some(rest) => format!("{to}{rest}"),
                    None => text.clone(),
                },
                _ => text.clone(),
            };
            Line::new(text, dominant)
        })
        .collect();

    // Only the final line of the document may stay unterminated.
    let count = lines.len();
    for line in lines.iter_mut().take(count.saturating_sub(1)) {
        if line.ending == LineEnding::None {
            line.ending = dominant;
        }
    }

    if let Some(last_replaced) = matched.last() {
        if let Some(last) = lines.last_mut() {
            last.ending = last_replaced.ending;
        }
        return document.splice(start..end, lines);
    }

    // Pure insertion.
    let mut prefix_fix = None;
    if start == document.len() && start > 0 && !lines.is_empty() {
        let prev = &document.lines()[start - 1];
        if prev.ending == LineEnding::None {
            prefix_fix = Some(Line::new(prev.text.clone(), dominant));
            if let Some(last) = lines.last_mut() {
                last.ending = LineEnding::None;
            }
        }
    }

    match prefix_fix {
        Some(prev) => {
            lines.insert(0, prev);
            document.splice(start - 1..start, lines)
        }
        None => document.splice(start..start, lines),
    }
}
