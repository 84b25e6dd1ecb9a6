//! Unified diff parsing into [`EditHunk`]s.
//!
//! Model-generated diffs are frequently sloppy: wrong hunk counts, missing
//! leading spaces on context lines, bare `@@` headers without ranges, diffs
//! wrapped in Markdown fences. The parser accepts all of these; the line
//! numbers it extracts only become advisory hints.

use std::sync::OnceLock;

use regex::Regex;

use super::EditHunk;
use crate::error::PatchError;

fn hunk_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("static hunk header regex")
    })
}

/// Whether `raw` contains at least one hunk header.
pub fn looks_like_diff(raw: &str) -> bool {
    raw.lines().any(|l| l.starts_with("@@"))
}

/// Keep only fenced content when the text contains Markdown fences.
fn unfenced_lines(raw: &str) -> Vec<&str> {
    let has_fence = raw.lines().any(|l| l.trim_start().starts_with("```"));
    if !has_fence {
        return raw.lines().collect();
    }

    let mut inside = false;
    let mut out = Vec::new();
    for line in raw.lines() {
        if line.trim_start().starts_with("```") {
            inside = !inside;
            continue;
        }
        if inside {
            out.push(line);
        }
    }
    out
}

#[derive(Default)]
struct HunkBuilder {
    old_start: Option<usize>,
    old_count: Option<usize>,
    anchor: Vec<String>,
    replacement: Vec<String>,
    header_line: usize,
}

impl HunkBuilder {
    fn finish(self) -> Result<EditHunk, PatchError> {
        if self.anchor.len() != self.old_count.unwrap_or(self.anchor.len()) {
            tracing::debug!(
                header_line = self.header_line,
                declared = self.old_count,
                actual = self.anchor.len(),
                "hunk header count disagrees with body"
            );
        }

        let hint = self.old_start.map(|start| start.saturating_sub(1));
        let insertion_point = if self.anchor.is_empty() {
            // `-N,0` inserts after line N; `-0,0` inserts at the top.
            match self.old_start {
                Some(start) => Some(start),
                None => {
                    return Err(PatchError::DiffParse {
                        line: self.header_line,
                        reason: "insertion hunk has no line range in its header".to_string(),
                    })
                }
            }
        } else {
            None
        };

        Ok(EditHunk {
            anchor: self.anchor,
            replacement: self.replacement,
            hint,
            insertion_point,
        })
    }
}

/// Parse unified diff text into hunks, in input order.
pub fn parse_unified_diff(raw: &str) -> Result<Vec<EditHunk>, PatchError> {
    let lines = unfenced_lines(raw);
    let mut hunks = Vec::new();
    let mut current: Option<HunkBuilder> = None;

    let mut i = 0usize;
    while i < lines.len() {
        let line = lines[i].trim_end_matches('\r');
        let line_no = i + 1;

        // File headers: `--- a/x` directly followed by `+++ b/x`.
        if line.starts_with("--- ")
            && lines
                .get(i + 1)
                .is_some_and(|next| next.starts_with("+++ "))
        {
            if let Some(builder) = current.take() {
                hunks.push(builder.finish()?);
            }
            i += 2;
            continue;
        }

        if line.starts_with("@@") {
            if let Some(builder) = current.take() {
                hunks.push(builder.finish()?);
            }
            let mut builder = HunkBuilder {
                header_line: line_no,
                ..Default::default()
            };
            if let Some(caps) = hunk_header_regex().captures(line) {
                let old_start = caps[1].parse::<usize>().map_err(|_| PatchError::DiffParse {
                    line: line_no,
                    reason: "invalid old start line number".to_string(),
                })?;
                builder.old_start = Some(old_start);
                builder.old_count = caps.get(2).and_then(|m| m.as_str().parse().ok()).or(Some(1));
            }
            current = Some(builder);
            i += 1;
            continue;
        }

        let Some(builder) = current.as_mut() else {
            // Preamble before the first hunk (`diff --git`, `index`, prose).
            i += 1;
            continue;
        };

        if let Some(rest) = line.strip_prefix('+') {
            builder.replacement.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix('-') {
            builder.anchor.push(rest.to_string());
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
        } else {
            let context = line.strip_prefix(' ').unwrap_or(line).to_string();
            builder.anchor.push(context.clone());
            builder.replacement.push(context);
        }
        i += 1;
    }

    if let Some(builder) = current.take() {
        hunks.push(builder.finish()?);
    }

    if hunks.is_empty() {
        return Err(PatchError::DiffParse {
            line: 0,
            reason: "no hunk headers found".to_string(),
        });
    }

    // Trailing blank context picked up after the last real diff line.
    for hunk in &mut hunks {
        while hunk.anchor.last().is_some_and(|l| l.is_empty())
            && hunk.replacement.last().is_some_and(|l| l.is_empty())
        {
            hunk.anchor.pop();
            hunk.replacement.pop();
        }
    }

    Ok(hunks)
}
