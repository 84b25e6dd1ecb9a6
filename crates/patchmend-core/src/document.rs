//! Tokenized line view over a source document.
//!
//! A [`SourceDocument`] is an immutable, indexable sequence of lines that
//! remembers each line's original terminator, so [`SourceDocument::to_text`]
//! reproduces the input byte for byte. Edits never mutate a document; they
//! produce a new one via [`SourceDocument::splice`].

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Line terminator recorded for a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    Lf,
    CrLf,
    Cr,
    /// Only valid on the final line of a document.
    None,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
            LineEnding::None => "",
        }
    }
}

/// One line of a document: its text (without terminator) and terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Line {
    pub text: String,
    pub ending: LineEnding,
}

impl Line {
    pub fn new(text: impl Into<String>, ending: LineEnding) -> Self {
        Self {
            text: text.into(),
            ending,
        }
    }
}

/// An immutable sequence of lines with byte-exact reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceDocument {
    lines: Vec<Line>,
}

impl SourceDocument {
    /// Split `text` into lines, recording each line's terminator.
    ///
    /// `"\r\n"` is one terminator; a lone `"\r"` or `"\n"` is another. The
    /// empty string yields an empty document.
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        let bytes = text.as_bytes();
        let mut start = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    lines.push(Line::new(&text[start..i], LineEnding::Lf));
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        lines.push(Line::new(&text[start..i], LineEnding::CrLf));
                        i += 2;
                    } else {
                        lines.push(Line::new(&text[start..i], LineEnding::Cr));
                        i += 1;
                    }
                    start = i;
                }
                _ => i += 1,
            }
        }

        if start < bytes.len() {
            lines.push(Line::new(&text[start..], LineEnding::None));
        }

        Self { lines }
    }

    pub fn from_lines(lines: Vec<Line>) -> Self {
        Self { lines }
    }

    /// Reconstruct the full text.
    pub fn to_text(&self) -> String {
        let capacity = self
            .lines
            .iter()
            .map(|l| l.text.len() + l.ending.as_str().len())
            .sum();
        let mut out = String::with_capacity(capacity);
        for line in &self.lines {
            out.push_str(&line.text);
            out.push_str(line.ending.as_str());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Line texts without terminators.
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }

    /// Most common terminator; ties and terminator-free documents give `Lf`.
    pub fn dominant_ending(&self) -> LineEnding {
        let (mut lf, mut crlf, mut cr) = (0usize, 0usize, 0usize);
        for line in &self.lines {
            match line.ending {
                LineEnding::Lf => lf += 1,
                LineEnding::CrLf => crlf += 1,
                LineEnding::Cr => cr += 1,
                LineEnding::None => {}
            }
        }
        if crlf > lf && crlf >= cr {
            LineEnding::CrLf
        } else if cr > lf && cr > crlf {
            LineEnding::Cr
        } else {
            LineEnding::Lf
        }
    }

    /// Return a new document with `range` replaced by `replacement`.
    ///
    /// `range` is clamped to the document bounds.
    pub fn splice(&self, range: Range<usize>, replacement: Vec<Line>) -> SourceDocument {
        let end = range.end.min(self.lines.len());
        let start = range.start.min(end);
        let mut lines = Vec::with_capacity(self.lines.len() - (end - start) + replacement.len());
        lines.extend_from_slice(&self.lines[..start]);
        lines.extend(replacement);
        lines.extend_from_slice(&self.lines[end..]);
        SourceDocument { lines }
    }

    /// Render lines around `center` (0-based) with 1-based numbers.
    ///
    /// The center line is marked with `>`.
    pub fn numbered_window(&self, center: usize, radius: usize) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let center = center.min(self.lines.len() - 1);
        let start = center.saturating_sub(radius);
        let end = (center + radius + 1).min(self.lines.len());
        let width = end.to_string().len();

        let mut out = String::new();
        for (idx, line) in self.lines[start..end].iter().enumerate() {
            let number = start + idx;
            let marker = if number == center { '>' } else { ' ' };
            out.push_str(&format!(
                "{marker}{:>width$} | {}\n",
                number + 1,
                line.text,
                width = width
            ));
        }
        out
    }
}

impl fmt::Display for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for SourceDocument {
    fn from(text: &str) -> Self {
        SourceDocument::parse(text)
    }
}

impl Serialize for SourceDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for SourceDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(SourceDocument::parse(&text))
    }
}
