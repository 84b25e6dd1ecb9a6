//! Normalized compiler/test error signatures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::matching::similarity::collapse_whitespace;

/// Severity level for a signature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

/// One diagnostic as reported by the verifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorSignature {
    pub severity: Severity,

    /// Diagnostic code (e.g. "E0425", "TS2304", "NameError").
    pub code: Option<String>,

    /// Human-readable message.
    pub message: String,

    /// Source file as printed by the tool.
    pub file: Option<String>,

    /// Line number (1-indexed).
    pub line: Option<u32>,

    /// Column number (1-indexed).
    pub column: Option<u32>,
}

impl ErrorSignature {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: None,
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_location(mut self, line: u32, column: Option<u32>) -> Self {
        self.line = Some(line);
        self.column = column;
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Identity of the error independent of where it sits in the file.
    ///
    /// Patches shift lines, so positions are left out.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}",
            self.code.as_deref().unwrap_or(""),
            collapse_whitespace(&self.message)
        )
    }

    /// 0-based line, if known.
    pub fn line_index(&self) -> Option<usize> {
        self.line.map(|l| (l as usize).saturating_sub(1))
    }

    /// Short label such as `E0425 at 12:5: cannot find value`.
    pub fn label(&self) -> String {
        let mut out = String::new();
        if let Some(code) = &self.code {
            out.push_str(code);
            out.push(' ');
        }
        match (self.line, self.column) {
            (Some(l), Some(c)) => out.push_str(&format!("at {l}:{c}: ")),
            (Some(l), None) => out.push_str(&format!("at line {l}: ")),
            _ => {}
        }
        out.push_str(&self.message);
        out
    }
}

/// The single error a cycle targets.
///
/// Blocking signatures only, ordered by line (unknown positions last), then
/// column, then severity descending.
pub fn first_error(signatures: &[ErrorSignature]) -> Option<&ErrorSignature> {
    signatures
        .iter()
        .filter(|s| s.is_blocking())
        .min_by(|a, b| {
            let line = |s: &ErrorSignature| s.line.unwrap_or(u32::MAX);
            let col = |s: &ErrorSignature| s.column.unwrap_or(u32::MAX);
            line(a)
                .cmp(&line(b))
                .then(col(a).cmp(&col(b)))
                .then(b.severity.cmp(&a.severity))
        })
}

/// Verification verdict for one patched document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Target gone, nothing new and blocking.
    Fixed,
    TargetPersists,
    NewError { signature: ErrorSignature },
}

impl Verdict {
    pub fn is_fixed(&self) -> bool {
        matches!(self, Verdict::Fixed)
    }

    /// Rejection reason carried into the next diagnosis.
    pub fn reason(&self) -> String {
        match self {
            Verdict::Fixed => "fixed".to_string(),
            Verdict::TargetPersists => "target error persists".to_string(),
            Verdict::NewError { signature } => {
                format!("introduced new error: {}", signature.label())
            }
        }
    }
}

fn blocking_counts(signatures: &[ErrorSignature]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for sig in signatures.iter().filter(|s| s.is_blocking()) {
        *counts.entry(sig.fingerprint()).or_insert(0) += 1;
    }
    counts
}

/// Compare post-patch signatures against the targeted error and the
/// pre-patch baseline.
///
/// Signatures are compared as multisets of fingerprints. The target is gone
/// once fewer copies of it remain than the baseline had; an error is new when
/// more copies of it appear than the baseline had.
pub fn judge(target: &ErrorSignature, baseline: &[ErrorSignature], after: &[ErrorSignature]) -> Verdict {
    let before = blocking_counts(baseline);

    let target_fp = target.fingerprint();
    let target_before = before.get(&target_fp).copied().unwrap_or(0).max(1);
    let target_after = blocking_counts(after).get(&target_fp).copied().unwrap_or(0);
    if target_after >= target_before {
        return Verdict::TargetPersists;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for sig in after.iter().filter(|s| s.is_blocking()) {
        let fp = sig.fingerprint();
        let count = seen.entry(fp.clone()).or_insert(0);
        *count += 1;
        if *count > before.get(&fp).copied().unwrap_or(0) {
            return Verdict::NewError {
                signature: sig.clone(),
            };
        }
    }
    Verdict::Fixed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(code: &str, msg: &str, line: u32) -> ErrorSignature {
        ErrorSignature::error(msg)
            .with_code(code)
            .with_location(line, Some(1))
    }

    #[test]
    fn test_first_error_by_position() {
        let sigs = vec![
            err("E2", "later", 20),
            ErrorSignature::new(Severity::Warning, "unused").with_location(1, Some(1)),
            err("E1", "earlier", 5),
            ErrorSignature::error("somewhere"),
        ];
        assert_eq!(first_error(&sigs).map(|s| s.message.as_str()), Some("earlier"));
        assert!(first_error(&[]).is_none());
    }

    #[test]
    fn test_fingerprint_ignores_position_and_spacing() {
        let a = err("E0425", "cannot  find value `x`", 3);
        let b = err("E0425", "cannot find value `x`", 9);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_judge_fixed() {
        let target = err("E0425", "cannot find value `x`", 3);
        let other = err("E0308", "mismatched types", 10);
        let verdict = judge(&target, &[target.clone(), other.clone()], &[other]);
        assert_eq!(verdict, Verdict::Fixed);
    }

    #[test]
    fn test_judge_target_persists_after_move() {
        let target = err("E0425", "cannot find value `x`", 3);
        let moved = err("E0425", "cannot find value `x`", 4);
        assert_eq!(judge(&target, &[target.clone()], &[moved]), Verdict::TargetPersists);
    }

    #[test]
    fn test_judge_new_error() {
        let target = err("E0425", "cannot find value `x`", 3);
        let fresh = err("E0599", "no method named `foo`", 3);
        let verdict = judge(&target, &[target.clone()], &[fresh.clone()]);
        assert_eq!(verdict, Verdict::NewError { signature: fresh });
        assert!(verdict.reason().starts_with("introduced new error"));
    }

    #[test]
    fn test_judge_fixed_when_one_of_repeated_errors_is_gone() {
        let target = err("E0425", "cannot find value `x`", 3);
        let elsewhere = err("E0425", "cannot find value `x`", 10);
        let verdict = judge(
            &target,
            &[target.clone(), elsewhere.clone()],
            &[elsewhere.clone()],
        );
        assert_eq!(verdict, Verdict::Fixed);

        let verdict = judge(&target, &[target.clone(), elsewhere.clone()], &[
            err("E0425", "cannot find value `x`", 4),
            elsewhere,
        ]);
        assert_eq!(verdict, Verdict::TargetPersists);
    }

    #[test]
    fn test_judge_extra_copy_of_baseline_error_is_new() {
        let target = err("E0425", "cannot find value `x`", 3);
        let other = err("E0308", "mismatched types", 10);
        let copy = err("E0308", "mismatched types", 12);
        let verdict = judge(&target, &[target.clone(), other.clone()], &[other, copy.clone()]);
        assert_eq!(verdict, Verdict::NewError { signature: copy });
    }

    #[test]
    fn test_warnings_do_not_block() {
        let target = err("E0425", "cannot find value `x`", 3);
        let warning = ErrorSignature::new(Severity::Warning, "unused variable");
        assert!(judge(&target, &[target.clone()], &[warning]).is_fixed());
    }
}
