//! Compiler and interpreter output parsing.
//!
//! Normalizes raw command output into [`ErrorSignature`]s. Recognized shapes:
//!
//! ```text
//! error[E0425]: cannot find value `totl` in this scope      (rustc)
//!   --> src/main.rs:3:20
//! main.c:3:5: error: 'x' undeclared                         (gcc, clang, cargo --message-format short)
//! src/app.ts(3,5): error TS2304: Cannot find name 'foo'.     (tsc)
//!   File "main.py", line 3, in <module>                     (Python traceback)
//! NameError: name 'totl' is not defined
//! ```

use std::sync::OnceLock;

use patchmend_core::{ErrorSignature, Severity};
use regex::Regex;

fn rustc_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(error|warning)(?:\[([A-Za-z0-9_]+)\])?: (.+)$").expect("static rustc regex")
    })
}

fn rustc_location() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*--> (.+):(\d+):(\d+)$").expect("static location regex"))
}

fn located() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(\S.*?):(\d+):(?:(\d+):)? (fatal error|error|warning|note)(?:\[([A-Za-z0-9_]+)\])?: (.+)$",
        )
        .expect("static located regex")
    })
}

fn tsc() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\S.*?)\((\d+),(\d+)\): (error|warning) (TS\d+): (.+)$")
            .expect("static tsc regex")
    })
}

fn python_frame() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*File "(.+)", line (\d+)"#).expect("static frame regex"))
}

fn python_exception() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][\w.]*(?:Error|Exception|Exit|Interrupt))(?::\s*(.*))?$")
            .expect("static exception regex")
    })
}

fn severity_of(label: &str) -> Severity {
    match label {
        "error" | "fatal error" => Severity::Error,
        "warning" => Severity::Warning,
        _ => Severity::Note,
    }
}

/// Cargo and rustc footer lines that repeat what was already reported.
fn is_summary(message: &str) -> bool {
    message.starts_with("aborting due to")
        || message.starts_with("could not compile")
        || (message.contains("generated") && message.contains("warning"))
}

fn number(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

fn parse_stream(text: &str, out: &mut Vec<ErrorSignature>) {
    // rustc header waiting for its `-->` line
    let mut pending: Option<ErrorSignature> = None;
    // innermost traceback frame seen so far
    let mut frame: Option<(String, u32)> = None;

    for raw in text.lines() {
        let line = raw.trim_end();

        if let Some(caps) = rustc_location().captures(line) {
            if let Some(sig) = pending.take() {
                out.push(
                    sig.with_file(&caps[1])
                        .with_location(number(&caps[2]), Some(number(&caps[3]))),
                );
            }
            continue;
        }

        if let Some(caps) = located().captures(line) {
            out.extend(pending.take());
            let mut sig = ErrorSignature::new(severity_of(&caps[4]), &caps[6])
                .with_file(&caps[1])
                .with_location(number(&caps[2]), caps.get(3).map(|c| number(c.as_str())));
            if let Some(code) = caps.get(5) {
                sig = sig.with_code(code.as_str());
            }
            out.push(sig);
            continue;
        }

        if let Some(caps) = tsc().captures(line) {
            out.extend(pending.take());
            out.push(
                ErrorSignature::new(severity_of(&caps[4]), &caps[6])
                    .with_code(&caps[5])
                    .with_file(&caps[1])
                    .with_location(number(&caps[2]), Some(number(&caps[3]))),
            );
            continue;
        }

        if let Some(caps) = rustc_header().captures(line) {
            out.extend(pending.take());
            let message = &caps[3];
            if is_summary(message) {
                continue;
            }
            let mut sig = ErrorSignature::new(severity_of(&caps[1]), message);
            if let Some(code) = caps.get(2) {
                sig = sig.with_code(code.as_str());
            }
            pending = Some(sig);
            continue;
        }

        if let Some(caps) = python_frame().captures(line) {
            frame = Some((caps[1].to_string(), number(&caps[2])));
            continue;
        }

        if let Some(caps) = python_exception().captures(line) {
            if let Some((file, line_no)) = frame.take() {
                let name = &caps[1];
                let message = caps
                    .get(2)
                    .map(|m| m.as_str())
                    .filter(|m| !m.is_empty())
                    .unwrap_or(name);
                out.push(
                    ErrorSignature::error(message)
                        .with_code(name)
                        .with_file(file)
                        .with_location(line_no, None),
                );
            }
        }
    }

    out.extend(pending);
}

/// Parse every recognized diagnostic in `stderr`, then `stdout`.
///
/// Exact duplicates (tools that echo to both streams) are dropped.
pub fn parse_signatures(stdout: &str, stderr: &str) -> Vec<ErrorSignature> {
    let mut found = Vec::new();
    parse_stream(stderr, &mut found);
    parse_stream(stdout, &mut found);

    let mut unique: Vec<ErrorSignature> = Vec::with_capacity(found.len());
    for sig in found {
        if !unique.contains(&sig) {
            unique.push(sig);
        }
    }
    unique
}

/// Signatures for a finished command.
///
/// A failing command whose output contains no recognized blocking error
/// still yields one generic error, so it is never mistaken for clean.
pub fn signatures_from_output(
    stdout: &str,
    stderr: &str,
    exit_code: Option<i32>,
) -> Vec<ErrorSignature> {
    let mut signatures = parse_signatures(stdout, stderr);
    let failed = exit_code != Some(0);
    if failed && !signatures.iter().any(ErrorSignature::is_blocking) {
        signatures.push(generic_failure(stdout, stderr, exit_code));
    }
    signatures
}

fn generic_failure(stdout: &str, stderr: &str, exit_code: Option<i32>) -> ErrorSignature {
    let lines = || stderr.lines().chain(stdout.lines()).map(str::trim);
    let message = lines()
        .find(|l| {
            let lower = l.to_ascii_lowercase();
            lower.contains("error") || lower.contains("failed") || lower.contains("panicked")
        })
        .or_else(|| lines().filter(|l| !l.is_empty()).last())
        .map(str::to_string)
        .unwrap_or_else(|| match exit_code {
            Some(code) => format!("command exited with status {code}"),
            None => "command terminated by signal".to_string(),
        });
    ErrorSignature::error(message).with_code("command-failed")
}
