//! Integration tests for the command verifier against real processes.

use std::sync::Arc;

use patchmend_core::repair::scripted::{
    ReplayScript, ScriptedAdvisor, ScriptedCycle, ScriptedHypothesis,
};
use patchmend_core::{
    run_session, CollaboratorError, EditSpec, SourceDocument, Verifier, VerifierConfig,
};
use patchmend_verify::CommandVerifier;
use tempfile::tempdir;

const BROKEN: &str = "fn main() {\n    let total = 3;\n    println!(\"{}\", totl);\n}\n";

/// Fails with a rustc-short style error while the file mentions `totl`.
fn typo_check() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        r#"if grep -q totl "$1"; then echo "$1:3:20: error[E0425]: cannot find value \`totl\` in this scope" >&2; exit 1; fi"#
            .to_string(),
        "sh".to_string(),
        "{file}".to_string(),
    ]
}

#[tokio::test]
async fn failing_check_reports_parsed_signature_and_writes_target() {
    let dir = tempdir().expect("tempdir");
    let target = dir.path().join("main.rs");
    let verifier = CommandVerifier::for_file(&target);

    let report = verifier
        .compile_or_test(&SourceDocument::parse(BROKEN), &typo_check())
        .await
        .expect("verify");

    assert_eq!(report.exit_code, Some(1));
    assert!(!report.is_clean());
    assert_eq!(report.signatures.len(), 1);
    assert_eq!(report.signatures[0].code.as_deref(), Some("E0425"));
    assert_eq!(report.signatures[0].line, Some(3));
    assert_eq!(std::fs::read_to_string(&target).expect("read"), BROKEN);
}

#[tokio::test]
async fn passing_check_is_clean() {
    let dir = tempdir().expect("tempdir");
    let verifier = CommandVerifier::for_file(dir.path().join("main.rs"));
    let fixed = BROKEN.replace("totl", "total");

    let report = verifier
        .compile_or_test(&SourceDocument::parse(&fixed), &typo_check())
        .await
        .expect("verify");

    assert_eq!(report.exit_code, Some(0));
    assert!(report.is_clean());
    assert!(report.signatures.is_empty());
}

#[tokio::test]
async fn scratch_file_is_used_without_target_path() {
    let verifier = CommandVerifier::default();
    let text = "line one\r\nline two";

    let report = verifier
        .compile_or_test(
            &SourceDocument::parse(text),
            &["cat".to_string(), "{file}".to_string()],
        )
        .await
        .expect("verify");

    assert_eq!(report.stdout, text);
    assert!(report.is_clean());
}

#[tokio::test]
async fn unrecognized_failure_is_never_clean() {
    let verifier = CommandVerifier::default();

    let report = verifier
        .compile_or_test(
            &SourceDocument::parse("x\n"),
            &[
                "sh".to_string(),
                "-c".to_string(),
                "echo 'boom happened' >&2; exit 3".to_string(),
            ],
        )
        .await
        .expect("verify");

    assert_eq!(report.exit_code, Some(3));
    assert_eq!(report.signatures.len(), 1);
    assert!(report.signatures[0].is_blocking());
    assert_eq!(report.signatures[0].message, "boom happened");
}

#[tokio::test]
async fn slow_command_times_out() {
    let verifier = CommandVerifier::default().with_timeout(1);

    let err = verifier
        .compile_or_test(
            &SourceDocument::parse("x\n"),
            &["sh".to_string(), "-c".to_string(), "sleep 10".to_string()],
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CollaboratorError::Timeout {
            stage: "verify".to_string(),
            secs: 1
        }
    );
}

#[tokio::test]
async fn command_runs_in_configured_workdir() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join("marker.txt"), "").expect("write");
    let verifier = CommandVerifier::new(VerifierConfig::default()).with_workdir(dir.path());

    let report = verifier
        .compile_or_test(&SourceDocument::parse("x\n"), &["ls".to_string()])
        .await
        .expect("verify");

    assert!(report.stdout.contains("marker.txt"));
}

#[tokio::test]
async fn missing_program_is_verification_error() {
    let err = CommandVerifier::default()
        .compile_or_test(
            &SourceDocument::parse("x\n"),
            &["patchmend-no-such-program".to_string()],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CollaboratorError::Verification(_)));
}

#[tokio::test]
async fn session_repairs_file_with_real_command() {
    let dir = tempdir().expect("tempdir");
    let target = dir.path().join("main.rs");
    let verifier = Arc::new(CommandVerifier::for_file(&target));
    let advisor = Arc::new(ScriptedAdvisor::new(ReplayScript {
        cycles: vec![ScriptedCycle {
            hypotheses: vec![ScriptedHypothesis {
                explanation: "variable name is misspelled".to_string(),
                plan: String::new(),
                edit: EditSpec::snippets(
                    "    println!(\"{}\", totl);",
                    "    println!(\"{}\", total);",
                ),
            }],
        }],
    }));

    let result = run_session(
        SourceDocument::parse(BROKEN),
        typo_check(),
        2,
        advisor,
        verifier,
    )
    .await
    .expect("session");

    assert!(result.succeeded());
    assert_eq!(result.cycles_used, 1);
    let fixed = BROKEN.replace("totl", "total");
    assert_eq!(result.final_document.to_text(), fixed);
    assert_eq!(std::fs::read_to_string(&target).expect("read"), fixed);
}
