//! patchmend - tolerant patching and guided compiler repair
//!
//! ## Commands
//!
//! - `apply`: apply a unified diff or a before/after snippet pair to a file
//! - `diagnose`: run a check command and show the first error in context
//! - `session`: run a scripted repair session and write the result back

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use patchmend_core::repair::scripted::{ReplayScript, ScriptedAdvisor};
use patchmend_core::telemetry::{init_tracing, level_for_verbosity};
use patchmend_core::{
    load_config, ApplyOutcome, CancelSignal, CycleOutcome, Diagnoser, EditSpec, FsRecorder,
    PatchEngine, PatchmendConfig, RepairLoop, SessionResult, SourceDocument, VerifierConfig,
    VerifierDiagnoser,
};
use patchmend_verify::CommandVerifier;

#[derive(Parser)]
#[command(name = "patchmend")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tolerant patch application and guided compiler repair", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (missing file means defaults)
    #[arg(
        short,
        long,
        global = true,
        env = "PATCHMEND_CONFIG",
        default_value = "patchmend.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply an edit to a file
    Apply {
        /// File to patch
        #[arg(short, long)]
        file: PathBuf,

        /// Unified diff to apply
        #[arg(long, conflicts_with_all = ["before", "after"])]
        diff: Option<PathBuf>,

        /// Snippet to look for
        #[arg(long, requires = "after")]
        before: Option<PathBuf>,

        /// Snippet to put in its place
        #[arg(long, requires = "before")]
        after: Option<PathBuf>,

        /// Write the patched text back instead of printing it
        #[arg(long)]
        in_place: bool,

        /// Print per-hunk diagnostics as JSON on stderr
        #[arg(long)]
        report: bool,
    },

    /// Run a check command and show the first error
    Diagnose {
        /// File under repair
        #[arg(short, long)]
        file: PathBuf,

        /// Check command, split on whitespace; `{file}` is the file path
        #[arg(long)]
        command: Option<String>,
    },

    /// Run a repair session with a scripted advisor
    Session {
        /// File under repair
        #[arg(short, long)]
        file: PathBuf,

        /// Check command, split on whitespace; `{file}` is the file path
        #[arg(long)]
        command: Option<String>,

        /// JSON replay script with hypotheses per cycle
        #[arg(long)]
        script: PathBuf,

        /// Override the configured cycle limit
        #[arg(long)]
        max_cycles: Option<u32>,

        /// Directory for cycle and result snapshots
        #[arg(long)]
        record_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.json, level_for_verbosity(cli.verbose));

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    match cli.command {
        Commands::Apply {
            file,
            diff,
            before,
            after,
            in_place,
            report,
        } => {
            let spec = read_edit(diff.as_deref(), before.as_deref(), after.as_deref())?;
            cmd_apply(&config, &file, &spec, in_place, report)
        }
        Commands::Diagnose { file, command } => {
            cmd_diagnose(&config, &file, command.as_deref()).await
        }
        Commands::Session {
            file,
            command,
            script,
            max_cycles,
            record_dir,
        } => {
            cmd_session(
                &config,
                &file,
                command.as_deref(),
                &script,
                max_cycles,
                record_dir.as_deref(),
            )
            .await
        }
    }
}

fn read_document(path: &Path) -> Result<SourceDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(SourceDocument::parse(&text))
}

fn read_edit(diff: Option<&Path>, before: Option<&Path>, after: Option<&Path>) -> Result<EditSpec> {
    match (diff, before, after) {
        (Some(diff), _, _) => {
            let raw = std::fs::read_to_string(diff)
                .with_context(|| format!("Failed to read diff {}", diff.display()))?;
            EditSpec::parse_auto(&raw).context("Failed to parse diff")
        }
        (None, Some(before), Some(after)) => {
            let before = std::fs::read_to_string(before)
                .with_context(|| format!("Failed to read {}", before.display()))?;
            let after = std::fs::read_to_string(after)
                .with_context(|| format!("Failed to read {}", after.display()))?;
            Ok(EditSpec::snippets(before, after))
        }
        _ => anyhow::bail!("Provide --diff, or both --before and --after"),
    }
}

/// `--command` when given, otherwise the configured compile command.
fn resolve_command(cli: Option<&str>, configured: &[String]) -> Result<Vec<String>> {
    let command: Vec<String> = match cli {
        Some(raw) => raw.split_whitespace().map(str::to_string).collect(),
        None => configured.to_vec(),
    };
    if command.is_empty() {
        anyhow::bail!("No check command: pass --command or set session.compile_command");
    }
    Ok(command)
}

/// The verifier writes candidates over `file` unless the config says otherwise.
fn verifier_for(config: &PatchmendConfig, file: &Path) -> CommandVerifier {
    let verifier_config = VerifierConfig {
        target_path: Some(
            config
                .verifier
                .target_path
                .clone()
                .unwrap_or_else(|| file.to_path_buf()),
        ),
        ..config.verifier.clone()
    };
    CommandVerifier::new(verifier_config)
}

fn apply_to_file(config: &PatchmendConfig, file: &Path, spec: &EditSpec) -> Result<ApplyOutcome> {
    let document = read_document(file)?;
    let engine = PatchEngine::new(config.apply.clone()).context("Invalid apply options")?;
    engine.apply_spec(&document, spec).context("Malformed edit")
}

fn cmd_apply(
    config: &PatchmendConfig,
    file: &Path,
    spec: &EditSpec,
    in_place: bool,
    report: bool,
) -> Result<()> {
    let outcome = apply_to_file(config, file, spec)?;

    if report {
        eprintln!("{}", serde_json::to_string_pretty(&outcome.hunks)?);
    }
    for hunk in &outcome.hunks {
        info!("{}", hunk.describe());
    }

    if !outcome.success {
        for hunk in outcome.failed_hunks() {
            eprintln!("{}", hunk.describe());
        }
        anyhow::bail!("Patch did not apply to {}", file.display());
    }

    if in_place {
        std::fs::write(file, outcome.document.to_text())
            .with_context(|| format!("Failed to write {}", file.display()))?;
        eprintln!(
            "Patched {} ({} hunk(s))",
            file.display(),
            outcome.hunks.len()
        );
    } else {
        print!("{}", outcome.document.to_text());
    }
    Ok(())
}

async fn cmd_diagnose(config: &PatchmendConfig, file: &Path, command: Option<&str>) -> Result<()> {
    let document = read_document(file)?;
    let command = resolve_command(command, &config.session.compile_command)?;
    let verifier = Arc::new(verifier_for(config, file));
    let diagnoser = VerifierDiagnoser::new(verifier, command, config.session.context_radius);

    match diagnoser
        .get_diagnostic(&document, &[])
        .await
        .context("Diagnosis failed")?
    {
        Some(context) => {
            println!("{}", context.render());
            if context.baseline.len() > 1 {
                println!("({} diagnostics reported in total)", context.baseline.len());
            }
        }
        None => println!("No blocking errors in {}", file.display()),
    }
    Ok(())
}

#[derive(Serialize)]
struct CycleSummary<'a> {
    index: u32,
    target: Option<String>,
    outcome: &'a CycleOutcome,
    hypotheses: usize,
    attempts: usize,
}

#[derive(Serialize)]
struct SessionSummary<'a> {
    session_id: &'a str,
    outcome: &'static str,
    cycles_used: u32,
    cycles: Vec<CycleSummary<'a>>,
}

fn summarize(result: &SessionResult) -> SessionSummary<'_> {
    SessionSummary {
        session_id: &result.session_id,
        outcome: result.outcome.as_str(),
        cycles_used: result.cycles_used,
        cycles: result
            .cycle_history
            .iter()
            .map(|c| CycleSummary {
                index: c.index,
                target: c.target.as_ref().map(|t| t.label()),
                outcome: &c.outcome,
                hypotheses: c.hypotheses.len(),
                attempts: c.attempts.len(),
            })
            .collect(),
    }
}

async fn cmd_session(
    config: &PatchmendConfig,
    file: &Path,
    command: Option<&str>,
    script: &Path,
    max_cycles: Option<u32>,
    record_dir: Option<&Path>,
) -> Result<()> {
    let document = read_document(file)?;
    let script = ReplayScript::load(script)
        .with_context(|| format!("Failed to load replay script {}", script.display()))?;

    let mut session = config.session_config();
    session.compile_command = resolve_command(command, &session.compile_command)?;
    if let Some(max) = max_cycles {
        session.max_cycles = max;
    }

    let verifier = Arc::new(verifier_for(config, file));
    let diagnoser = Arc::new(VerifierDiagnoser::new(
        verifier.clone(),
        session.compile_command.clone(),
        session.context_radius,
    ));
    let advisor = Arc::new(ScriptedAdvisor::new(script));

    let (cancel_tx, cancel) = CancelSignal::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let mut repair = RepairLoop::new(session, diagnoser, advisor, verifier)
        .context("Invalid session configuration")?
        .with_cancel(cancel);
    if let Some(dir) = record_dir {
        repair = repair.with_recorder(Arc::new(FsRecorder::new(dir)));
    }

    let result = repair.run_session(document).await;

    // The verifier leaves the last candidate on disk; restore the outcome.
    std::fs::write(file, result.final_document.to_text())
        .with_context(|| format!("Failed to write {}", file.display()))?;

    println!("{}", serde_json::to_string_pretty(&summarize(&result))?);

    if !result.succeeded() {
        anyhow::bail!("Repair session ended: {}", result.outcome.as_str());
    }
    Ok(())
}
