//! Verification command execution.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use patchmend_core::repair::error::CollaboratorResult;
use patchmend_core::{SourceDocument, Verifier, VerifierConfig, VerifyReport};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::diagnostics::signatures_from_output;
use crate::error::{VerifyError, VerifyResult};

/// Argument placeholder replaced with the candidate document's path.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Result of one command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Where the candidate document was written for this run.
enum Staged {
    Target(PathBuf),
    // Removed from disk when dropped.
    Scratch(NamedTempFile),
}

impl Staged {
    fn path(&self) -> &Path {
        match self {
            Staged::Target(path) => path,
            Staged::Scratch(file) => file.path(),
        }
    }
}

/// Write `text` next to `path` and rename it into place.
fn write_atomically(path: &Path, text: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Substitute [`FILE_PLACEHOLDER`] in every argument.
pub fn substitute_file(command: &[String], file: &Path) -> Vec<String> {
    let file = file.to_string_lossy();
    command
        .iter()
        .map(|arg| arg.replace(FILE_PLACEHOLDER, &file))
        .collect()
}

/// Runs a compile or test command against each candidate document.
///
/// The document goes to `target_path` when configured (replacing the file
/// in place), otherwise to a scratch file that lives for one run.
#[derive(Debug, Clone, Default)]
pub struct CommandVerifier {
    config: VerifierConfig,
}

impl CommandVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Verifier that writes candidates over `path`.
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        Self::new(VerifierConfig {
            target_path: Some(path.into()),
            ..Default::default()
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workdir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    fn stage(&self, document: &SourceDocument) -> VerifyResult<Staged> {
        let text = document.to_text();
        match &self.config.target_path {
            Some(path) => {
                write_atomically(path, &text).map_err(VerifyError::Stage)?;
                Ok(Staged::Target(path.clone()))
            }
            None => {
                let mut file = tempfile::Builder::new()
                    .prefix("patchmend-")
                    .tempfile()
                    .map_err(VerifyError::Stage)?;
                file.write_all(text.as_bytes()).map_err(VerifyError::Stage)?;
                file.flush().map_err(VerifyError::Stage)?;
                Ok(Staged::Scratch(file))
            }
        }
    }

    /// Run `command` (placeholders already substituted) under the timeout.
    pub async fn run(&self, command: &[String]) -> VerifyResult<CommandOutput> {
        let start = Instant::now();

        let (program, args) = command.split_first().ok_or(VerifyError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.workdir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| VerifyError::Spawn {
            program: program.clone(),
            source,
        })?;

        let secs = self.config.timeout_secs;
        let output = tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
            .await
            .map_err(|_| VerifyError::Timeout { secs })?
            .map_err(VerifyError::Wait)?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Stage `document`, run `compile_command` and parse its output.
    pub async fn verify(
        &self,
        document: &SourceDocument,
        compile_command: &[String],
    ) -> VerifyResult<VerifyReport> {
        let staged = self.stage(document)?;
        let argv = substitute_file(compile_command, staged.path());
        let output = self.run(&argv).await?;
        drop(staged);

        let signatures = signatures_from_output(&output.stdout, &output.stderr, output.exit_code);
        tracing::debug!(
            program = %argv[0],
            exit_code = output.exit_code.unwrap_or(-1),
            duration_ms = output.duration_ms,
            signatures = signatures.len(),
            "verification command finished"
        );

        Ok(VerifyReport {
            stdout: output.stdout,
            stderr: output.stderr,
            signatures,
            exit_code: output.exit_code,
        })
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn compile_or_test(
        &self,
        document: &SourceDocument,
        compile_command: &[String],
    ) -> CollaboratorResult<VerifyReport> {
        Ok(self.verify(document, compile_command).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substitute_file() {
        let cmd = argv(&["rustc", "--edition=2021", "{file}", "-o", "{file}.out"]);
        let out = substitute_file(&cmd, Path::new("/tmp/x.rs"));
        assert_eq!(out, argv(&["rustc", "--edition=2021", "/tmp/x.rs", "-o", "/tmp/x.rs.out"]));
    }

    #[test]
    fn test_write_atomically_replaces_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "old").expect("write");
        write_atomically(&path, "new\r\n").expect("atomic write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new\r\n");
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let verifier = CommandVerifier::default();
        let output = verifier.run(&argv(&["echo", "hello"])).await.expect("run");
        assert!(output.passed());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let err = CommandVerifier::default().run(&[]).await.unwrap_err();
        assert!(matches!(err, VerifyError::EmptyCommand));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = CommandVerifier::default()
            .run(&argv(&["patchmend-no-such-program"]))
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Spawn { .. }));
    }
}
