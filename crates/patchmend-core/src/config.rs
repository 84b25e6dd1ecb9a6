//! TOML configuration.
//!
//! Every section is optional; missing keys take their defaults.
//!
//! ```toml
//! [apply]
//! similarity_threshold = 0.85
//! strategy_order = ["exact_context", "whitespace_tolerant", "approximate_text"]
//!
//! [session]
//! max_cycles = 5
//! compile_command = ["cargo", "check", "--message-format", "short"]
//!
//! [verifier]
//! target_path = "src/lib.rs"
//! timeout_secs = 60
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::ApplyOptions;
use crate::error::{PatchmendError, Result};
use crate::repair::SessionConfig;

/// Settings for the process-backed verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// File the candidate document is written to before each run.
    pub target_path: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Working directory for the command; defaults to the current one.
    pub workdir: Option<PathBuf>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            target_path: None,
            timeout_secs: 120,
            workdir: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchmendConfig {
    pub apply: ApplyOptions,
    pub session: SessionConfig,
    pub verifier: VerifierConfig,
}

impl PatchmendConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PatchmendConfig =
            toml::from_str(content).map_err(|e| PatchmendError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.apply.validate()?;
        self.session.validate()?;
        if self.verifier.timeout_secs == 0 {
            return Err(PatchmendError::Config(
                "verifier.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Session settings with the top-level `[apply]` section applied.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            apply: self.apply.clone(),
            ..self.session.clone()
        }
    }
}

/// Load configuration from `path`. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<PatchmendConfig> {
    match std::fs::read_to_string(path) {
        Ok(content) => PatchmendConfig::from_toml_str(&content).map_err(|e| match e {
            PatchmendError::Config(msg) => {
                PatchmendError::Config(format!("{}: {msg}", path.display()))
            }
            other => other,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PatchmendConfig::default()),
        Err(e) => Err(e.into()),
    }
}
