//! Session and cycle recording.
//!
//! The repair loop hands every finished cycle and the final result to a
//! [`SessionRecorder`]. Recording is best effort: the loop logs failures and
//! carries on.
//!
//! [`FsRecorder`] layout:
//!
//! ```text
//! <dir>/<session_id>/cycle-001.json
//! <dir>/<session_id>/result.json
//! <dir>/<session_id>/result.digest
//! <dir>/<session_id>/manifest.json
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::repair::session::{RepairCycle, SessionResult};

/// Errors raised while persisting or reading session artifacts.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}

/// Result type for recorder operations.
pub type RecordResult<T> = std::result::Result<T, RecordError>;

/// SHA-256 digest, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receives cycle snapshots and the final result of a session.
pub trait SessionRecorder: Send + Sync {
    fn record_cycle(&self, session_id: &str, cycle: &RepairCycle) -> RecordResult<()>;

    fn record_result(&self, result: &SessionResult) -> RecordResult<()>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

impl SessionRecorder for NullRecorder {
    fn record_cycle(&self, _session_id: &str, _cycle: &RepairCycle) -> RecordResult<()> {
        Ok(())
    }

    fn record_result(&self, _result: &SessionResult) -> RecordResult<()> {
        Ok(())
    }
}

/// Keeps recorded values in memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    cycles: Mutex<Vec<(String, RepairCycle)>>,
    results: Mutex<Vec<SessionResult>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycles(&self) -> Vec<RepairCycle> {
        self.cycles
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn results(&self) -> Vec<SessionResult> {
        self.results.lock().unwrap().clone()
    }
}

impl SessionRecorder for MemoryRecorder {
    fn record_cycle(&self, session_id: &str, cycle: &RepairCycle) -> RecordResult<()> {
        self.cycles
            .lock()
            .unwrap()
            .push((session_id.to_string(), cycle.clone()));
        Ok(())
    }

    fn record_result(&self, result: &SessionResult) -> RecordResult<()> {
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }
}

/// One file listed in a session manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub digest: String,
}

/// Index of a recorded session directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub session_id: String,
    pub outcome: String,
    pub cycles_used: u32,
    pub files: Vec<ManifestEntry>,
    pub written_at: DateTime<Utc>,
}

/// Writes JSON artifacts under a root directory.
#[derive(Debug, Clone)]
pub struct FsRecorder {
    root: PathBuf,
}

impl FsRecorder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Read `<root>/<session_id>/result.json` and verify its digest.
    pub fn read_result(&self, session_id: &str) -> RecordResult<SessionResult> {
        let dir = self.session_dir(session_id);
        let json = std::fs::read(dir.join("result.json"))?;
        let digest = std::fs::read_to_string(dir.join("result.digest"))?;
        let actual = ContentDigest::from_bytes(&json).as_str().to_string();
        if digest.trim() != actual {
            return Err(RecordError::DigestMismatch {
                expected: digest.trim().to_string(),
                actual,
            });
        }
        Ok(serde_json::from_slice(&json)?)
    }

    pub fn read_manifest(&self, session_id: &str) -> RecordResult<SessionManifest> {
        let json = std::fs::read(self.session_dir(session_id).join("manifest.json"))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl SessionRecorder for FsRecorder {
    fn record_cycle(&self, session_id: &str, cycle: &RepairCycle) -> RecordResult<()> {
        let dir = self.session_dir(session_id);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(cycle)?;
        std::fs::write(dir.join(format!("cycle-{:03}.json", cycle.index)), json)?;
        Ok(())
    }

    fn record_result(&self, result: &SessionResult) -> RecordResult<()> {
        let dir = self.session_dir(&result.session_id);
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_vec_pretty(result)?;
        let digest = ContentDigest::from_bytes(&json);
        std::fs::write(dir.join("result.json"), &json)?;
        std::fs::write(dir.join("result.digest"), digest.as_str().as_bytes())?;

        let mut cycle_files: Vec<String> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with("cycle-") && name.ends_with(".json"))
            .collect();
        cycle_files.sort();

        let mut files = Vec::with_capacity(cycle_files.len() + 1);
        for name in cycle_files {
            let bytes = std::fs::read(dir.join(&name))?;
            files.push(ManifestEntry {
                digest: ContentDigest::from_bytes(&bytes).as_str().to_string(),
                file: name,
            });
        }
        files.push(ManifestEntry {
            file: "result.json".to_string(),
            digest: digest.as_str().to_string(),
        });

        let manifest = SessionManifest {
            session_id: result.session_id.clone(),
            outcome: result.outcome.as_str().to_string(),
            cycles_used: result.cycles_used,
            files,
            written_at: Utc::now(),
        };
        std::fs::write(dir.join("manifest.json"), serde_json::to_vec_pretty(&manifest)?)?;
        Ok(())
    }
}
