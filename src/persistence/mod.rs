//! Checkpoint save/load (§4.6): a single JSON-equivalent document covering
//! identity, cognitive state, thought history, and the pattern/wisdom
//! libraries, persisted atomically (temp file + fsync + rename).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CheckpointError;
use crate::identity::Identity;
use crate::types::{Pattern, Thought, Wisdom};

/// The current on-disk schema version (§6: "`schema_version` starts at 1").
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A serializable snapshot of [`crate::types::CognitiveState`]'s scalar
/// fields. The bounded lists (`recent_topics`, `working_memory`) are not
/// checkpointed independently: `working_memory` is reconstructible from the
/// tail of `thought_history`, and `recent_topics` is derived from thought
/// tags on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveStateSnapshot {
    pub awareness: f64,
    pub cognitive_load: f64,
    pub fatigue: f64,
    pub current_focus: String,
    pub emotional_tone: std::collections::HashMap<String, f64>,
}

/// The single logical checkpoint document (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub schema_version: u32,
    pub identity: Identity,
    pub cognitive_state_snapshot: CognitiveStateSnapshot,
    pub thought_history: Vec<Thought>,
    pub pattern_library: Vec<Pattern>,
    pub wisdom_library: Vec<Wisdom>,
    #[serde(default)]
    pub interest_patterns: serde_json::Value,
    #[serde(default)]
    pub goals: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub version_string: String,
}

/// Gates periodic saves on a wall-clock interval (§4.6 Save policy): a
/// timer, not a thought-count threshold.
pub struct CheckpointGate {
    interval: std::time::Duration,
    last_save: std::time::Instant,
}

impl CheckpointGate {
    #[must_use]
    pub fn new(interval: std::time::Duration) -> Self {
        Self {
            interval,
            last_save: std::time::Instant::now(),
        }
    }

    #[must_use]
    pub fn should_checkpoint(&self) -> bool {
        self.last_save.elapsed() >= self.interval
    }

    pub fn mark_saved(&mut self) {
        self.last_save = std::time::Instant::now();
    }
}

/// Write `checkpoint` atomically to `path`: serialize, write to `path.tmp`,
/// `fsync`, then `rename` over the live path (§4.6 Save policy).
pub fn save(path: impl AsRef<Path>, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
    let path = path.as_ref();
    let tmp_path = tmp_path_for(path);

    let json = serde_json::to_vec_pretty(checkpoint)?;

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    info!(path = %path.display(), thoughts = checkpoint.thought_history.len(), "checkpoint saved");
    Ok(())
}

/// Load a checkpoint from `path`. Returns `Ok(None)` if the file is absent,
/// unparseable, or truncated (a crashed save mid-write) — §4.6: "Load must
/// tolerate a truncated temp file (ignore it)" generalizes here to tolerating
/// a truncated/corrupt live file as "no checkpoint", since the atomic
/// rename means a genuinely truncated live file can only arise from external
/// tampering, not from this module's own save path.
pub fn load(path: impl AsRef<Path>) -> Result<Option<Checkpoint>, CheckpointError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read checkpoint file");
            return Ok(None);
        }
    };

    let checkpoint: Checkpoint = match serde_json::from_slice(&bytes) {
        Ok(checkpoint) => checkpoint,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "checkpoint file unparseable, treating as absent");
            return Ok(None);
        }
    };

    if checkpoint.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(CheckpointError::SchemaVersionMismatch {
            found: checkpoint.schema_version,
            expected: CURRENT_SCHEMA_VERSION,
        });
    }

    Ok(Some(checkpoint))
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut os_string = path.as_os_str().to_owned();
    os_string.push(".tmp");
    PathBuf::from(os_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ThoughtSource, ThoughtType};

    fn sample_checkpoint() -> Checkpoint {
        let identity = Identity::new(vec!["curiosity".into()], vec!["systems".into()]);
        Checkpoint {
            schema_version: CURRENT_SCHEMA_VERSION,
            identity,
            cognitive_state_snapshot: CognitiveStateSnapshot {
                awareness: 0.5,
                cognitive_load: 0.2,
                fatigue: 0.1,
                current_focus: "testing".into(),
                emotional_tone: std::collections::HashMap::new(),
            },
            thought_history: vec![Thought::new(ThoughtType::Insight, "hello", ThoughtSource::Stream)],
            pattern_library: Vec::new(),
            wisdom_library: Vec::new(),
            interest_patterns: serde_json::json!({}),
            goals: serde_json::json!({}),
            timestamp: Utc::now(),
            version_string: "0.1.0".into(),
        }
    }

    #[test]
    fn round_trip_preserves_identity_signature_and_counts() {
        let dir = std::env::temp_dir().join(format!("echobeats-test-{}", uuid::Uuid::new_v4()));
        let checkpoint = sample_checkpoint();
        save(&dir, &checkpoint).unwrap();

        let loaded = load(&dir).unwrap().expect("checkpoint should load");
        assert_eq!(loaded.identity.signature, checkpoint.identity.signature);
        assert_eq!(loaded.thought_history.len(), checkpoint.thought_history.len());
        assert_eq!(loaded.pattern_library.len(), checkpoint.pattern_library.len());

        fs::remove_file(&dir).ok();
    }

    #[test]
    fn missing_file_loads_as_none() {
        let path = std::env::temp_dir().join(format!("echobeats-missing-{}", uuid::Uuid::new_v4()));
        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn unparseable_file_loads_as_none() {
        let path = std::env::temp_dir().join(format!("echobeats-corrupt-{}", uuid::Uuid::new_v4()));
        fs::write(&path, b"not json").unwrap();
        assert!(load(&path).unwrap().is_none());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn mismatched_schema_version_is_an_error() {
        let path = std::env::temp_dir().join(format!("echobeats-mismatch-{}", uuid::Uuid::new_v4()));
        let mut checkpoint = sample_checkpoint();
        checkpoint.schema_version = CURRENT_SCHEMA_VERSION + 1;
        save(&path, &checkpoint).unwrap();

        let result = load(&path);
        assert!(matches!(result, Err(CheckpointError::SchemaVersionMismatch { .. })));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn gate_fires_only_after_interval_elapses() {
        let gate = CheckpointGate::new(std::time::Duration::from_secs(60));
        assert!(!gate.should_checkpoint());
    }
}
