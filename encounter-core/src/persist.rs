//! Encounter snapshots on disk.
//!
//! A combat can be paused mid-round and resumed later from a JSON file.
//! The snapshot carries a format version so stale files are refused
//! instead of half-loaded.

use crate::combat::{CombatState, Phase};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Inconsistent snapshot: {0}")]
    Invalid(String),
}

/// Current snapshot format version.
const SAVE_VERSION: u32 = 1;

/// Quick facts about a snapshot, readable without the full state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterSummary {
    pub campaign: String,
    pub phase: Phase,
    pub round: u32,
    pub combatants: usize,
    pub saved_at: String,
}

/// A saved encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEncounter {
    pub version: u32,
    /// Seconds since the Unix epoch.
    pub saved_at: String,
    pub campaign: String,
    pub summary: EncounterSummary,
    pub state: CombatState,
}

impl SavedEncounter {
    pub fn new(campaign: impl Into<String>, state: CombatState) -> Self {
        let campaign = campaign.into();
        let saved_at = unix_now();
        let summary = EncounterSummary {
            campaign: campaign.clone(),
            phase: state.phase(),
            round: state.round(),
            combatants: state.combatants().len(),
            saved_at: saved_at.clone(),
        };

        Self {
            version: SAVE_VERSION,
            saved_at,
            campaign,
            summary,
            state,
        }
    }

    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;
        check_version(saved.version)?;
        saved.state.validate().map_err(PersistError::Invalid)?;
        Ok(saved)
    }

    /// Read only the summary of a snapshot.
    pub async fn peek_summary(path: impl AsRef<Path>) -> Result<EncounterSummary, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            summary: EncounterSummary,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.summary)
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found == SAVE_VERSION {
        Ok(())
    } else {
        Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        })
    }
}

/// File name for a campaign's encounter snapshot.
pub fn encounter_save_path(base_dir: impl AsRef<Path>, campaign: &str) -> PathBuf {
    let sanitized: String = campaign
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    base_dir.as_ref().join(format!("{sanitized}_encounter.json"))
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_path_is_sanitized() {
        let path = encounter_save_path("/tmp/saves", "Lost Mine: Part 1");
        assert_eq!(path, PathBuf::from("/tmp/saves/Lost_Mine__Part_1_encounter.json"));
    }

    #[test]
    fn test_summary_reflects_state() {
        let saved = SavedEncounter::new("Phandalin", CombatState::new(4, 4));
        assert_eq!(saved.version, SAVE_VERSION);
        assert_eq!(saved.summary.phase, Phase::Setup);
        assert_eq!(saved.summary.round, 1);
        assert_eq!(saved.summary.combatants, 0);
        assert_eq!(saved.summary.saved_at, saved.saved_at);
    }

    #[test]
    fn test_version_check() {
        assert!(check_version(SAVE_VERSION).is_ok());
        assert!(matches!(
            check_version(SAVE_VERSION + 1),
            Err(PersistError::VersionMismatch { found, .. }) if found == SAVE_VERSION + 1
        ));
    }
}
