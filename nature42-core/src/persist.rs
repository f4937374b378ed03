//! Saving and loading games.
//!
//! A save is the full [`GameState`] plus a little metadata, written as
//! pretty-printed JSON. Loading checks the format version and the state's
//! own invariants before handing it back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

use crate::state::{GameState, StateError};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Saved game is inconsistent: {0}")]
    Inconsistent(#[from] StateError),
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// A saved game with everything needed to resume play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGame {
    /// Save format version for compatibility checking.
    pub version: u32,

    pub saved_at: DateTime<Utc>,

    pub state: GameState,

    pub metadata: SaveMetadata,
}

/// Summary readable without loading the whole state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub location: String,
    pub keys_collected: usize,
    pub keys_inserted: usize,
    pub decisions: usize,
    pub vault_open: bool,
    /// Minutes between game start and the last command.
    pub play_time_minutes: i64,
}

impl SaveMetadata {
    fn describe(state: &GameState) -> Self {
        Self {
            location: state.player_location.clone(),
            keys_collected: state.keys_collected.len(),
            keys_inserted: state.keys_inserted.len(),
            decisions: state.decision_history.len(),
            vault_open: state.is_vault_open(),
            play_time_minutes: (state.last_updated - state.game_started_at).num_minutes(),
        }
    }
}

impl SavedGame {
    pub fn new(state: GameState) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: Utc::now(),
            metadata: SaveMetadata::describe(&state),
            state,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PersistError> {
        #[derive(Deserialize)]
        struct Version {
            version: u32,
        }

        let Version { version } = serde_json::from_str(content)?;
        if version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: version,
            });
        }

        let saved: Self = serde_json::from_str(content)?;
        saved.state.check_consistency()?;
        Ok(saved)
    }

    /// Read only the metadata of a save.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }
        Ok(partial.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DoorNumber, Item};

    #[test]
    fn test_round_trip_in_memory() {
        let mut state = GameState::new_game();
        let door = DoorNumber::new(1).unwrap();
        state.inventory.push(Item::key(door));
        state.keys_collected.push(door);

        let saved = SavedGame::new(state.clone());
        let json = serde_json::to_string(&saved).unwrap();
        let loaded = SavedGame::from_json(&json).unwrap();

        assert_eq!(loaded.state, state);
        assert_eq!(loaded.metadata.keys_collected, 1);
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut saved = SavedGame::new(GameState::new_game());
        saved.version = 99;
        let json = serde_json::to_string(&saved).unwrap();
        assert!(matches!(
            SavedGame::from_json(&json),
            Err(PersistError::VersionMismatch { expected: 1, found: 99 })
        ));
    }

    #[test]
    fn test_inconsistent_save_rejected() {
        let mut state = GameState::new_game();
        state.player_location = "nowhere".to_string();
        let json = serde_json::to_string(&SavedGame::new(state)).unwrap();
        assert!(matches!(
            SavedGame::from_json(&json),
            Err(PersistError::Inconsistent(_))
        ));
    }
}
