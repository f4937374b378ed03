//! GameSession - the owner of one playthrough.
//!
//! The engine itself only reads states and returns changes. A session keeps
//! the authoritative [`GameState`], runs one command at a time against it,
//! applies the resulting changes and handles save/load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{ConfigError, EngineConfig, RetryPolicy};
use crate::effects::apply_changes;
use crate::oracle::{ClaudeOracle, ContentOracle, OracleError};
use crate::orchestrator::{CommandProcessor, CommandResult, FailureKind};
use crate::persist::{PersistError, SavedGame};
use crate::state::GameState;

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Another command is still being processed")]
    Busy,

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Oracle setup failed: {0}")]
    Oracle(#[from] OracleError),
}

/// Identifies a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One player's game.
pub struct GameSession {
    id: SessionId,
    processor: CommandProcessor,
    retry: RetryPolicy,
    state: Mutex<GameState>,
}

impl GameSession {
    /// A new game with the given oracle.
    pub fn new(oracle: Arc<dyn ContentOracle>, config: EngineConfig) -> Self {
        Self::with_state(CommandProcessor::new(oracle, config), GameState::new_game())
    }

    /// A new game backed by Claude, configured from the environment.
    ///
    /// Requires `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, SessionError> {
        let config = EngineConfig::from_env()?;
        let oracle = ClaudeOracle::from_env()?;
        Ok(Self::new(Arc::new(oracle), config))
    }

    /// Resume from an existing state.
    pub fn with_state(processor: CommandProcessor, state: GameState) -> Self {
        let retry = processor.config().retry.clone();
        Self {
            id: SessionId::new(),
            processor,
            retry,
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Process one command and apply its changes.
    ///
    /// Only one command runs at a time; a second one sent meanwhile is
    /// rejected with [`SessionError::Busy`] rather than queued.
    pub async fn send(&self, text: &str) -> Result<CommandResult, SessionError> {
        let mut state = self.state.try_lock().map_err(|_| SessionError::Busy)?;
        let result = self.processor.process_command(text, &state).await;
        apply_changes(&mut state, &result.state_changes);
        Ok(result)
    }

    /// Like [`send`](Self::send), but retries with backoff while the oracle
    /// is unavailable. Refusals are returned at once.
    pub async fn send_with_retry(&self, text: &str) -> Result<CommandResult, SessionError> {
        let mut state = self.state.try_lock().map_err(|_| SessionError::Busy)?;
        let mut attempt = 1;
        loop {
            let result = self.processor.process_command(text, &state).await;
            let retryable = result.failure.is_some_and(FailureKind::is_retryable);
            if !retryable || attempt >= self.retry.max_attempts {
                apply_changes(&mut state, &result.state_changes);
                return Ok(result);
            }
            let delay = self.retry.delay_for(attempt);
            tracing::warn!(session = %self.id, attempt, ?delay, "oracle unavailable, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> GameState {
        self.state.lock().await.clone()
    }

    /// Save the current state to a file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let saved = SavedGame::new(self.snapshot().await);
        saved.save_json(path).await?;
        Ok(())
    }

    /// Load a saved game into a new session.
    pub async fn load(path: impl AsRef<Path>, processor: CommandProcessor) -> Result<Self, SessionError> {
        let saved = SavedGame::load_json(path).await?;
        tracing::info!(location = %saved.state.player_location, "loaded saved game");
        Ok(Self::with_state(processor, saved.state))
    }
}
