//! The content oracle: everything generative sits behind this seam.
//!
//! The engine never trusts the oracle for structure. It asks for prose,
//! verdicts and interpretations, then checks and sanitizes whatever comes
//! back before it turns into state changes.

pub mod anthropic;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::difficulty::{DoorDifficulty, HintStyle, PuzzleComplexity, Virtue};
use crate::intent::{ContextDigest, Intent};
use crate::state::{Decision, DoorNumber, Interaction, Item, PuzzleState, Sentiment};

pub use self::anthropic::{ClaudeOracle, OracleModelConfig};

/// Ways an oracle call can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("content oracle timed out")]
    Timeout,

    #[error("content oracle unavailable: {0}")]
    Unavailable(String),

    #[error("content oracle returned an unusable response: {0}")]
    InvalidResponse(String),

    /// The oracle refused the request outright, e.g. a bad API key.
    #[error("content oracle refused the request: {0}")]
    Rejected(String),
}

impl OracleError {
    /// Whether asking again later could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, OracleError::Rejected(_))
    }
}

impl From<::claude::Error> for OracleError {
    fn from(err: ::claude::Error) -> Self {
        match err {
            ::claude::Error::Timeout => OracleError::Timeout,
            ::claude::Error::Parse(msg) => OracleError::InvalidResponse(msg),
            ::claude::Error::MissingToolUse(tool) => {
                OracleError::InvalidResponse(format!("no call to {tool}"))
            }
            other if other.is_transient() => OracleError::Unavailable(other.to_string()),
            other => OracleError::Rejected(other.to_string()),
        }
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

/// How the oracle read a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    /// Free-form verb; mapped onto an action kind by the parser.
    pub action: String,
    pub target: Option<String>,
    /// 0.0 to 1.0.
    pub confidence: f32,
    /// Readings the oracle could not choose between.
    #[serde(default)]
    pub candidates: Vec<String>,
}

/// Verdict on whether a creative action makes sense here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgment {
    pub allowed: bool,
    pub reason: String,
}

/// Context for judging an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeContext {
    pub digest: ContextDigest,
    pub player_history: Vec<Decision>,
}

/// Ask for a new location inside a door's world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRequest {
    pub location_id: String,
    pub door: DoorNumber,
    pub theme: String,
    pub difficulty: DoorDifficulty,
    /// Where the player is coming from, if not the hub.
    pub from_location: Option<String>,
    pub via_exit: Option<String>,
    pub player_history: Vec<Decision>,
}

/// Oracle output for a location, before the engine assigns ids and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDraft {
    pub description: String,
    pub exits: Vec<String>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub npcs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueRequest {
    pub npc_id: String,
    pub player_action: String,
    pub location_description: String,
    pub interaction_history: Vec<Interaction>,
    pub player_history: Vec<Decision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcReply {
    pub text: String,
    pub sentiment: Sentiment,
    /// The oracle considers this exchange a turning point.
    pub major: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzleRequest {
    pub door: DoorNumber,
    pub location_id: String,
    pub location_description: String,
    pub theme: String,
    pub complexity: PuzzleComplexity,
    pub required_virtues: Vec<Virtue>,
    pub player_history: Vec<Decision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub description: String,
    pub solution_criteria: String,
    pub reward: Option<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleVerdict {
    pub solved: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintRequest {
    pub puzzle: PuzzleState,
    pub location_description: String,
    pub keys_collected: usize,
    pub previous_hints: u32,
    pub style: HintStyle,
}

/// Generative content service.
#[async_trait]
pub trait ContentOracle: Send + Sync {
    async fn interpret_command(
        &self,
        text: &str,
        digest: &ContextDigest,
    ) -> Result<Interpretation, OracleError>;

    async fn judge_action(
        &self,
        intent: &Intent,
        context: &JudgeContext,
    ) -> Result<Judgment, OracleError>;

    async fn generate_location(
        &self,
        request: &LocationRequest,
    ) -> Result<LocationDraft, OracleError>;

    async fn generate_npc_dialogue(
        &self,
        request: &DialogueRequest,
    ) -> Result<NpcReply, OracleError>;

    async fn generate_puzzle(&self, request: &PuzzleRequest) -> Result<Puzzle, OracleError>;

    async fn evaluate_puzzle_attempt(
        &self,
        puzzle: &PuzzleState,
        attempt: &str,
        inventory: &[Item],
    ) -> Result<PuzzleVerdict, OracleError>;

    async fn generate_hint(&self, request: &HintRequest) -> Result<String, OracleError>;

    /// Returns an image reference (URL or data URI).
    async fn generate_location_image(&self, description: &str) -> Result<String, OracleError>;
}

// ============================================================================
// Time-limited handle
// ============================================================================

/// Shared oracle plus the time limit applied to every call.
#[derive(Clone)]
pub struct OracleHandle {
    inner: Arc<dyn ContentOracle>,
    timeout: Duration,
}

impl OracleHandle {
    pub fn new(inner: Arc<dyn ContentOracle>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn limited<T>(
        &self,
        call: &'static str,
        fut: impl Future<Output = Result<T, OracleError>>,
    ) -> Result<T, OracleError> {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout),
        };
        if let Err(err) = &result {
            tracing::warn!(call, error = %err, "oracle call failed");
        }
        result
    }

    pub async fn interpret_command(
        &self,
        text: &str,
        digest: &ContextDigest,
    ) -> Result<Interpretation, OracleError> {
        self.limited("interpret_command", self.inner.interpret_command(text, digest))
            .await
    }

    pub async fn judge_action(
        &self,
        intent: &Intent,
        context: &JudgeContext,
    ) -> Result<Judgment, OracleError> {
        self.limited("judge_action", self.inner.judge_action(intent, context))
            .await
    }

    pub async fn generate_location(
        &self,
        request: &LocationRequest,
    ) -> Result<LocationDraft, OracleError> {
        self.limited("generate_location", self.inner.generate_location(request))
            .await
    }

    pub async fn generate_npc_dialogue(
        &self,
        request: &DialogueRequest,
    ) -> Result<NpcReply, OracleError> {
        self.limited(
            "generate_npc_dialogue",
            self.inner.generate_npc_dialogue(request),
        )
        .await
    }

    pub async fn generate_puzzle(&self, request: &PuzzleRequest) -> Result<Puzzle, OracleError> {
        self.limited("generate_puzzle", self.inner.generate_puzzle(request))
            .await
    }

    pub async fn evaluate_puzzle_attempt(
        &self,
        puzzle: &PuzzleState,
        attempt: &str,
        inventory: &[Item],
    ) -> Result<PuzzleVerdict, OracleError> {
        self.limited(
            "evaluate_puzzle_attempt",
            self.inner.evaluate_puzzle_attempt(puzzle, attempt, inventory),
        )
        .await
    }

    pub async fn generate_hint(&self, request: &HintRequest) -> Result<String, OracleError> {
        self.limited("generate_hint", self.inner.generate_hint(request))
            .await
    }

    pub async fn generate_location_image(&self, description: &str) -> Result<String, OracleError> {
        self.limited(
            "generate_location_image",
            self.inner.generate_location_image(description),
        )
        .await
    }
}
