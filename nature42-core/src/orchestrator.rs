//! The command pipeline.
//!
//! [`CommandProcessor`] runs one command through parse, validate, execute
//! and track, stopping at the first stage that fails. It reads the state it
//! is given and hands back the changes to apply; it never applies them
//! itself and never retries.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::decisions::DecisionTracker;
use crate::difficulty::DifficultyTable;
use crate::effects::{StateChange, StateChanges};
use crate::executor::{ActionExecutor, ActionResult};
use crate::fallback;
use crate::hub;
use crate::intent::{parse_fixed, Action, ContextDigest, Intent, IntentParser};
use crate::oracle::{ContentOracle, OracleError, OracleHandle};
use crate::state::{Decision, GameState};
use crate::validate::{ActionValidator, ValidationError};

/// Why a command did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The command could not be understood.
    InvalidInput,
    /// The command could mean more than one thing.
    Ambiguous,
    /// Understood, but not possible right now.
    NotAllowed,
    /// The oracle was needed and did not answer in time.
    OracleUnavailable,
    /// The oracle refused the request; asking again will not help.
    OracleRejected,
    /// The supplied state breaks its own invariants.
    InconsistentState,
}

impl FailureKind {
    /// Classify an oracle failure.
    pub fn from_oracle(err: &OracleError) -> Self {
        if err.is_transient() {
            FailureKind::OracleUnavailable
        } else {
            FailureKind::OracleRejected
        }
    }

    /// Whether the same command may succeed if sent again unchanged.
    pub fn is_retryable(self) -> bool {
        self == FailureKind::OracleUnavailable
    }
}

/// What the caller gets back for one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Always non-empty.
    pub message: String,
    pub success: bool,
    pub state_changes: StateChanges,
    pub needs_clarification: bool,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub game_complete: bool,
    pub failure: Option<FailureKind>,
    /// The decision recorded for this command, if it was significant.
    #[serde(default)]
    pub decision: Option<Decision>,
}

impl CommandResult {
    fn rejected(message: impl Into<String>, failure: FailureKind, state_changes: StateChanges) -> Self {
        Self {
            message: message.into(),
            success: false,
            state_changes,
            needs_clarification: false,
            suggestions: Vec::new(),
            game_complete: false,
            failure: Some(failure),
            decision: None,
        }
    }

    fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Parsing,
    Validating,
    Executing,
    Tracking,
    Done,
}

/// Runs commands against game states.
///
/// Holds no game state of its own, so one processor can serve any number of
/// sessions at once.
#[derive(Clone)]
pub struct CommandProcessor {
    oracle: OracleHandle,
    config: EngineConfig,
    parser: IntentParser,
    validator: ActionValidator,
    executor: ActionExecutor,
    tracker: DecisionTracker,
}

impl CommandProcessor {
    pub fn new(oracle: Arc<dyn ContentOracle>, config: EngineConfig) -> Self {
        let oracle = OracleHandle::new(oracle, config.oracle_timeout);
        Self::build(oracle, config, Arc::new(DifficultyTable::standard()))
    }

    /// Use a different difficulty curve.
    pub fn with_difficulty(self, difficulty: DifficultyTable) -> Self {
        Self::build(self.oracle, self.config, Arc::new(difficulty))
    }

    fn build(oracle: OracleHandle, config: EngineConfig, difficulty: Arc<DifficultyTable>) -> Self {
        Self {
            parser: IntentParser::new(oracle.clone()).with_min_confidence(config.min_confidence),
            validator: ActionValidator::new(oracle.clone(), config.decision_window),
            executor: ActionExecutor::new(oracle.clone(), difficulty, config.decision_window),
            tracker: DecisionTracker::new(),
            oracle,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn difficulty(&self) -> &DifficultyTable {
        self.executor.difficulty()
    }

    /// The command reference.
    pub fn help() -> &'static str {
        hub::HELP_TEXT
    }

    /// Process one command against a snapshot of the game.
    pub async fn process_command(&self, text: &str, state: &GameState) -> CommandResult {
        let now = Utc::now().max(state.last_updated);
        let nothing = || StateChanges::none(now);

        // Help works even when the state is broken.
        if let Some(intent) = parse_fixed(text) {
            if intent.action == Some(Action::Help) {
                return self.finish(&intent, ActionResult::success(hub::HELP_TEXT), state, now);
            }
        }

        if let Err(err) = state.check_consistency() {
            tracing::error!(error = %err, "refusing command on inconsistent state");
            return CommandResult::rejected(
                format!("The game state is inconsistent and cannot be used: {err}"),
                FailureKind::InconsistentState,
                nothing(),
            );
        }

        enter(Stage::Parsing, text);
        let digest = ContextDigest::from_state(state);
        let intent = self.parser.parse(text, &digest).await;

        if intent.is_invalid {
            let failure = intent
                .oracle_error
                .as_ref()
                .map_or(FailureKind::InvalidInput, FailureKind::from_oracle);
            let message = intent
                .reason
                .clone()
                .unwrap_or_else(|| "I don't understand that.".to_string());
            enter(Stage::Done, text);
            return CommandResult::rejected(message, failure, nothing())
                .with_suggestions(intent.suggestions);
        }

        if intent.is_ambiguous {
            let message = intent
                .clarification_prompt
                .clone()
                .unwrap_or_else(|| "Could you be more specific?".to_string());
            let mut result = CommandResult::rejected(message, FailureKind::Ambiguous, nothing())
                .with_suggestions(intent.suggestions);
            result.needs_clarification = true;
            enter(Stage::Done, text);
            return result;
        }

        enter(Stage::Validating, text);
        let validation = match self.validator.validate(&intent, state).await {
            Ok(validation) => validation,
            Err(err) => {
                tracing::warn!(error = %err, "validation needed the oracle");
                enter(Stage::Done, text);
                let ValidationError::Oracle(cause) = &err;
                return CommandResult::rejected(
                    fallback::TRY_AGAIN,
                    FailureKind::from_oracle(cause),
                    nothing(),
                );
            }
        };
        if !validation.is_valid {
            enter(Stage::Done, text);
            let reason = validation
                .reason
                .unwrap_or_else(|| "You can't do that right now.".to_string());
            return CommandResult::rejected(reason, FailureKind::NotAllowed, nothing())
                .with_suggestions(digest.suggestions());
        }

        enter(Stage::Executing, text);
        let result = self.executor.execute(&intent, &validation, state, now).await;

        enter(Stage::Tracking, text);
        let finished = self.finish(&intent, result, state, now);
        enter(Stage::Done, text);
        finished
    }

    /// Attach the decision, if any, and package the result.
    fn finish(
        &self,
        intent: &Intent,
        mut result: ActionResult,
        state: &GameState,
        now: chrono::DateTime<Utc>,
    ) -> CommandResult {
        if !result.success {
            let failure = result.failure.unwrap_or(FailureKind::NotAllowed);
            return CommandResult::rejected(result.message, failure, StateChanges::none(now));
        }

        if self.tracker.is_significant(intent, &result) {
            let decision =
                self.tracker
                    .make_decision(intent, &result, &state.player_location, now);
            tracing::info!(decision = %decision.description, "significant decision");
            result.changes.push(StateChange::DecisionRecorded {
                index: state.decision_history.len(),
                decision: decision.clone(),
            });
            result.decision = Some(decision);
        }

        CommandResult {
            message: result.message,
            success: true,
            state_changes: StateChanges::new(now, result.changes),
            needs_clarification: false,
            suggestions: Vec::new(),
            game_complete: result.game_complete,
            failure: None,
            decision: result.decision,
        }
    }
}

fn enter(stage: Stage, command: &str) {
    tracing::debug!(?stage, command, "command stage");
}
