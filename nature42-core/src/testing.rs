//! Testing utilities for the Nature42 engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedOracle`, a deterministic content oracle with no network
//! - `TestHarness` for playing scripted scenarios against a live state
//! - Assertion helpers for verifying progress

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::effects::apply_changes;
use crate::intent::{Action, ContextDigest, Intent};
use crate::matching;
use crate::oracle::{
    ContentOracle, DialogueRequest, HintRequest, Interpretation, JudgeContext, Judgment,
    LocationDraft, LocationRequest, NpcReply, OracleError, Puzzle, PuzzleRequest, PuzzleVerdict,
};
use crate::orchestrator::{CommandProcessor, CommandResult, FailureKind};
use crate::state::{DoorNumber, GameState, Item, PuzzleState, Sentiment};

/// Word that solves every scripted puzzle unless changed.
pub const DEFAULT_SOLUTION: &str = "kindness";

/// The oracle operations, for counting and selective failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleCall {
    Interpret,
    Judge,
    Location,
    Dialogue,
    Puzzle,
    Evaluate,
    Hint,
    Image,
}

/// How many times each oracle operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OracleCalls {
    pub interpret: usize,
    pub judge: usize,
    pub location: usize,
    pub dialogue: usize,
    pub puzzle: usize,
    pub evaluate: usize,
    pub hint: usize,
    pub image: usize,
}

impl OracleCalls {
    pub fn total(&self) -> usize {
        self.interpret
            + self.judge
            + self.location
            + self.dialogue
            + self.puzzle
            + self.evaluate
            + self.hint
            + self.image
    }

    fn bump(&mut self, call: OracleCall) {
        let counter = match call {
            OracleCall::Interpret => &mut self.interpret,
            OracleCall::Judge => &mut self.judge,
            OracleCall::Location => &mut self.location,
            OracleCall::Dialogue => &mut self.dialogue,
            OracleCall::Puzzle => &mut self.puzzle,
            OracleCall::Evaluate => &mut self.evaluate,
            OracleCall::Hint => &mut self.hint,
            OracleCall::Image => &mut self.image,
        };
        *counter += 1;
    }
}

#[derive(Debug, Default)]
struct Script {
    calls: OracleCalls,
    unavailable: bool,
    refusing: bool,
    failing: HashSet<OracleCall>,
    /// Fail this many more calls, then recover.
    failures_left: usize,
    interpretations: VecDeque<Interpretation>,
    denied: Vec<String>,
    major_dialogue: bool,
    solution: String,
    delay: Option<Duration>,
}

/// A content oracle that answers from simple rules.
///
/// Use this for deterministic tests without API calls. Commands are read
/// with a keyword interpreter; locations, puzzles and dialogue are canned;
/// every puzzle is solved by any attempt that mentions the solution word.
pub struct ScriptedOracle {
    script: Mutex<Script>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                solution: DEFAULT_SOLUTION.to_string(),
                ..Script::default()
            }),
        }
    }

    /// Delay every answer, for exercising timeouts.
    pub fn with_delay(delay: Duration) -> Self {
        let oracle = Self::new();
        oracle.script().delay = Some(delay);
        oracle
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Call counts so far.
    pub fn calls(&self) -> OracleCalls {
        self.script().calls
    }

    /// Fail every call while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.script().unavailable = unavailable;
    }

    /// Refuse every call while set, as a bad API key would.
    pub fn set_refusing(&self, refusing: bool) {
        self.script().refusing = refusing;
    }

    /// Fail every call of one kind.
    pub fn fail_call(&self, call: OracleCall) {
        self.script().failing.insert(call);
    }

    /// Fail the next `n` calls of any kind.
    pub fn fail_next(&self, n: usize) {
        self.script().failures_left = n;
    }

    /// Answer the next interpretation request with `interpretation`.
    pub fn queue_interpretation(&self, interpretation: Interpretation) {
        self.script().interpretations.push_back(interpretation);
    }

    /// Judge any action whose text contains `phrase` as impossible.
    pub fn deny_actions_containing(&self, phrase: impl Into<String>) {
        self.script().denied.push(phrase.into().to_lowercase());
    }

    /// Mark every NPC reply as a turning point.
    pub fn set_major_dialogue(&self, major: bool) {
        self.script().major_dialogue = major;
    }

    /// Change the word that solves puzzles.
    pub fn set_solution(&self, solution: impl Into<String>) {
        self.script().solution = solution.into().to_lowercase();
    }

    /// Count the call and decide whether it fails.
    async fn begin(&self, call: OracleCall) -> Result<(), OracleError> {
        let delay = {
            let mut script = self.script();
            script.calls.bump(call);
            script.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script();
        if script.refusing {
            return Err(OracleError::Rejected("scripted refusal".to_string()));
        }
        if script.failures_left > 0 {
            script.failures_left -= 1;
            return Err(OracleError::Unavailable("scripted failure".to_string()));
        }
        if script.unavailable || script.failing.contains(&call) {
            return Err(OracleError::Unavailable("scripted outage".to_string()));
        }
        Ok(())
    }
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

const STOP_WORDS: &[&str] = &[
    "up", "at", "to", "through", "into", "in", "with", "down", "on", "the", "a", "an",
];

/// Keyword reading of a command: verb (one or two words) plus the rest.
pub fn interpret_keywords(text: &str) -> Interpretation {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '?').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();

    let (verb, rest) = match words.as_slice() {
        [] => (String::new(), &words[..]),
        [first, second, rest @ ..] if Action::from_verb(&format!("{first} {second}")).is_some() => {
            (format!("{first} {second}"), rest)
        }
        [first, rest @ ..] => (first.clone(), rest),
    };

    let target_words: Vec<&str> = rest
        .iter()
        .map(String::as_str)
        .skip_while(|w| STOP_WORDS.contains(w))
        .collect();
    let target = (!target_words.is_empty()).then(|| target_words.join(" "));
    let confidence = if Action::from_verb(&verb).is_some() { 1.0 } else { 0.2 };

    Interpretation {
        action: verb,
        target,
        confidence,
        candidates: Vec::new(),
    }
}

#[async_trait]
impl ContentOracle for ScriptedOracle {
    async fn interpret_command(
        &self,
        text: &str,
        _digest: &ContextDigest,
    ) -> Result<Interpretation, OracleError> {
        self.begin(OracleCall::Interpret).await?;
        if let Some(queued) = self.script().interpretations.pop_front() {
            return Ok(queued);
        }
        Ok(interpret_keywords(text))
    }

    async fn judge_action(
        &self,
        intent: &Intent,
        _context: &JudgeContext,
    ) -> Result<Judgment, OracleError> {
        self.begin(OracleCall::Judge).await?;
        let raw = intent.raw.to_lowercase();
        let denied = self.script().denied.iter().any(|phrase| raw.contains(phrase));
        Ok(if denied {
            Judgment {
                allowed: false,
                reason: "That doesn't seem possible here.".to_string(),
            }
        } else {
            Judgment {
                allowed: true,
                reason: format!("You {}. The world quietly takes note.", intent.raw.trim()),
            }
        })
    }

    async fn generate_location(
        &self,
        request: &LocationRequest,
    ) -> Result<LocationDraft, OracleError> {
        self.begin(OracleCall::Location).await?;
        Ok(LocationDraft {
            description: format!(
                "Behind door {}, {} stretches out before you. ({})",
                request.door, request.theme, request.location_id
            ),
            exits: vec!["winding path".to_string(), "back".to_string()],
            items: vec![Item::new("", "glowing feather", "It drifts upward when released.")],
            npcs: vec!["Wise Owl".to_string()],
        })
    }

    async fn generate_npc_dialogue(
        &self,
        request: &DialogueRequest,
    ) -> Result<NpcReply, OracleError> {
        self.begin(OracleCall::Dialogue).await?;
        let major = self.script().major_dialogue;
        Ok(NpcReply {
            text: format!(
                "{} tilts their head. \"Small kindnesses open more than doors.\"",
                request.npc_id
            ),
            sentiment: Sentiment::Positive,
            major,
        })
    }

    async fn generate_puzzle(&self, request: &PuzzleRequest) -> Result<Puzzle, OracleError> {
        self.begin(OracleCall::Puzzle).await?;
        let solution = self.script().solution.clone();
        Ok(Puzzle {
            description: format!(
                "A stone guardian blocks the way to key {}. It asks what you would offer a stranger in need.",
                request.door
            ),
            solution_criteria: format!("The player offers {solution}"),
            reward: None,
        })
    }

    async fn evaluate_puzzle_attempt(
        &self,
        _puzzle: &PuzzleState,
        attempt: &str,
        _inventory: &[Item],
    ) -> Result<PuzzleVerdict, OracleError> {
        self.begin(OracleCall::Evaluate).await?;
        let solution = self.script().solution.clone();
        let solved = attempt.to_lowercase().contains(&solution);
        Ok(PuzzleVerdict {
            solved,
            feedback: if solved {
                "The guardian smiles and steps aside.".to_string()
            } else {
                "The guardian shakes its head slowly.".to_string()
            },
        })
    }

    async fn generate_hint(&self, request: &HintRequest) -> Result<String, OracleError> {
        self.begin(OracleCall::Hint).await?;
        let solution = self.script().solution.clone();
        Ok(format!(
            "Hint {}: think about {solution}.",
            request.previous_hints + 1
        ))
    }

    async fn generate_location_image(&self, description: &str) -> Result<String, OracleError> {
        self.begin(OracleCall::Image).await?;
        Ok(format!("scripted://{}", matching::slug(description)))
    }
}

// ============================================================================
// Test harness
// ============================================================================

/// Plays commands against a live state, applying every change.
pub struct TestHarness {
    pub oracle: Arc<ScriptedOracle>,
    pub processor: CommandProcessor,
    pub state: GameState,
}

impl TestHarness {
    /// A new game with a fresh scripted oracle.
    pub fn new() -> Self {
        Self::with_oracle(Arc::new(ScriptedOracle::new()))
    }

    pub fn with_oracle(oracle: Arc<ScriptedOracle>) -> Self {
        Self::with_config(oracle, EngineConfig::default())
    }

    pub fn with_config(oracle: Arc<ScriptedOracle>, config: EngineConfig) -> Self {
        let processor = CommandProcessor::new(oracle.clone(), config);
        Self {
            oracle,
            processor,
            state: GameState::new_game(),
        }
    }

    /// Send a command and apply whatever it changed.
    pub async fn input(&mut self, text: &str) -> CommandResult {
        let result = self.processor.process_command(text, &self.state).await;
        apply_changes(&mut self.state, &result.state_changes);
        result
    }

    /// Open a door, solve its puzzle, take the key and walk back.
    pub async fn clear_door(&mut self, door: u8) {
        let result = self.input(&format!("open door {door}")).await;
        assert_success(&result);
        let solution = self.oracle.script().solution.clone();
        if self.state.unsolved_puzzle_at(&self.state.player_location).is_some() {
            let result = self.input(&format!("try {solution}")).await;
            assert_success(&result);
        }
        let result = self.input(&format!("take key {door}")).await;
        assert_success(&result);
        let result = self.input("go back").await;
        assert_success(&result);
    }

    pub fn location_id(&self) -> &str {
        &self.state.player_location
    }

    pub fn keys_collected(&self) -> usize {
        self.state.keys_collected.len()
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.state
            .inventory
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(name))
    }

    pub fn has_key(&self, door: u8) -> bool {
        DoorNumber::new(door)
            .map(|d| self.state.inventory.iter().any(|i| i.key_door() == Some(d)))
            .unwrap_or(false)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that a command went through.
#[track_caller]
pub fn assert_success(result: &CommandResult) {
    assert!(
        result.success,
        "Expected success, got {:?}: {}",
        result.failure, result.message
    );
}

/// Assert that a command failed for the given reason and changed nothing.
#[track_caller]
pub fn assert_failure(result: &CommandResult, kind: FailureKind) {
    assert!(!result.success, "Expected failure, got success: {}", result.message);
    assert_eq!(result.failure, Some(kind), "Unexpected failure kind: {}", result.message);
    assert!(
        result.state_changes.is_empty(),
        "Expected no state changes on failure, got {:?}",
        result.state_changes.changes
    );
    assert!(!result.message.is_empty(), "Failure message must not be empty");
}

/// Assert the player stands at the given location.
#[track_caller]
pub fn assert_at(harness: &TestHarness, location_id: &str) {
    assert_eq!(
        harness.location_id(),
        location_id,
        "Expected player at '{location_id}'"
    );
}

/// Assert the number of keys collected.
#[track_caller]
pub fn assert_keys(harness: &TestHarness, count: usize) {
    assert_eq!(
        harness.keys_collected(),
        count,
        "Expected {count} keys collected, have {:?}",
        harness.state.keys_collected
    );
}

/// Assert the player carries an item with the given name.
#[track_caller]
pub fn assert_has_item(harness: &TestHarness, name: &str) {
    assert!(
        harness.has_item(name),
        "Expected '{name}' in inventory, have {:?}",
        harness.state.inventory_names()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_interpreter() {
        let read = interpret_keywords("Pick up the glowing feather");
        assert_eq!(read.action, "pick up");
        assert_eq!(read.target.as_deref(), Some("glowing feather"));
        assert_eq!(read.confidence, 1.0);

        let read = interpret_keywords("go through door three");
        assert_eq!(read.action, "go");
        assert_eq!(read.target.as_deref(), Some("door three"));

        let read = interpret_keywords("flurble wibble");
        assert!(read.confidence < 0.5);
    }

    #[tokio::test]
    async fn test_harness_applies_changes() {
        let mut harness = TestHarness::new();
        let result = harness.input("open door 1").await;
        assert_success(&result);
        assert_at(&harness, "door_1_entrance");
        assert_eq!(harness.state.current_door, DoorNumber::new(1).ok());
    }

    #[tokio::test]
    async fn test_clear_door_collects_key() {
        let mut harness = TestHarness::new();
        harness.clear_door(2).await;
        assert_keys(&harness, 1);
        assert!(harness.has_key(2));
        assert_at(&harness, "hub");
    }

    #[tokio::test]
    async fn test_selective_failure() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.fail_call(OracleCall::Image);
        let mut harness = TestHarness::with_oracle(oracle);
        assert_success(&harness.input("open door 3").await);
        let entrance = harness.state.current_location().unwrap();
        assert_eq!(entrance.image_ref.as_deref(), Some(crate::fallback::PLACEHOLDER_IMAGE));
    }
}
