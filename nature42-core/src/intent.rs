//! Turning raw player text into an [`Intent`].
//!
//! A handful of fixed commands are recognised locally; everything else is
//! interpreted by the oracle and then checked against what is actually in
//! front of the player. The parser never fails: bad input becomes an invalid
//! intent with a reason, and an unreachable oracle fails closed the same way.

use serde::{Deserialize, Serialize};

use crate::matching::{self, DoorReference, Match};
use crate::oracle::{Interpretation, OracleError, OracleHandle};
use crate::state::{DoorNumber, GameState};

/// Every kind of action the engine can carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Move,
    Take,
    Drop,
    Inventory,
    Use,
    Examine,
    OpenDoor,
    RetrieveKey,
    InsertKey,
    Talk,
    Hint,
    Attempt,
    Help,
}

impl Action {
    pub const ALL: [Action; 13] = [
        Action::Move,
        Action::Take,
        Action::Drop,
        Action::Inventory,
        Action::Use,
        Action::Examine,
        Action::OpenDoor,
        Action::RetrieveKey,
        Action::InsertKey,
        Action::Talk,
        Action::Hint,
        Action::Attempt,
        Action::Help,
    ];

    /// Map a verb (or the oracle's action label) onto an action kind.
    pub fn from_verb(verb: &str) -> Option<Action> {
        let verb = verb.trim().to_lowercase().replace(['_', '-'], " ");
        let action = match verb.as_str() {
            "move" | "go" | "walk" | "travel" | "enter" | "head" | "run" | "climb" | "return"
            | "leave" | "follow" => Action::Move,
            "take" | "get" | "grab" | "pick" | "pick up" | "collect" | "pocket" => Action::Take,
            "drop" | "discard" | "put down" | "set down" => Action::Drop,
            "inventory" | "inv" | "i" | "items" | "check inventory" => Action::Inventory,
            "use" | "apply" | "wield" | "activate" => Action::Use,
            "examine" | "look" | "look at" | "inspect" | "read" | "x" | "search" | "study"
            | "look around" => Action::Examine,
            "open" | "open door" => Action::OpenDoor,
            "retrieve" | "retrieve key" | "claim" => Action::RetrieveKey,
            "insert" | "insert key" | "unlock" => Action::InsertKey,
            "talk" | "talk to" | "speak" | "speak to" | "ask" | "greet" | "chat" => Action::Talk,
            "hint" | "clue" | "stuck" => Action::Hint,
            "solve" | "answer" | "say" | "try" | "attempt" | "attempt puzzle" => Action::Attempt,
            "help" | "?" | "commands" => Action::Help,
            _ => return None,
        };
        Some(action)
    }

    /// Verb phrase used when describing what the player did.
    pub fn verb(self) -> &'static str {
        match self {
            Action::Move => "go",
            Action::Take => "take",
            Action::Drop => "drop",
            Action::Inventory => "check inventory",
            Action::Use => "use",
            Action::Examine => "examine",
            Action::OpenDoor => "open",
            Action::RetrieveKey => "retrieve",
            Action::InsertKey => "insert",
            Action::Talk => "talk to",
            Action::Hint => "ask for a hint",
            Action::Attempt => "try",
            Action::Help => "ask for help",
        }
    }

    /// Whether this kind of action can ever end up in the decision history.
    ///
    /// Taking can retrieve a key and talking can be a major exchange, so
    /// both count; movement, looking, dropping and asking never do.
    pub fn may_be_significant(self) -> bool {
        matches!(
            self,
            Action::OpenDoor
                | Action::RetrieveKey
                | Action::InsertKey
                | Action::Take
                | Action::Use
                | Action::Attempt
                | Action::Talk
        )
    }

    /// Actions that operate on an item or NPC by name.
    fn names_a_thing(self) -> bool {
        matches!(
            self,
            Action::Take | Action::Drop | Action::Use | Action::Examine | Action::Talk
        )
    }
}

/// Structured reading of one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: Option<Action>,
    pub target: Option<String>,
    pub is_ambiguous: bool,
    pub is_invalid: bool,
    pub clarification_prompt: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Set when the command could not be read because the oracle failed.
    #[serde(skip)]
    pub oracle_error: Option<OracleError>,
    pub raw: String,
}

impl Intent {
    pub fn new(action: Action, target: Option<String>, raw: impl Into<String>) -> Self {
        Self {
            action: Some(action),
            target,
            is_ambiguous: false,
            is_invalid: false,
            clarification_prompt: None,
            reason: None,
            suggestions: Vec::new(),
            oracle_error: None,
            raw: raw.into(),
        }
    }

    pub fn invalid(raw: impl Into<String>, reason: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            action: None,
            target: None,
            is_ambiguous: false,
            is_invalid: true,
            clarification_prompt: None,
            reason: Some(reason.into()),
            suggestions,
            oracle_error: None,
            raw: raw.into(),
        }
    }

    pub fn ambiguous(
        raw: impl Into<String>,
        action: Option<Action>,
        target: Option<String>,
        candidates: &[String],
    ) -> Self {
        Self {
            action,
            target,
            is_ambiguous: true,
            is_invalid: false,
            clarification_prompt: Some(clarification_prompt(candidates)),
            reason: None,
            suggestions: candidates.to_vec(),
            oracle_error: None,
            raw: raw.into(),
        }
    }

    pub fn target_str(&self) -> &str {
        self.target.as_deref().unwrap_or("")
    }
}

fn clarification_prompt(candidates: &[String]) -> String {
    match candidates {
        [] => "Could you be more specific?".to_string(),
        [only] => format!("Did you mean {only}?"),
        [init @ .., last] => format!("Which do you mean: {} or {last}?", init.join(", ")),
    }
}

/// What the parser and oracle get to see of the current state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextDigest {
    pub location_id: String,
    pub location_description: String,
    pub exits: Vec<String>,
    pub items: Vec<String>,
    pub npcs: Vec<String>,
    pub inventory: Vec<String>,
    pub current_door: Option<DoorNumber>,
    pub keys_collected: Vec<DoorNumber>,
    pub keys_inserted: usize,
    pub in_hub: bool,
    pub vault_open: bool,
}

impl ContextDigest {
    pub fn from_state(state: &GameState) -> Self {
        let location = state.current_location();
        Self {
            location_id: state.player_location.clone(),
            location_description: location.map(|l| l.description.clone()).unwrap_or_default(),
            exits: location.map(|l| l.exits.clone()).unwrap_or_default(),
            items: location.map(|l| l.item_names()).unwrap_or_default(),
            npcs: location.map(|l| l.npcs.clone()).unwrap_or_default(),
            inventory: state.inventory_names(),
            current_door: state.current_door,
            keys_collected: state.keys_collected.clone(),
            keys_inserted: state.keys_inserted.len(),
            in_hub: state.is_in_hub(),
            vault_open: state.is_vault_open(),
        }
    }

    /// Compact text form for prompts.
    pub fn render(&self) -> String {
        let list = |v: &[String]| {
            if v.is_empty() {
                "none".to_string()
            } else {
                v.join(", ")
            }
        };
        let keys: Vec<String> = self.keys_collected.iter().map(|d| d.to_string()).collect();
        format!(
            "Location: {}\nExits: {}\nItems here: {}\nCharacters here: {}\nCarrying: {}\nKeys collected: {}\nKeys in vault: {}",
            self.location_id,
            list(&self.exits),
            list(&self.items),
            list(&self.npcs),
            list(&self.inventory),
            list(&keys),
            self.keys_inserted,
        )
    }

    /// Commands worth suggesting after a failed parse.
    pub fn suggestions(&self) -> Vec<String> {
        if self.in_hub {
            vec![
                "open door 1".to_string(),
                "examine vault".to_string(),
                "help".to_string(),
            ]
        } else {
            let mut out = vec!["look around".to_string()];
            if let Some(exit) = self.exits.first() {
                out.push(format!("go {exit}"));
            }
            out.push("hint".to_string());
            out
        }
    }
}

/// Minimum oracle confidence before an unknown verb is treated as a creative action.
const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Reads commands, delegating interpretation to the oracle.
#[derive(Clone)]
pub struct IntentParser {
    oracle: OracleHandle,
    min_confidence: f32,
}

impl IntentParser {
    pub fn new(oracle: OracleHandle) -> Self {
        Self {
            oracle,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Parse one command. Always returns an intent.
    pub async fn parse(&self, text: &str, digest: &ContextDigest) -> Intent {
        let raw = text.trim();
        if raw.is_empty() {
            return Intent::invalid(
                raw,
                "You pause, unsure what to do. Try typing a command.",
                digest.suggestions(),
            );
        }

        if let Some(intent) = parse_fixed(raw) {
            return intent;
        }

        match self.oracle.interpret_command(raw, digest).await {
            Ok(interpretation) => self.resolve(interpretation, digest, raw),
            Err(err) => {
                tracing::warn!(command = raw, error = %err, "could not interpret command");
                let mut intent = Intent::invalid(
                    raw,
                    "The world seems hazy for a moment and your meaning is lost. Please try again.",
                    digest.suggestions(),
                );
                intent.oracle_error = Some(err);
                intent
            }
        }
    }

    fn resolve(&self, interpretation: Interpretation, digest: &ContextDigest, raw: &str) -> Intent {
        if interpretation.candidates.len() >= 2 {
            return Intent::ambiguous(raw, None, None, &interpretation.candidates);
        }

        let target = interpretation
            .target
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let action = match Action::from_verb(&interpretation.action) {
            Some(action) => action,
            None if interpretation.confidence >= self.min_confidence => Action::Attempt,
            None => {
                return Intent::invalid(
                    raw,
                    format!("I'm not sure what you mean by \"{raw}\"."),
                    digest.suggestions(),
                )
            }
        };

        if interpretation.confidence < self.min_confidence && action != Action::Attempt {
            return Intent::invalid(
                raw,
                format!("I'm not sure what you mean by \"{raw}\"."),
                digest.suggestions(),
            );
        }

        let (action, target) = refine(action, target, digest, raw);

        if action.names_a_thing() {
            if let Some(query) = target.as_deref() {
                if let Some(candidates) = local_ambiguity(action, query, digest) {
                    return Intent::ambiguous(raw, Some(action), target, &candidates);
                }
            }
        }

        Intent::new(action, target, raw)
    }
}

/// Commands that never need the oracle.
pub fn parse_fixed(raw: &str) -> Option<Intent> {
    let lowered = matching::normalize(raw);
    let lowered = if lowered.is_empty() { raw.trim().to_lowercase() } else { lowered };
    let (action, target) = match lowered.as_str() {
        "help" | "?" | "commands" => (Action::Help, None),
        "inventory" | "inv" | "i" | "items" | "check inventory" => (Action::Inventory, None),
        "look" | "look around" | "l" | "examine area" => (Action::Examine, None),
        "hint" | "clue" | "give me a hint" => (Action::Hint, None),
        "back" | "go back" | "return" => (Action::Move, Some("back".to_string())),
        _ => return None,
    };
    Some(Intent::new(action, target, raw))
}

fn refine(
    action: Action,
    target: Option<String>,
    digest: &ContextDigest,
    raw: &str,
) -> (Action, Option<String>) {
    let Some(t) = target.as_deref() else {
        return (action, target);
    };
    let door_ref = matching::parse_door_number(t);
    let about_door = matching::mentions_door(t);

    match (action, door_ref) {
        (Action::Move, Ok(door)) if digest.in_hub && about_door => {
            (Action::OpenDoor, Some(format!("door {door}")))
        }
        (Action::OpenDoor, Ok(door)) => (Action::OpenDoor, Some(format!("door {door}"))),
        (Action::OpenDoor, Err(DoorReference::Missing)) if !about_door => {
            if t.to_lowercase().contains("vault") {
                (Action::InsertKey, None)
            } else {
                (Action::Attempt, Some(raw.to_string()))
            }
        }
        _ => (action, target),
    }
}

fn local_ambiguity(action: Action, query: &str, digest: &ContextDigest) -> Option<Vec<String>> {
    let pool: Vec<String> = match action {
        Action::Take => digest.items.clone(),
        Action::Drop | Action::Use => digest.inventory.clone(),
        Action::Talk => digest.npcs.clone(),
        Action::Examine => digest
            .items
            .iter()
            .chain(&digest.inventory)
            .chain(&digest.npcs)
            .cloned()
            .collect(),
        _ => return None,
    };
    match matching::find_name(query, &pool) {
        Match::Many(found) => {
            let mut names: Vec<String> = found.into_iter().cloned().collect();
            names.dedup();
            (names.len() > 1).then_some(names)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;
    use std::sync::Arc;
    use std::time::Duration;

    fn parser(oracle: Arc<ScriptedOracle>) -> IntentParser {
        IntentParser::new(OracleHandle::new(oracle, Duration::from_secs(5)))
    }

    fn hub_digest() -> ContextDigest {
        ContextDigest::from_state(&GameState::new_game())
    }

    #[test]
    fn test_verb_synonyms() {
        assert_eq!(Action::from_verb("grab"), Some(Action::Take));
        assert_eq!(Action::from_verb("Pick_Up"), Some(Action::Take));
        assert_eq!(Action::from_verb("look at"), Some(Action::Examine));
        assert_eq!(Action::from_verb("insert_key"), Some(Action::InsertKey));
        assert_eq!(Action::from_verb("juggle"), None);
    }

    #[test]
    fn test_significance_of_kinds() {
        assert!(Action::OpenDoor.may_be_significant());
        assert!(Action::InsertKey.may_be_significant());
        assert!(!Action::Move.may_be_significant());
        assert!(!Action::Examine.may_be_significant());
        assert!(!Action::Help.may_be_significant());
    }

    #[test]
    fn test_clarification_prompt_lists_candidates() {
        let prompt = clarification_prompt(&["red apple".into(), "green apple".into()]);
        assert_eq!(prompt, "Which do you mean: red apple or green apple?");
    }

    #[tokio::test]
    async fn test_fixed_commands_skip_oracle() {
        let oracle = Arc::new(ScriptedOracle::new());
        let p = parser(oracle.clone());

        let intent = p.parse("help", &hub_digest()).await;
        assert_eq!(intent.action, Some(Action::Help));
        let intent = p.parse("  Look around ", &hub_digest()).await;
        assert_eq!(intent.action, Some(Action::Examine));
        assert!(intent.target.is_none());

        assert_eq!(oracle.calls().interpret, 0);
    }

    #[tokio::test]
    async fn test_go_to_door_in_hub_becomes_open_door() {
        let p = parser(Arc::new(ScriptedOracle::new()));
        let intent = p.parse("go through door three", &hub_digest()).await;
        assert_eq!(intent.action, Some(Action::OpenDoor));
        assert!(!intent.is_invalid);
    }

    #[tokio::test]
    async fn test_open_vault_means_insert() {
        let p = parser(Arc::new(ScriptedOracle::new()));
        let intent = p.parse("open the vault", &hub_digest()).await;
        assert_eq!(intent.action, Some(Action::InsertKey));
    }

    #[tokio::test]
    async fn test_oracle_failure_fails_closed() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.set_unavailable(true);
        let p = parser(oracle);

        let intent = p.parse("take lamp", &hub_digest()).await;
        assert!(intent.is_invalid);
        assert!(intent.oracle_error.as_ref().is_some_and(OracleError::is_transient));
        assert!(intent.reason.unwrap().contains("try again"));
    }

    #[tokio::test]
    async fn test_overlapping_item_names_are_ambiguous() {
        let p = parser(Arc::new(ScriptedOracle::new()));
        let mut digest = hub_digest();
        digest.items = vec!["red apple".to_string(), "green apple".to_string()];

        let intent = p.parse("take apple", &digest).await;
        assert!(intent.is_ambiguous);
        let prompt = intent.clarification_prompt.unwrap();
        assert!(prompt.contains("red apple"));
        assert!(prompt.contains("green apple"));
    }

    #[tokio::test]
    async fn test_oracle_candidates_are_ambiguous() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_interpretation(Interpretation {
            action: "use".to_string(),
            target: Some("it".to_string()),
            confidence: 0.4,
            candidates: vec!["use the rope".to_string(), "use the lamp".to_string()],
        });
        let intent = parser(oracle).parse("use it", &hub_digest()).await;
        assert!(intent.is_ambiguous);
        assert!(intent.clarification_prompt.is_some());
    }

    #[tokio::test]
    async fn test_gibberish_is_invalid_with_suggestions() {
        let intent = parser(Arc::new(ScriptedOracle::new()))
            .parse("flurble wibble", &hub_digest())
            .await;
        assert!(intent.is_invalid);
        assert!(intent.reason.is_some());
        assert!(!intent.suggestions.is_empty());
    }
}
