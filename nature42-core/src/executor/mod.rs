//! Carrying out validated intents.
//!
//! One handler per action kind. Handlers read the state snapshot, may call
//! the oracle, and describe their outcome as an [`ActionResult`] holding the
//! player-facing message and the [`StateChange`]s to apply. Nothing here
//! mutates the state.

mod dialogue;
mod doors;
mod examine;
mod inventory;
mod movement;
mod puzzle;

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::decisions::recent_decisions;
use crate::difficulty::DifficultyTable;
use crate::effects::StateChange;
use crate::fallback;
use crate::hub;
use crate::intent::{Action, Intent};
use crate::matching;
use crate::oracle::{LocationDraft, OracleError, OracleHandle};
use crate::orchestrator::FailureKind;
use crate::state::{Decision, DoorNumber, GameState, Item, LocationData};
use crate::validate::ValidationResult;

/// Progress events that make an action worth remembering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Milestone {
    EnteredDoor(DoorNumber),
    RetrievedKey(DoorNumber),
    InsertedKey(DoorNumber),
    VaultOpened,
    SolvedPuzzle(String),
}

impl Milestone {
    pub fn describe(&self) -> String {
        match self {
            Milestone::EnteredDoor(door) => format!("Entered world behind door {door}"),
            Milestone::RetrievedKey(door) => format!("Retrieved key {door}"),
            Milestone::InsertedKey(door) => format!("Inserted key {door} into vault"),
            Milestone::VaultOpened => "Opened the vault and completed the game".to_string(),
            Milestone::SolvedPuzzle(_) => "Solved a puzzle".to_string(),
        }
    }
}

/// Outcome of executing one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub changes: Vec<StateChange>,
    pub milestones: Vec<Milestone>,
    pub game_complete: bool,
    /// Set when the oracle flags an NPC exchange as a turning point.
    pub major_interaction: bool,
    pub failure: Option<FailureKind>,
    /// Filled in by the orchestrator when the action is significant.
    pub decision: Option<Decision>,
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            changes: Vec::new(),
            milestones: Vec::new(),
            game_complete: false,
            major_interaction: false,
            failure: None,
            decision: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            failure: Some(FailureKind::NotAllowed),
            ..Self::success(message)
        }
    }

    /// The oracle was needed and could not deliver; nothing changes.
    pub fn oracle_failed(message: impl Into<String>, err: &OracleError) -> Self {
        Self {
            success: false,
            failure: Some(FailureKind::from_oracle(err)),
            ..Self::success(message)
        }
    }

    pub fn with_change(mut self, change: StateChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn with_milestone(mut self, milestone: Milestone) -> Self {
        self.milestones.push(milestone);
        self
    }
}

/// Runs handlers against a state snapshot.
#[derive(Clone)]
pub struct ActionExecutor {
    oracle: OracleHandle,
    difficulty: Arc<DifficultyTable>,
    history_window: usize,
}

impl ActionExecutor {
    pub fn new(oracle: OracleHandle, difficulty: Arc<DifficultyTable>, history_window: usize) -> Self {
        Self {
            oracle,
            difficulty,
            history_window,
        }
    }

    pub fn difficulty(&self) -> &DifficultyTable {
        &self.difficulty
    }

    /// Execute a validated intent.
    pub async fn execute(
        &self,
        intent: &Intent,
        validation: &ValidationResult,
        state: &GameState,
        now: DateTime<Utc>,
    ) -> ActionResult {
        let Some(action) = intent.action else {
            return ActionResult::failure("I don't understand that.");
        };
        let target = intent.target.as_deref().unwrap_or("").trim();
        let note = validation.note.as_deref();

        match action {
            Action::Move => self.handle_move(target, state, now).await,
            Action::Take => self.handle_take(target, state),
            Action::Drop => self.handle_drop(target, state),
            Action::Inventory => self.handle_inventory(state),
            Action::Use => self.handle_use(target, &intent.raw, note, state).await,
            Action::Examine => self.handle_examine(target, note, state),
            Action::OpenDoor => self.handle_open_door(target, state, now).await,
            Action::RetrieveKey => self.handle_retrieve_key(state),
            Action::InsertKey => self.handle_insert_key(target, state, now),
            Action::Talk => self.handle_talk(target, &intent.raw, state, now).await,
            Action::Hint => self.handle_hint(state).await,
            Action::Attempt => self.handle_attempt(&intent.raw, note, state).await,
            Action::Help => ActionResult::success(hub::HELP_TEXT),
        }
    }

    fn player_history(&self, state: &GameState) -> Vec<Decision> {
        recent_decisions(&state.decision_history, self.history_window)
    }

    /// Generate an image reference, falling back to the placeholder.
    async fn image_for(&self, description: &str) -> String {
        match self.oracle.generate_location_image(description).await {
            Ok(image) if !image.trim().is_empty() => image,
            _ => fallback::PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

/// Turn an oracle draft into a location the state can hold.
///
/// Assigns ids and ownership, pads exits, normalizes key flags and drops any
/// key that would duplicate one already in play.
pub(crate) fn finalize_location(
    draft: LocationDraft,
    id: &str,
    door: DoorNumber,
    image_ref: Option<String>,
    state: &GameState,
    now: DateTime<Utc>,
) -> LocationData {
    let mut exits: Vec<String> = Vec::new();
    for exit in draft.exits {
        let exit = exit.trim().to_string();
        if !exit.is_empty() && !exits.iter().any(|e| e.eq_ignore_ascii_case(&exit)) {
            exits.push(exit);
        }
    }
    for filler in fallback::DEFAULT_EXITS {
        if exits.len() >= 2 {
            break;
        }
        if !exits.iter().any(|e| e.eq_ignore_ascii_case(filler)) {
            exits.push(filler.to_string());
        }
    }

    let mut items: Vec<Item> = Vec::new();
    let mut ids: HashSet<String> = state.inventory.iter().map(|i| i.id.clone()).collect();
    let mut key_placed = false;
    for mut item in draft.items {
        if item.name.trim().is_empty() {
            continue;
        }
        if item.is_key || item.door_number.is_some() {
            if key_placed || state.key_exists(door) {
                continue;
            }
            key_placed = true;
            item = Item {
                properties: item.properties,
                ..Item::key(door)
            };
        } else {
            let base = format!("{id}:{}", matching::slug(&item.name));
            let mut candidate = base.clone();
            let mut n = 2;
            while ids.contains(&candidate) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            item.id = candidate;
            item.door_number = None;
        }
        ids.insert(item.id.clone());
        items.push(item);
    }

    let mut npcs: Vec<String> = Vec::new();
    for npc in draft.npcs {
        let npc = npc.trim().to_string();
        if !npc.is_empty() && !npcs.contains(&npc) {
            npcs.push(npc);
        }
    }

    LocationData {
        id: id.to_string(),
        description: draft.description.trim().to_string(),
        image_ref,
        exits,
        items,
        npcs,
        generated_at: now,
        door: Some(door),
    }
}

/// Player-facing text for a location.
pub(crate) fn describe_location(location: &LocationData) -> String {
    let mut text = location.description.clone();
    if !location.items.is_empty() {
        text.push_str(&format!("\n\nYou can see: {}", location.item_names().join(", ")));
    }
    if !location.npcs.is_empty() {
        text.push_str(&format!("\nHere with you: {}", location.npcs.join(", ")));
    }
    if !location.exits.is_empty() {
        text.push_str(&format!("\nExits: {}", location.exits.join(", ")));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn door(n: u8) -> DoorNumber {
        DoorNumber::new(n).unwrap()
    }

    fn draft() -> LocationDraft {
        LocationDraft {
            description: "  A mossy hollow.  ".to_string(),
            exits: vec!["North".to_string(), "north".to_string()],
            items: vec![
                Item::new("", "old rope", "Frayed"),
                Item::new("", "old rope", "Another one"),
                Item {
                    is_key: true,
                    ..Item::new("whatever", "shiny key", "Glints")
                },
            ],
            npcs: vec!["Fox".to_string(), " Fox ".to_string(), String::new()],
        }
    }

    #[test]
    fn test_finalize_pads_exits_and_dedupes() {
        let state = GameState::new_game();
        let location = finalize_location(draft(), "door_1_entrance", door(1), None, &state, Utc::now());

        assert_eq!(location.description, "A mossy hollow.");
        assert_eq!(location.exits, vec!["North", "onward"]);
        assert_eq!(location.npcs, vec!["Fox"]);
        assert_eq!(location.door, Some(door(1)));
    }

    #[test]
    fn test_finalize_assigns_unique_ids_and_normalizes_keys() {
        let state = GameState::new_game();
        let location = finalize_location(draft(), "door_1_entrance", door(1), None, &state, Utc::now());

        let ids: Vec<&str> = location.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["door_1_entrance:old_rope", "door_1_entrance:old_rope_2", "key_1"]);
        assert_eq!(location.items[2].key_door(), Some(door(1)));
    }

    #[test]
    fn test_finalize_never_duplicates_a_collected_key() {
        let mut state = GameState::new_game();
        state.keys_collected.push(door(1));
        let location = finalize_location(draft(), "door_1_entrance", door(1), None, &state, Utc::now());
        assert!(location.items.iter().all(|i| !i.is_key));
    }

    #[test]
    fn test_milestone_descriptions() {
        assert_eq!(Milestone::RetrievedKey(door(2)).describe(), "Retrieved key 2");
        assert_eq!(
            Milestone::InsertedKey(door(6)).describe(),
            "Inserted key 6 into vault"
        );
    }
}
