//! State deltas.
//!
//! Handlers never touch a [`GameState`]; they describe what should change as
//! a list of [`StateChange`]s and the caller applies them. Every change is
//! idempotent: applying the same list twice leaves the state exactly as
//! applying it once. Append-only collections carry the index the entry is
//! expected to land at, so a replay is recognised and skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{
    Decision, DoorNumber, GameState, Interaction, Item, LocationData, PuzzleState,
};

/// A single named change to the game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateChange {
    PlayerMoved {
        location_id: String,
    },
    CurrentDoorSet {
        door: Option<DoorNumber>,
    },
    /// Adds a location if its id is new. Known locations are never overwritten.
    LocationDiscovered {
        location: LocationData,
    },
    ItemTaken {
        location_id: String,
        item: Item,
    },
    ItemDropped {
        location_id: String,
        item: Item,
    },
    /// An item appears in a location without leaving the inventory.
    ItemPlaced {
        location_id: String,
        item: Item,
    },
    KeyRetrieved {
        door: DoorNumber,
    },
    /// Removes the door's key from the inventory and seats it in the vault.
    KeyInserted {
        door: DoorNumber,
    },
    VaultOpened {
        at: DateTime<Utc>,
    },
    PuzzleRegistered {
        puzzle: PuzzleState,
    },
    PuzzleAttempted {
        puzzle_id: String,
        index: usize,
        attempt: String,
    },
    PuzzleSolved {
        puzzle_id: String,
    },
    /// Raises the hint counter to at least `hints_given`.
    HintGiven {
        puzzle_id: String,
        hints_given: u32,
    },
    InteractionRecorded {
        index: usize,
        interaction: Interaction,
    },
    DecisionRecorded {
        index: usize,
        decision: Decision,
    },
}

/// Changes produced by one command, stamped with the time they were made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChanges {
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<StateChange>,
}

impl StateChanges {
    pub fn new(timestamp: DateTime<Utc>, changes: Vec<StateChange>) -> Self {
        Self { timestamp, changes }
    }

    pub fn none(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateChange> {
        self.changes.iter()
    }
}

/// Apply a batch of changes and advance `last_updated`.
pub fn apply_changes(state: &mut GameState, changes: &StateChanges) {
    for change in &changes.changes {
        apply_change(state, change);
    }
    if changes.timestamp > state.last_updated {
        state.last_updated = changes.timestamp;
    }
}

/// Apply one change.
pub fn apply_change(state: &mut GameState, change: &StateChange) {
    match change {
        StateChange::PlayerMoved { location_id } => {
            state.player_location = location_id.clone();
        }
        StateChange::CurrentDoorSet { door } => {
            state.current_door = *door;
        }
        StateChange::LocationDiscovered { location } => {
            state
                .visited_locations
                .entry(location.id.clone())
                .or_insert_with(|| location.clone());
        }
        StateChange::ItemTaken { location_id, item } => {
            if let Some(location) = state.visited_locations.get_mut(location_id) {
                location.items.retain(|i| i.id != item.id);
            }
            if !state.inventory.iter().any(|i| i.id == item.id) {
                state.inventory.push(item.clone());
            }
        }
        StateChange::ItemDropped { location_id, item } => {
            state.inventory.retain(|i| i.id != item.id);
            place_item(state, location_id, item);
        }
        StateChange::ItemPlaced { location_id, item } => {
            place_item(state, location_id, item);
        }
        StateChange::KeyRetrieved { door } => {
            collect_key(state, *door);
        }
        StateChange::KeyInserted { door } => {
            state.inventory.retain(|i| i.key_door() != Some(*door));
            collect_key(state, *door);
            if !state.keys_inserted.contains(door) {
                state.keys_inserted.push(*door);
            }
        }
        StateChange::VaultOpened { at } => {
            if state.vault_opened_at.is_none() {
                state.vault_opened_at = Some(*at);
            }
        }
        StateChange::PuzzleRegistered { puzzle } => {
            state
                .puzzle_states
                .entry(puzzle.id.clone())
                .or_insert_with(|| puzzle.clone());
        }
        StateChange::PuzzleAttempted {
            puzzle_id,
            index,
            attempt,
        } => {
            if let Some(puzzle) = state.puzzle_states.get_mut(puzzle_id) {
                append_at(&mut puzzle.attempts, *index, attempt);
            }
        }
        StateChange::PuzzleSolved { puzzle_id } => {
            if let Some(puzzle) = state.puzzle_states.get_mut(puzzle_id) {
                puzzle.solved = true;
            }
        }
        StateChange::HintGiven {
            puzzle_id,
            hints_given,
        } => {
            if let Some(puzzle) = state.puzzle_states.get_mut(puzzle_id) {
                puzzle.hints_given = puzzle.hints_given.max(*hints_given);
            }
        }
        StateChange::InteractionRecorded { index, interaction } => {
            let log = state
                .npc_interactions
                .entry(interaction.npc_id.clone())
                .or_default();
            append_at(log, *index, interaction);
        }
        StateChange::DecisionRecorded { index, decision } => {
            append_at(&mut state.decision_history, *index, decision);
        }
    }
}

fn place_item(state: &mut GameState, location_id: &str, item: &Item) {
    match state.visited_locations.get_mut(location_id) {
        Some(location) => {
            if !location.items.iter().any(|i| i.id == item.id) {
                location.items.push(item.clone());
            }
        }
        None => tracing::warn!(location_id, item = %item.id, "item placed in unknown location"),
    }
}

fn collect_key(state: &mut GameState, door: DoorNumber) {
    if !state.keys_collected.contains(&door) {
        state.keys_collected.push(door);
    }
}

/// Push `value` only if it would land at `index`. Replays find the slot
/// already taken and do nothing.
fn append_at<T: Clone>(list: &mut Vec<T>, index: usize, value: &T) {
    if list.len() == index {
        list.push(value.clone());
    } else if list.len() < index {
        tracing::warn!(index, len = list.len(), "skipping out-of-order append");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::HUB_LOCATION_ID;

    fn door(n: u8) -> DoorNumber {
        DoorNumber::new(n).unwrap()
    }

    fn apply_twice(state: &mut GameState, changes: &StateChanges) {
        apply_changes(state, changes);
        apply_changes(state, changes);
    }

    #[test]
    fn test_take_is_idempotent() {
        let mut state = GameState::new_game();
        let lamp = Item::new("lamp", "Lamp", "A lamp");
        state
            .visited_locations
            .get_mut(HUB_LOCATION_ID)
            .unwrap()
            .items
            .push(lamp.clone());

        let changes = StateChanges::new(
            Utc::now(),
            vec![StateChange::ItemTaken {
                location_id: HUB_LOCATION_ID.to_string(),
                item: lamp,
            }],
        );
        apply_twice(&mut state, &changes);

        assert_eq!(state.inventory.len(), 1);
        assert!(state.current_location().unwrap().items.is_empty());
    }

    #[test]
    fn test_key_insert_is_idempotent() {
        let mut state = GameState::new_game();
        state.inventory.push(Item::key(door(2)));
        state.keys_collected.push(door(2));

        let changes = StateChanges::new(
            Utc::now(),
            vec![StateChange::KeyInserted { door: door(2) }],
        );
        apply_twice(&mut state, &changes);

        assert_eq!(state.keys_inserted, vec![door(2)]);
        assert_eq!(state.keys_collected, vec![door(2)]);
        assert!(state.inventory.is_empty());
    }

    #[test]
    fn test_decision_replay_does_not_duplicate() {
        let mut state = GameState::new_game();
        let decision = Decision {
            timestamp: Utc::now(),
            location_id: HUB_LOCATION_ID.to_string(),
            description: "Player chose to open door 1".to_string(),
            consequences: vec![],
        };
        let changes = StateChanges::new(
            Utc::now(),
            vec![StateChange::DecisionRecorded { index: 0, decision }],
        );
        apply_twice(&mut state, &changes);
        assert_eq!(state.decision_history.len(), 1);
    }

    #[test]
    fn test_discovered_location_is_never_overwritten() {
        let mut state = GameState::new_game();
        let mut fake_hub = state.current_location().unwrap().clone();
        fake_hub.description = "rewritten".to_string();

        apply_change(
            &mut state,
            &StateChange::LocationDiscovered { location: fake_hub },
        );
        assert_ne!(state.current_location().unwrap().description, "rewritten");
    }

    #[test]
    fn test_vault_opens_once() {
        let mut state = GameState::new_game();
        let first = Utc::now();
        apply_change(&mut state, &StateChange::VaultOpened { at: first });
        apply_change(
            &mut state,
            &StateChange::VaultOpened {
                at: first + chrono::Duration::seconds(5),
            },
        );
        assert_eq!(state.vault_opened_at, Some(first));
    }

    #[test]
    fn test_last_updated_is_monotonic() {
        let mut state = GameState::new_game();
        let later = state.last_updated + chrono::Duration::seconds(10);
        apply_changes(&mut state, &StateChanges::none(later));
        let earlier = state.game_started_at;
        apply_changes(&mut state, &StateChanges::none(earlier));
        assert_eq!(state.last_updated, later);
    }

    #[test]
    fn test_changes_serialize_with_kind_tag() {
        let change = StateChange::KeyRetrieved { door: door(4) };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["kind"], "key_retrieved");
        assert_eq!(json["door"], 4);
    }
}
