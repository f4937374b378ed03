//! Game state for one Nature42 playthrough.
//!
//! [`GameState`] is the aggregate root: everything the engine knows about a
//! player's progress. The engine only ever reads it; mutations arrive as
//! [`StateChange`](crate::effects::StateChange) deltas applied by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::hub;

/// Location id of the forest clearing with the six doors and the vault.
pub const HUB_LOCATION_ID: &str = "hub";

/// Number of doors, keys and vault keyholes.
pub const DOOR_COUNT: u8 = 6;

// ============================================================================
// Door numbers
// ============================================================================

/// Error for a door number outside 1..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("door number must be between 1 and {DOOR_COUNT}, got {0}")]
pub struct DoorNumberError(pub i64);

/// One of the six numbered doors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DoorNumber(u8);

impl DoorNumber {
    pub fn new(n: u8) -> Result<Self, DoorNumberError> {
        if (1..=DOOR_COUNT).contains(&n) {
            Ok(Self(n))
        } else {
            Err(DoorNumberError(n as i64))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All doors in ascending order.
    pub fn all() -> impl Iterator<Item = DoorNumber> {
        (1..=DOOR_COUNT).map(DoorNumber)
    }

    /// Location id of the first location behind this door.
    pub fn entrance_id(self) -> String {
        format!("door_{}_entrance", self.0)
    }

    /// Item id of this door's key.
    pub fn key_id(self) -> String {
        format!("key_{}", self.0)
    }

    /// Puzzle id of the puzzle guarding this door's key.
    pub fn puzzle_id(self) -> String {
        format!("door_{}_puzzle", self.0)
    }
}

impl TryFrom<u8> for DoorNumber {
    type Error = DoorNumberError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl From<DoorNumber> for u8 {
    fn from(door: DoorNumber) -> u8 {
        door.0
    }
}

impl fmt::Display for DoorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Items, locations, interactions
// ============================================================================

/// A thing that can sit in a location or in the player's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub is_key: bool,
    /// Present iff `is_key`.
    #[serde(default)]
    pub door_number: Option<DoorNumber>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            is_key: false,
            door_number: None,
            properties: serde_json::Map::new(),
        }
    }

    /// The key that opens the vault keyhole for `door`.
    pub fn key(door: DoorNumber) -> Self {
        Self {
            id: door.key_id(),
            name: format!("Key {door}"),
            description: format!(
                "A small brass key stamped with the number {door}. It belongs in the vault."
            ),
            is_key: true,
            door_number: Some(door),
            properties: serde_json::Map::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// The door this item is a key for, if it is a well-formed key.
    pub fn key_door(&self) -> Option<DoorNumber> {
        if self.is_key {
            self.door_number
        } else {
            None
        }
    }
}

/// A place the player has been.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    pub exits: Vec<String>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub npcs: Vec<String>,
    pub generated_at: DateTime<Utc>,
    /// Door whose world contains this location; `None` for the hub.
    #[serde(default)]
    pub door: Option<DoorNumber>,
}

impl LocationData {
    pub fn is_hub(&self) -> bool {
        self.id == HUB_LOCATION_ID
    }

    pub fn item_names(&self) -> Vec<String> {
        self.items.iter().map(|i| i.name.clone()).collect()
    }
}

/// How an NPC felt about an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Lenient parse of an oracle-provided label.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "positive" | "friendly" | "warm" => Sentiment::Positive,
            "negative" | "hostile" | "cold" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

/// One exchange with an NPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub npc_id: String,
    pub player_action: String,
    pub npc_response: String,
    pub sentiment: Sentiment,
}

/// Progress on a single puzzle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzleState {
    pub id: String,
    pub description: String,
    pub solved: bool,
    #[serde(default)]
    pub attempts: Vec<String>,
    #[serde(default)]
    pub hints_given: u32,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub door: Option<DoorNumber>,
    /// What the oracle checks attempts against.
    #[serde(default)]
    pub solution_criteria: String,
    /// Placed in the puzzle's location once solved.
    #[serde(default)]
    pub reward: Option<Item>,
}

/// A significant choice the player made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub timestamp: DateTime<Utc>,
    pub location_id: String,
    pub description: String,
    pub consequences: Vec<String>,
}

// ============================================================================
// Game state
// ============================================================================

/// Invariant violations found by [`GameState::check_consistency`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("player location '{0}' has never been visited")]
    UnknownLocation(String),

    #[error("current door {current:?} does not match location '{location}' (door {actual:?})")]
    DoorMismatch {
        location: String,
        current: Option<DoorNumber>,
        actual: Option<DoorNumber>,
    },

    #[error("key {0} recorded more than once")]
    DuplicateKey(DoorNumber),

    #[error("key {0} is in the vault but was never collected")]
    InsertedKeyNotCollected(DoorNumber),

    #[error("item '{0}' appears more than once in the inventory")]
    DuplicateItem(String),

    #[error("item '{0}' has inconsistent key flags")]
    MalformedKeyItem(String),

    #[error("vault completion recorded with {0} keys inserted")]
    VaultWithoutKeys(usize),

    #[error("last update precedes game start")]
    TimestampOrder,
}

/// Everything known about one playthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub player_location: String,
    pub inventory: Vec<Item>,
    /// Doors whose keys have been retrieved, in retrieval order.
    pub keys_collected: Vec<DoorNumber>,
    /// Doors whose keys are in the vault, in insertion order.
    #[serde(default)]
    pub keys_inserted: Vec<DoorNumber>,
    #[serde(default)]
    pub vault_opened_at: Option<DateTime<Utc>>,
    pub visited_locations: BTreeMap<String, LocationData>,
    #[serde(default)]
    pub npc_interactions: BTreeMap<String, Vec<Interaction>>,
    #[serde(default)]
    pub puzzle_states: BTreeMap<String, PuzzleState>,
    #[serde(default)]
    pub decision_history: Vec<Decision>,
    pub current_door: Option<DoorNumber>,
    pub game_started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl GameState {
    /// A fresh game with the player standing in the hub.
    pub fn new_game() -> Self {
        Self::new_game_at(Utc::now())
    }

    pub fn new_game_at(now: DateTime<Utc>) -> Self {
        let hub = hub::hub_location(now);
        let mut visited_locations = BTreeMap::new();
        visited_locations.insert(hub.id.clone(), hub);

        Self {
            player_location: HUB_LOCATION_ID.to_string(),
            inventory: Vec::new(),
            keys_collected: Vec::new(),
            keys_inserted: Vec::new(),
            vault_opened_at: None,
            visited_locations,
            npc_interactions: BTreeMap::new(),
            puzzle_states: BTreeMap::new(),
            decision_history: Vec::new(),
            current_door: None,
            game_started_at: now,
            last_updated: now,
        }
    }

    pub fn current_location(&self) -> Option<&LocationData> {
        self.visited_locations.get(&self.player_location)
    }

    pub fn location(&self, id: &str) -> Option<&LocationData> {
        self.visited_locations.get(id)
    }

    pub fn is_in_hub(&self) -> bool {
        self.player_location == HUB_LOCATION_ID
    }

    pub fn is_vault_open(&self) -> bool {
        self.vault_opened_at.is_some()
    }

    pub fn has_collected(&self, door: DoorNumber) -> bool {
        self.keys_collected.contains(&door)
    }

    pub fn has_inserted(&self, door: DoorNumber) -> bool {
        self.keys_inserted.contains(&door)
    }

    /// Whether a world behind `door` has been generated.
    pub fn door_opened(&self, door: DoorNumber) -> bool {
        self.visited_locations.contains_key(&door.entrance_id())
    }

    /// Key items currently carried.
    pub fn held_keys(&self) -> impl Iterator<Item = &Item> {
        self.inventory.iter().filter(|item| item.key_door().is_some())
    }

    pub fn inventory_names(&self) -> Vec<String> {
        self.inventory.iter().map(|i| i.name.clone()).collect()
    }

    /// Whether a key for `door` exists anywhere in the world already.
    pub fn key_exists(&self, door: DoorNumber) -> bool {
        let is_this_key = |item: &Item| item.key_door() == Some(door);
        self.has_collected(door)
            || self.inventory.iter().any(is_this_key)
            || self
                .visited_locations
                .values()
                .any(|loc| loc.items.iter().any(is_this_key))
    }

    /// Unsolved puzzle bound to the given location.
    pub fn unsolved_puzzle_at(&self, location_id: &str) -> Option<&PuzzleState> {
        self.puzzle_states
            .values()
            .find(|p| !p.solved && p.location_id == location_id)
    }

    /// Unsolved puzzle for the player's current surroundings, falling back
    /// to any unsolved puzzle in the current door's world.
    pub fn relevant_puzzle(&self) -> Option<&PuzzleState> {
        self.unsolved_puzzle_at(&self.player_location).or_else(|| {
            let door = self.current_door?;
            self.puzzle_states
                .values()
                .find(|p| !p.solved && p.door == Some(door))
        })
    }

    /// Verify the structural invariants of the state.
    pub fn check_consistency(&self) -> Result<(), StateError> {
        let location = self
            .current_location()
            .ok_or_else(|| StateError::UnknownLocation(self.player_location.clone()))?;

        if let Some(door) = self.current_door {
            if location.door != Some(door) {
                return Err(StateError::DoorMismatch {
                    location: location.id.clone(),
                    current: self.current_door,
                    actual: location.door,
                });
            }
        }

        let mut seen = HashSet::new();
        for door in &self.keys_collected {
            if !seen.insert(*door) {
                return Err(StateError::DuplicateKey(*door));
            }
        }

        let mut inserted = HashSet::new();
        for door in &self.keys_inserted {
            if !inserted.insert(*door) {
                return Err(StateError::DuplicateKey(*door));
            }
            if !seen.contains(door) {
                return Err(StateError::InsertedKeyNotCollected(*door));
            }
        }

        let mut item_ids = HashSet::new();
        for item in &self.inventory {
            if !item_ids.insert(item.id.as_str()) {
                return Err(StateError::DuplicateItem(item.id.clone()));
            }
        }

        let malformed = self
            .inventory
            .iter()
            .chain(self.visited_locations.values().flat_map(|l| l.items.iter()))
            .find(|item| item.is_key != item.door_number.is_some());
        if let Some(item) = malformed {
            return Err(StateError::MalformedKeyItem(item.id.clone()));
        }

        if self.vault_opened_at.is_some() && self.keys_inserted.len() != DOOR_COUNT as usize {
            return Err(StateError::VaultWithoutKeys(self.keys_inserted.len()));
        }

        if self.last_updated < self.game_started_at {
            return Err(StateError::TimestampOrder);
        }

        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new_game()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_door_number_bounds() {
        assert!(DoorNumber::new(0).is_err());
        assert!(DoorNumber::new(7).is_err());
        assert_eq!(DoorNumber::new(3).unwrap().get(), 3);
        assert_eq!(DoorNumber::all().count(), 6);
    }

    #[test]
    fn test_door_number_serializes_as_integer() {
        let door = DoorNumber::new(4).unwrap();
        assert_eq!(serde_json::to_string(&door).unwrap(), "4");
        assert!(serde_json::from_str::<DoorNumber>("9").is_err());
    }

    #[test]
    fn test_new_game() {
        let state = GameState::new_game();
        assert!(state.is_in_hub());
        assert!(state.inventory.is_empty());
        assert!(state.keys_collected.is_empty());
        assert!(state.current_door.is_none());
        assert_eq!(state.current_location().unwrap().exits.len(), 6);
        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_key_item_shape() {
        let key = Item::key(DoorNumber::new(2).unwrap());
        assert_eq!(key.id, "key_2");
        assert_eq!(key.name, "Key 2");
        assert_eq!(key.key_door(), DoorNumber::new(2).ok());
    }

    #[test]
    fn test_consistency_detects_unknown_location() {
        let mut state = GameState::new_game();
        state.player_location = "nowhere".to_string();
        assert_eq!(
            state.check_consistency(),
            Err(StateError::UnknownLocation("nowhere".to_string()))
        );
    }

    #[test]
    fn test_consistency_detects_door_mismatch() {
        let mut state = GameState::new_game();
        state.current_door = DoorNumber::new(1).ok();
        assert!(matches!(
            state.check_consistency(),
            Err(StateError::DoorMismatch { .. })
        ));
    }

    #[test]
    fn test_consistency_detects_key_problems() {
        let one = DoorNumber::new(1).unwrap();

        let mut state = GameState::new_game();
        state.keys_collected = vec![one, one];
        assert_eq!(state.check_consistency(), Err(StateError::DuplicateKey(one)));

        let mut state = GameState::new_game();
        state.keys_inserted = vec![one];
        assert_eq!(
            state.check_consistency(),
            Err(StateError::InsertedKeyNotCollected(one))
        );

        let mut state = GameState::new_game();
        let mut bad = Item::new("rock", "Rock", "A rock");
        bad.door_number = Some(one);
        state.inventory.push(bad);
        assert_eq!(
            state.check_consistency(),
            Err(StateError::MalformedKeyItem("rock".to_string()))
        );
    }

    #[test]
    fn test_serialization_preserves_everything() {
        let mut state = GameState::new_game();
        let door = DoorNumber::new(5).unwrap();
        state.inventory.push(Item::key(door));
        state.inventory.push(
            Item::new("lamp", "Brass Lamp", "Dented but bright")
                .with_property("lit", serde_json::json!(true)),
        );
        state.keys_collected.push(door);
        state.decision_history.push(Decision {
            timestamp: state.game_started_at,
            location_id: HUB_LOCATION_ID.to_string(),
            description: "Player chose to open door 5".to_string(),
            consequences: vec!["Entered world behind door 5".to_string()],
        });

        let json = serde_json::to_string(&state).unwrap();
        let restored: GameState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, state);
        assert!(restored.inventory[0].is_key);
        assert_eq!(restored.inventory[1].name, "Brass Lamp");
        assert_eq!(restored.game_started_at, state.game_started_at);
    }

    #[test]
    fn test_key_exists_checks_every_holder() {
        let door = DoorNumber::new(3).unwrap();
        let mut state = GameState::new_game();
        assert!(!state.key_exists(door));

        state
            .visited_locations
            .get_mut(HUB_LOCATION_ID)
            .unwrap()
            .items
            .push(Item::key(door));
        assert!(state.key_exists(door));
    }
}
