//! Deciding whether an intent can happen right now.
//!
//! Structural rules are checked first and are final: they never ask the
//! oracle. Only creative actions that pass them are shown to the oracle,
//! which may veto but never override a structural rejection.

use thiserror::Error;

use crate::decisions::recent_decisions;
use crate::intent::{Action, ContextDigest, Intent};
use crate::matching::{self, DoorReference, Match};
use crate::oracle::{JudgeContext, OracleError, OracleHandle};
use crate::state::{GameState, Item};

const NO_SUCH_DOOR: &str = "There are only six doors, numbered 1 to 6.";

/// Outcome of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Player-facing explanation; always present when invalid.
    pub reason: Option<String>,
    /// Oracle commentary on an allowed creative action.
    pub note: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            is_valid: true,
            reason: None,
            note: None,
        }
    }

    pub fn allowed_with_note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::allowed()
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("could not judge the action: {0}")]
    Oracle(#[from] OracleError),
}

/// Checks intents against the current state.
#[derive(Clone)]
pub struct ActionValidator {
    oracle: OracleHandle,
    history_window: usize,
}

impl ActionValidator {
    pub fn new(oracle: OracleHandle, history_window: usize) -> Self {
        Self {
            oracle,
            history_window,
        }
    }

    /// Validate an intent. Errors only when a creative action needed the
    /// oracle's judgment and the oracle could not give it.
    pub async fn validate(
        &self,
        intent: &Intent,
        state: &GameState,
    ) -> Result<ValidationResult, ValidationError> {
        let structural = check_structure(intent, state);
        if !structural.is_valid || !needs_judgment(intent, state) {
            return Ok(structural);
        }

        let context = JudgeContext {
            digest: ContextDigest::from_state(state),
            player_history: recent_decisions(&state.decision_history, self.history_window),
        };

        match self.oracle.judge_action(intent, &context).await {
            Ok(judgment) if judgment.allowed => Ok(ValidationResult::allowed_with_note(judgment.reason)),
            Ok(judgment) => Ok(ValidationResult::rejected(judgment.reason)),
            Err(err) if intent.action == Some(Action::Examine) => {
                tracing::debug!(error = %err, "judgment unavailable, allowing examine");
                Ok(ValidationResult::allowed())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Rules that need nothing but the state.
pub fn check_structure(intent: &Intent, state: &GameState) -> ValidationResult {
    if intent.is_invalid {
        return ValidationResult::rejected(
            intent
                .reason
                .clone()
                .unwrap_or_else(|| "I don't understand that.".to_string()),
        );
    }
    let Some(action) = intent.action else {
        return ValidationResult::rejected("I don't understand that.");
    };
    let Some(location) = state.current_location() else {
        return ValidationResult::rejected("You seem to be nowhere at all.");
    };
    let target = intent.target.as_deref().map(str::trim).filter(|t| !t.is_empty());

    match action {
        Action::Inventory | Action::Help | Action::Hint | Action::Examine | Action::Attempt => {
            ValidationResult::allowed()
        }

        Action::Move => {
            let Some(target) = target else {
                return ValidationResult::rejected(format!(
                    "Where would you like to go? Exits: {}",
                    listing(&location.exits)
                ));
            };
            if matching::mentions_door(target)
                && matches!(matching::parse_door_number(target), Err(DoorReference::OutOfRange(_)))
            {
                return ValidationResult::rejected(NO_SUCH_DOOR);
            }
            if matching::is_return_alias(target) {
                return if state.is_in_hub() {
                    ValidationResult::rejected("You're already in the forest clearing.")
                } else {
                    ValidationResult::allowed()
                };
            }
            match matching::find_name(target, &location.exits) {
                Match::One(_) => ValidationResult::allowed(),
                Match::Many(found) => ValidationResult::rejected(format!(
                    "Which way do you mean: {}?",
                    found.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" or ")
                )),
                Match::None => ValidationResult::rejected(format!(
                    "You can't go '{target}' from here. Exits: {}",
                    listing(&location.exits)
                )),
            }
        }

        Action::Take => {
            let Some(target) = target else {
                return ValidationResult::rejected("What would you like to take?");
            };
            match matching::find(target, &location.items, |i| i.name.as_str()) {
                Match::One(_) => ValidationResult::allowed(),
                Match::Many(found) => ValidationResult::rejected(which_one(&found)),
                Match::None => {
                    if let Match::One(held) = matching::find(target, &state.inventory, |i| i.name.as_str()) {
                        return ValidationResult::rejected(format!(
                            "You're already carrying the {}.",
                            held.name
                        ));
                    }
                    if location.items.is_empty() {
                        ValidationResult::rejected(format!(
                            "There's no '{target}' here, and nothing else to pick up."
                        ))
                    } else {
                        ValidationResult::rejected(format!(
                            "There's no '{target}' here. You can see: {}",
                            listing(&location.item_names())
                        ))
                    }
                }
            }
        }

        Action::Drop => {
            let Some(target) = target else {
                return ValidationResult::rejected("What would you like to drop?");
            };
            held_item(target, state).map_or_else(ValidationResult::rejected, |_| ValidationResult::allowed())
        }

        Action::Use => {
            let Some(target) = target else {
                return ValidationResult::rejected("What would you like to use?");
            };
            match held_item(target, state) {
                Ok(item) if item.is_key => ValidationResult::rejected(
                    "Keys aren't used out here. Bring them to the vault in the forest clearing and INSERT KEY.",
                ),
                Ok(_) => ValidationResult::allowed(),
                Err(reason) => ValidationResult::rejected(reason),
            }
        }

        Action::OpenDoor => {
            if !state.is_in_hub() {
                return ValidationResult::rejected(
                    "There are no doors to open here. The six numbered doors are in the forest clearing.",
                );
            }
            match matching::parse_door_number(target.unwrap_or_default()) {
                Ok(_) => ValidationResult::allowed(),
                Err(DoorReference::Missing) => {
                    ValidationResult::rejected("Which door? Choose a number from 1 to 6.")
                }
                Err(DoorReference::OutOfRange(_)) => ValidationResult::rejected(NO_SUCH_DOOR),
            }
        }

        Action::RetrieveKey => {
            let Some(door) = state.current_door else {
                return ValidationResult::rejected(
                    "There's no key to retrieve here. Keys are found in the worlds behind the doors.",
                );
            };
            let held = state.inventory.iter().any(|i| i.key_door() == Some(door));
            let lying_here = location.items.iter().any(|i| i.key_door() == Some(door));
            if held || lying_here || state.has_collected(door) {
                ValidationResult::allowed()
            } else {
                ValidationResult::rejected("You haven't found this world's key yet.")
            }
        }

        Action::InsertKey => {
            if state.is_vault_open() {
                return ValidationResult::rejected("The vault is already open.");
            }
            if !state.is_in_hub() {
                return ValidationResult::rejected(
                    "There's nowhere to insert a key here. The vault is in the forest clearing.",
                );
            }
            let held: Vec<&Item> = state
                .held_keys()
                .filter(|k| k.key_door().is_some_and(|d| !state.has_inserted(d)))
                .collect();
            if held.is_empty() {
                return ValidationResult::rejected("You don't have any keys to insert.");
            }
            if let Some(target) = target {
                match matching::parse_door_number(target) {
                    Ok(door) if !held.iter().any(|k| k.key_door() == Some(door)) => {
                        return ValidationResult::rejected(format!(
                            "You don't have the key for door {door}."
                        ));
                    }
                    Err(DoorReference::OutOfRange(_)) => {
                        return ValidationResult::rejected("There are only six keyholes, numbered 1 to 6.");
                    }
                    Err(DoorReference::Missing)
                        if !target.to_lowercase().contains("key")
                            && !target.to_lowercase().contains("vault") =>
                    {
                        return ValidationResult::rejected(format!(
                            "You can't put '{target}' into the vault. Only keys fit."
                        ));
                    }
                    _ => {}
                }
            }
            ValidationResult::allowed()
        }

        Action::Talk => {
            if location.npcs.is_empty() {
                return ValidationResult::rejected("There's no one here to talk to.");
            }
            let Some(target) = target else {
                return ValidationResult::rejected(format!(
                    "Who would you like to talk to? You can see: {}",
                    listing(&location.npcs)
                ));
            };
            match matching::find_name(target, &location.npcs) {
                Match::One(_) => ValidationResult::allowed(),
                Match::Many(found) => ValidationResult::rejected(format!(
                    "Who do you mean: {}?",
                    found.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" or ")
                )),
                Match::None => ValidationResult::rejected(format!(
                    "There's no one called '{target}' here. You can see: {}",
                    listing(&location.npcs)
                )),
            }
        }
    }
}

/// Whether a structurally valid intent still needs the oracle's judgment.
fn needs_judgment(intent: &Intent, state: &GameState) -> bool {
    let no_local_puzzle = state.unsolved_puzzle_at(&state.player_location).is_none();
    match intent.action {
        Some(Action::Use) | Some(Action::Attempt) => no_local_puzzle,
        Some(Action::Examine) => intent.target.as_deref().is_some_and(|t| is_unusual(t, state)),
        _ => false,
    }
}

/// An examine target that is not something the engine can describe itself.
fn is_unusual(target: &str, state: &GameState) -> bool {
    if matching::is_surroundings(target) {
        return false;
    }
    let lowered = target.to_lowercase();
    if state.is_in_hub() && (lowered.contains("vault") || matching::mentions_door(target)) {
        return false;
    }
    let Some(location) = state.current_location() else {
        return false;
    };
    let known = matches!(
        matching::find(target, &location.items, |i| i.name.as_str()),
        Match::One(_) | Match::Many(_)
    ) || matches!(
        matching::find(target, &state.inventory, |i| i.name.as_str()),
        Match::One(_) | Match::Many(_)
    ) || !matches!(matching::find_name(target, &location.npcs), Match::None)
        || !matches!(matching::find_name(target, &location.exits), Match::None);
    !known
}

fn held_item<'a>(target: &str, state: &'a GameState) -> Result<&'a Item, String> {
    match matching::find(target, &state.inventory, |i| i.name.as_str()) {
        Match::One(item) => Ok(item),
        Match::Many(found) => Err(which_one(&found)),
        Match::None if state.inventory.is_empty() => {
            Err(format!("You don't have a '{target}'. You aren't carrying anything."))
        }
        Match::None => Err(format!(
            "You don't have a '{target}'. You are carrying: {}",
            listing(&state.inventory_names())
        )),
    }
}

fn which_one(found: &[&Item]) -> String {
    let names: Vec<&str> = found.iter().map(|i| i.name.as_str()).collect();
    format!("Which one do you mean: {}?", names.join(" or "))
}

fn listing(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
