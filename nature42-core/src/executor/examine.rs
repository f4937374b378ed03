use super::{describe_location, ActionExecutor, ActionResult};
use crate::fallback;
use crate::hub;
use crate::matching::{self, Match};
use crate::state::GameState;

impl ActionExecutor {
    /// Describe something. Never changes state.
    pub(super) fn handle_examine(
        &self,
        target: &str,
        note: Option<&str>,
        state: &GameState,
    ) -> ActionResult {
        let Some(location) = state.current_location() else {
            return ActionResult::failure("You seem to be nowhere at all.");
        };

        if matching::is_surroundings(target) {
            return ActionResult::success(describe_location(location));
        }

        let lowered = target.to_lowercase();
        if state.is_in_hub() {
            if lowered.contains("vault") || lowered.contains("keyhole") {
                return ActionResult::success(hub::vault_description(state.keys_inserted.len()));
            }
            if let Ok(door) = matching::parse_door_number(target) {
                return ActionResult::success(hub::door_description(door, state.has_collected(door)));
            }
            if matching::mentions_door(target) {
                return ActionResult::success(
                    "Six freestanding doors stand in an arc, numbered 1 through 6. Examine one to look closer.",
                );
            }
        }

        if let Match::One(item) = matching::find(target, &location.items, |i| i.name.as_str()) {
            return ActionResult::success(format!("{}: {}", item.name, item.description));
        }
        if let Match::One(item) = matching::find(target, &state.inventory, |i| i.name.as_str()) {
            return ActionResult::success(format!("{} (carried): {}", item.name, item.description));
        }
        if let Match::One(npc) = matching::find_name(target, &location.npcs) {
            return ActionResult::success(format!(
                "{npc} is here. Perhaps they would talk to you."
            ));
        }
        if let Match::One(exit) = matching::find_name(target, &location.exits) {
            return ActionResult::success(format!("The way {exit} leads somewhere you haven't seen yet."));
        }
        if lowered.contains("puzzle") || lowered.contains("riddle") {
            if let Some(puzzle) = state.unsolved_puzzle_at(&location.id) {
                return ActionResult::success(puzzle.description.clone());
            }
        }

        match note {
            Some(note) if !note.trim().is_empty() => ActionResult::success(note),
            _ => ActionResult::success(fallback::examine(target)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::DifficultyTable;
    use crate::oracle::OracleHandle;
    use crate::testing::ScriptedOracle;
    use std::sync::Arc;
    use std::time::Duration;

    fn executor() -> ActionExecutor {
        let oracle = OracleHandle::new(Arc::new(ScriptedOracle::new()), Duration::from_secs(5));
        ActionExecutor::new(oracle, Arc::new(DifficultyTable::standard()), 3)
    }

    #[test]
    fn test_examine_vault_shows_inscription() {
        let state = GameState::new_game();
        let result = executor().handle_examine("vault", None, &state);
        assert!(result.message.contains(hub::VAULT_INSCRIPTION));
        assert!(result.changes.is_empty());
    }

    #[test]
    fn test_examine_door() {
        let state = GameState::new_game();
        let result = executor().handle_examine("door 1", None, &state);
        assert!(result.message.contains("oak door"));
    }

    #[test]
    fn test_unknown_target_uses_note_then_fallback() {
        let state = GameState::new_game();
        let with_note = executor().handle_examine("sky", Some("Stars are coming out."), &state);
        assert_eq!(with_note.message, "Stars are coming out.");

        let without = executor().handle_examine("sky", None, &state);
        assert_eq!(without.message, fallback::examine("sky"));
    }
}
