use chrono::{DateTime, Utc};

use super::{describe_location, finalize_location, ActionExecutor, ActionResult, Milestone};
use crate::effects::StateChange;
use crate::fallback;
use crate::hub;
use crate::matching;
use crate::oracle::{LocationRequest, PuzzleRequest};
use crate::state::{DoorNumber, GameState, Item, LocationData, PuzzleState, DOOR_COUNT};

impl ActionExecutor {
    pub(super) async fn handle_open_door(
        &self,
        target: &str,
        state: &GameState,
        now: DateTime<Utc>,
    ) -> ActionResult {
        let door = match matching::parse_door_number(target) {
            Ok(door) => door,
            Err(_) => return ActionResult::failure("Which door? Choose a number from 1 to 6."),
        };
        let entrance_id = door.entrance_id();

        if let Some(entrance) = state.location(&entrance_id) {
            return ActionResult::success(format!(
                "You open door {door} and step through into the familiar world beyond.\n\n{}",
                describe_location(entrance)
            ))
            .with_change(StateChange::PlayerMoved {
                location_id: entrance_id,
            })
            .with_change(StateChange::CurrentDoorSet { door: Some(door) });
        }

        let request = LocationRequest {
            location_id: entrance_id.clone(),
            door,
            theme: hub::world_theme(door).to_string(),
            difficulty: self.difficulty.for_door(door).clone(),
            from_location: None,
            via_exit: None,
            player_history: self.player_history(state),
        };
        let draft = match self.oracle.generate_location(&request).await {
            Ok(draft) => draft,
            Err(err) => return ActionResult::oracle_failed(fallback::DOOR_STUCK, &err),
        };

        let image = self.image_for(&draft.description).await;
        let mut entrance = finalize_location(draft, &entrance_id, door, Some(image), state, now);
        let puzzle = self.guard_key(door, &mut entrance, state).await;
        tracing::info!(%door, puzzle = puzzle.is_some(), "opened door for the first time");

        let mut message = format!(
            "You open door {door} and step through.\n\n{}",
            describe_location(&entrance)
        );
        if let Some(puzzle) = &puzzle {
            message.push_str(&format!("\n\n{}", puzzle.description));
        }

        let mut result = ActionResult::success(message).with_change(StateChange::LocationDiscovered {
            location: entrance,
        });
        if let Some(puzzle) = puzzle {
            result = result.with_change(StateChange::PuzzleRegistered { puzzle });
        }
        result
            .with_change(StateChange::PlayerMoved {
                location_id: entrance_id,
            })
            .with_change(StateChange::CurrentDoorSet { door: Some(door) })
            .with_milestone(Milestone::EnteredDoor(door))
    }

    /// Put the door's key behind a puzzle in the entrance.
    ///
    /// If no puzzle can be had, the key is left in plain sight so the world
    /// can still be finished.
    async fn guard_key(
        &self,
        door: DoorNumber,
        entrance: &mut LocationData,
        state: &GameState,
    ) -> Option<PuzzleState> {
        if state.key_exists(door) {
            return None;
        }

        let difficulty = self.difficulty.for_door(door);
        let request = PuzzleRequest {
            door,
            location_id: entrance.id.clone(),
            location_description: entrance.description.clone(),
            theme: hub::world_theme(door).to_string(),
            complexity: difficulty.puzzle_complexity,
            required_virtues: difficulty.required_virtues.clone(),
            player_history: self.player_history(state),
        };

        match self.oracle.generate_puzzle(&request).await {
            Ok(puzzle) => {
                entrance.items.retain(|item| item.key_door().is_none());
                Some(PuzzleState {
                    id: door.puzzle_id(),
                    description: puzzle.description,
                    solved: false,
                    attempts: Vec::new(),
                    hints_given: 0,
                    location_id: entrance.id.clone(),
                    door: Some(door),
                    solution_criteria: puzzle.solution_criteria,
                    reward: Some(Item::key(door)),
                })
            }
            Err(err) => {
                tracing::warn!(%door, error = %err, "no puzzle, leaving key in the open");
                if !entrance.items.iter().any(|item| item.key_door() == Some(door)) {
                    entrance.items.push(Item::key(door));
                }
                None
            }
        }
    }

    pub(super) fn handle_insert_key(
        &self,
        target: &str,
        state: &GameState,
        now: DateTime<Utc>,
    ) -> ActionResult {
        if state.is_vault_open() {
            return ActionResult::failure("The vault is already open.");
        }

        let wanted = matching::parse_door_number(target).ok();
        let keys: Vec<DoorNumber> = state
            .held_keys()
            .filter_map(Item::key_door)
            .filter(|door| !state.has_inserted(*door))
            .filter(|door| wanted.map_or(true, |w| w == *door))
            .collect();
        if keys.is_empty() {
            return ActionResult::failure("You don't have any keys to insert.");
        }

        let total = DOOR_COUNT as usize;
        let mut inserted = state.keys_inserted.len();
        let mut lines = Vec::new();
        let mut result = ActionResult::success(String::new());
        for door in keys {
            inserted += 1;
            lines.push(format!(
                "You insert Key {door} into the vault. It clicks into place and begins to glow. ({inserted} of {total} keys inserted)"
            ));
            result = result
                .with_change(StateChange::KeyInserted { door })
                .with_milestone(Milestone::InsertedKey(door));
        }

        if inserted >= total {
            tracing::info!("vault opened");
            lines.push(hub::VAULT_COMPLETION_TEXT.to_string());
            result = result
                .with_change(StateChange::VaultOpened { at: now })
                .with_milestone(Milestone::VaultOpened);
            result.game_complete = true;
        } else {
            lines.push(format!("{} more to go.", total - inserted));
        }

        result.message = lines.join("\n\n");
        result
    }
}
