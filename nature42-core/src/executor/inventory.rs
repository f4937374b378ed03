use super::{ActionExecutor, ActionResult, Milestone};
use crate::effects::StateChange;
use crate::matching::{self, Match};
use crate::state::{GameState, Item, DOOR_COUNT};

impl ActionExecutor {
    pub(super) fn handle_take(&self, target: &str, state: &GameState) -> ActionResult {
        let Some(location) = state.current_location() else {
            return ActionResult::failure("You seem to be nowhere at all.");
        };
        match matching::find(target, &location.items, |i| i.name.as_str()) {
            Match::One(item) => take_item(item, &location.id, state),
            Match::Many(_) => ActionResult::failure(format!("Which '{target}' do you mean?")),
            Match::None => ActionResult::failure(format!("There's no '{target}' here.")),
        }
    }

    pub(super) fn handle_drop(&self, target: &str, state: &GameState) -> ActionResult {
        let Match::One(item) = matching::find(target, &state.inventory, |i| i.name.as_str()) else {
            return ActionResult::failure(format!("You don't have a '{target}'."));
        };
        ActionResult::success(format!("You set down the {}.", item.name)).with_change(
            StateChange::ItemDropped {
                location_id: state.player_location.clone(),
                item: item.clone(),
            },
        )
    }

    pub(super) fn handle_inventory(&self, state: &GameState) -> ActionResult {
        if state.inventory.is_empty() {
            return ActionResult::success("Your inventory is empty.");
        }
        let lines: Vec<String> = state
            .inventory
            .iter()
            .map(|item| format!("- {}: {}", item.name, item.description))
            .collect();
        ActionResult::success(format!("You are carrying:\n{}", lines.join("\n")))
    }

    pub(super) fn handle_retrieve_key(&self, state: &GameState) -> ActionResult {
        let Some(door) = state.current_door else {
            return ActionResult::failure("There's no key to retrieve here.");
        };
        if state.inventory.iter().any(|i| i.key_door() == Some(door)) {
            return ActionResult::success(format!("You already have the key for door {door}."));
        }
        if let Some(location) = state.current_location() {
            if let Some(key) = location.items.iter().find(|i| i.key_door() == Some(door)) {
                return take_item(key, &location.id, state);
            }
        }
        if state.has_inserted(door) {
            return ActionResult::success(format!("Key {door} is already in the vault."));
        }
        if state.has_collected(door) {
            return ActionResult::failure(format!(
                "You've recovered key {door} before, but it isn't here. Perhaps you left it somewhere?"
            ));
        }
        ActionResult::failure("You haven't found this world's key yet.")
    }
}

/// Pick up an item. A key counts toward progress the first time only.
fn take_item(item: &Item, location_id: &str, state: &GameState) -> ActionResult {
    let taken = StateChange::ItemTaken {
        location_id: location_id.to_string(),
        item: item.clone(),
    };

    match item.key_door() {
        Some(door) if !state.has_collected(door) => {
            let collected = state.keys_collected.len() + 1;
            tracing::info!(%door, collected, "key retrieved");
            ActionResult::success(format!(
                "You take the {}. It feels warm in your hand. ({collected} of {DOOR_COUNT} keys collected)",
                item.name
            ))
            .with_change(taken)
            .with_change(StateChange::KeyRetrieved { door })
            .with_milestone(Milestone::RetrievedKey(door))
        }
        _ => ActionResult::success(format!("You pick up the {}.", item.name)).with_change(taken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::DifficultyTable;
    use crate::oracle::OracleHandle;
    use crate::state::{DoorNumber, HUB_LOCATION_ID};
    use crate::testing::ScriptedOracle;
    use std::sync::Arc;
    use std::time::Duration;

    fn executor() -> ActionExecutor {
        let oracle = OracleHandle::new(Arc::new(ScriptedOracle::new()), Duration::from_secs(5));
        ActionExecutor::new(oracle, Arc::new(DifficultyTable::standard()), 3)
    }

    fn hub_with(item: Item) -> GameState {
        let mut state = GameState::new_game();
        state
            .visited_locations
            .get_mut(HUB_LOCATION_ID)
            .unwrap()
            .items
            .push(item);
        state
    }

    #[test]
    fn test_first_key_take_counts() {
        let door = DoorNumber::new(4).unwrap();
        let state = hub_with(Item::key(door));
        let result = executor().handle_take("key 4", &state);

        assert!(result.success);
        assert!(result.message.contains("(1 of 6 keys collected)"));
        assert!(result.changes.contains(&StateChange::KeyRetrieved { door }));
        assert_eq!(result.milestones, vec![Milestone::RetrievedKey(door)]);
    }

    #[test]
    fn test_retaking_a_dropped_key_is_plain() {
        let door = DoorNumber::new(4).unwrap();
        let mut state = hub_with(Item::key(door));
        state.keys_collected.push(door);
        let result = executor().handle_take("key 4", &state);

        assert!(result.success);
        assert_eq!(result.changes.len(), 1);
        assert!(result.milestones.is_empty());
    }

    #[test]
    fn test_inventory_listing() {
        let mut state = GameState::new_game();
        assert_eq!(executor().handle_inventory(&state).message, "Your inventory is empty.");

        state.inventory.push(Item::new("rope", "rope", "Twenty feet of it"));
        let listing = executor().handle_inventory(&state).message;
        assert_eq!(listing, "You are carrying:\n- rope: Twenty feet of it");
    }

    #[test]
    fn test_drop_leaves_item_here() {
        let mut state = GameState::new_game();
        let rope = Item::new("rope", "rope", "Twenty feet of it");
        state.inventory.push(rope.clone());
        let result = executor().handle_drop("rope", &state);
        assert_eq!(
            result.changes,
            vec![StateChange::ItemDropped {
                location_id: HUB_LOCATION_ID.to_string(),
                item: rope,
            }]
        );
    }
}
