use chrono::{DateTime, Utc};

use super::{describe_location, finalize_location, ActionExecutor, ActionResult};
use crate::effects::StateChange;
use crate::fallback;
use crate::hub;
use crate::matching::{self, Match};
use crate::oracle::LocationRequest;
use crate::state::{GameState, HUB_LOCATION_ID};

impl ActionExecutor {
    pub(super) async fn handle_move(
        &self,
        target: &str,
        state: &GameState,
        now: DateTime<Utc>,
    ) -> ActionResult {
        if matching::is_return_alias(target) {
            return self.return_to_hub(state);
        }

        // "go to door 3" from the clearing is opening a door.
        if state.is_in_hub() && matching::parse_door_number(target).is_ok() {
            return self.handle_open_door(target, state, now).await;
        }

        let Some(location) = state.current_location() else {
            return ActionResult::failure("You seem to be nowhere at all.");
        };
        let Match::One(exit) = matching::find_name(target, &location.exits) else {
            return ActionResult::failure(format!("You can't go '{target}' from here."));
        };

        let destination_id = format!("{}_{}", location.id, matching::slug(exit));
        if let Some(known) = state.location(&destination_id) {
            return ActionResult::success(format!("You head {exit}.\n\n{}", describe_location(known)))
                .with_change(StateChange::PlayerMoved {
                    location_id: destination_id,
                });
        }

        let Some(door) = state.current_door.or(location.door) else {
            return ActionResult::failure(format!("You can't go '{target}' from here."));
        };

        let request = LocationRequest {
            location_id: destination_id.clone(),
            door,
            theme: hub::world_theme(door).to_string(),
            difficulty: self.difficulty.for_door(door).clone(),
            from_location: Some(location.id.clone()),
            via_exit: Some(exit.clone()),
            player_history: self.player_history(state),
        };
        let draft = match self.oracle.generate_location(&request).await {
            Ok(draft) => draft,
            Err(err) => return ActionResult::oracle_failed(fallback::TRY_AGAIN, &err),
        };

        let image = self.image_for(&draft.description).await;
        let discovered = finalize_location(draft, &destination_id, door, Some(image), state, now);
        tracing::info!(location = %discovered.id, %door, "discovered location");

        let message = format!("You head {exit}.\n\n{}", describe_location(&discovered));
        ActionResult::success(message)
            .with_change(StateChange::LocationDiscovered {
                location: discovered,
            })
            .with_change(StateChange::PlayerMoved {
                location_id: destination_id,
            })
    }

    fn return_to_hub(&self, state: &GameState) -> ActionResult {
        if state.is_in_hub() {
            return ActionResult::failure("You're already in the forest clearing.");
        }
        let description = state
            .location(HUB_LOCATION_ID)
            .map(describe_location)
            .unwrap_or_default();
        ActionResult::success(format!(
            "You make your way back to the forest clearing.\n\n{description}"
        ))
        .with_change(StateChange::PlayerMoved {
            location_id: HUB_LOCATION_ID.to_string(),
        })
        .with_change(StateChange::CurrentDoorSet { door: None })
    }
}
