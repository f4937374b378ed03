use chrono::{DateTime, Utc};

use super::{ActionExecutor, ActionResult};
use crate::effects::StateChange;
use crate::fallback;
use crate::matching::{self, Match};
use crate::oracle::DialogueRequest;
use crate::state::{GameState, Interaction};

impl ActionExecutor {
    pub(super) async fn handle_talk(
        &self,
        target: &str,
        raw: &str,
        state: &GameState,
        now: DateTime<Utc>,
    ) -> ActionResult {
        let Some(location) = state.current_location() else {
            return ActionResult::failure("You seem to be nowhere at all.");
        };
        let Match::One(npc) = matching::find_name(target, &location.npcs) else {
            return ActionResult::failure(format!("There's no one called '{target}' here."));
        };

        let history = state.npc_interactions.get(npc).cloned().unwrap_or_default();
        let request = DialogueRequest {
            npc_id: npc.clone(),
            player_action: raw.to_string(),
            location_description: location.description.clone(),
            interaction_history: history.clone(),
            player_history: self.player_history(state),
        };

        let reply = match self.oracle.generate_npc_dialogue(&request).await {
            Ok(reply) => reply,
            Err(_) => return ActionResult::success(fallback::npc_dialogue(npc)),
        };

        let interaction = Interaction {
            timestamp: now,
            npc_id: npc.clone(),
            player_action: raw.to_string(),
            npc_response: reply.text.clone(),
            sentiment: reply.sentiment,
        };
        let mut result = ActionResult::success(reply.text).with_change(StateChange::InteractionRecorded {
            index: history.len(),
            interaction,
        });
        result.major_interaction = reply.major;
        result
    }
}
