use super::{ActionExecutor, ActionResult, Milestone};
use crate::effects::StateChange;
use crate::fallback;
use crate::matching::{self, Match};
use crate::oracle::HintRequest;
use crate::state::{GameState, Item, PuzzleState};

impl ActionExecutor {
    pub(super) async fn handle_use(
        &self,
        target: &str,
        raw: &str,
        note: Option<&str>,
        state: &GameState,
    ) -> ActionResult {
        let Match::One(item) = matching::find(target, &state.inventory, |i| i.name.as_str()) else {
            return ActionResult::failure(format!("You don't have a '{target}'."));
        };

        if let Some(puzzle) = state.unsolved_puzzle_at(&state.player_location) {
            return self.try_solution(puzzle, raw, state).await;
        }

        match note {
            Some(note) if !note.trim().is_empty() => ActionResult::success(note),
            _ => ActionResult::success(fallback::use_nothing_happens(&item.name)),
        }
    }

    pub(super) async fn handle_attempt(
        &self,
        raw: &str,
        note: Option<&str>,
        state: &GameState,
    ) -> ActionResult {
        if let Some(puzzle) = state.unsolved_puzzle_at(&state.player_location) {
            return self.try_solution(puzzle, raw, state).await;
        }
        match note {
            Some(note) if !note.trim().is_empty() => ActionResult::success(note),
            _ => ActionResult::success("You try, but nothing in particular happens."),
        }
    }

    /// Ask the oracle whether `attempt` solves `puzzle`.
    async fn try_solution(&self, puzzle: &PuzzleState, attempt: &str, state: &GameState) -> ActionResult {
        let verdict = match self
            .oracle
            .evaluate_puzzle_attempt(puzzle, attempt, &state.inventory)
            .await
        {
            Ok(verdict) => verdict,
            Err(err) => return ActionResult::oracle_failed(fallback::TRY_AGAIN, &err),
        };

        let attempted = StateChange::PuzzleAttempted {
            puzzle_id: puzzle.id.clone(),
            index: puzzle.attempts.len(),
            attempt: attempt.to_string(),
        };
        if !verdict.solved {
            return ActionResult::success(verdict.feedback).with_change(attempted);
        }

        tracing::info!(puzzle = %puzzle.id, attempts = puzzle.attempts.len() + 1, "puzzle solved");
        let mut message = verdict.feedback;
        let mut result = ActionResult::success(String::new())
            .with_change(attempted)
            .with_change(StateChange::PuzzleSolved {
                puzzle_id: puzzle.id.clone(),
            })
            .with_milestone(Milestone::SolvedPuzzle(puzzle.id.clone()));

        let reward = puzzle
            .reward
            .as_ref()
            .filter(|item| reward_is_new(item, state));
        if let Some(reward) = reward {
            message.push_str(&format!("\n\nThe {} appears before you.", reward.name));
            result = result.with_change(StateChange::ItemPlaced {
                location_id: puzzle.location_id.clone(),
                item: reward.clone(),
            });
        }

        result.message = message;
        result
    }

    pub(super) async fn handle_hint(&self, state: &GameState) -> ActionResult {
        let Some(puzzle) = state.relevant_puzzle() else {
            return ActionResult::success(fallback::guidance(
                state.keys_collected.len(),
                state.is_in_hub(),
            ));
        };

        let location_description = state
            .location(&puzzle.location_id)
            .map(|l| l.description.clone())
            .unwrap_or_default();
        let request = HintRequest {
            puzzle: puzzle.clone(),
            location_description,
            keys_collected: state.keys_collected.len(),
            previous_hints: puzzle.hints_given,
            style: self.difficulty.hint_style(state.keys_collected.len()),
        };

        match self.oracle.generate_hint(&request).await {
            Ok(hint) if !hint.trim().is_empty() => {
                ActionResult::success(hint).with_change(StateChange::HintGiven {
                    puzzle_id: puzzle.id.clone(),
                    hints_given: puzzle.hints_given + 1,
                })
            }
            _ => ActionResult::success(fallback::hint()),
        }
    }
}

/// A key reward is only placed if that key is nowhere in the world yet.
fn reward_is_new(item: &Item, state: &GameState) -> bool {
    item.key_door().map_or(true, |door| !state.key_exists(door))
}
