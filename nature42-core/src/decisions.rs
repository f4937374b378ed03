//! Deciding which actions become part of the player's story.
//!
//! Only turning points are kept: doors opened, keys won and spent, puzzles
//! cracked, the vault opened, and conversations the oracle marks as major.
//! The tracker is pure; the orchestrator turns its output into a
//! `DecisionRecorded` change.

use chrono::{DateTime, Utc};

use crate::executor::ActionResult;
use crate::intent::{Action, Intent};
use crate::state::Decision;

/// Decisions handed to the oracle on generation calls, by default.
pub const DEFAULT_DECISION_WINDOW: usize = 3;

/// Classifies results and builds [`Decision`] records.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionTracker;

impl DecisionTracker {
    pub fn new() -> Self {
        Self
    }

    /// Whether a successful action deserves a place in the decision history.
    pub fn is_significant(&self, intent: &Intent, result: &ActionResult) -> bool {
        if !result.success || result.changes.is_empty() {
            return false;
        }
        let Some(action) = intent.action else {
            return false;
        };
        if !action.may_be_significant() {
            return false;
        }
        result.game_complete
            || result.major_interaction
            || !result.milestones.is_empty()
    }

    /// Build the decision record for a significant action.
    pub fn make_decision(
        &self,
        intent: &Intent,
        result: &ActionResult,
        location_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Decision {
        let verb = intent.action.map(Action::verb).unwrap_or("act");
        let description = match intent.target.as_deref() {
            Some(target) if !target.is_empty() => format!("Player chose to {verb} {target}"),
            _ => format!("Player chose to {verb}"),
        };

        let mut consequences: Vec<String> =
            result.milestones.iter().map(|m| m.describe()).collect();
        if result.major_interaction {
            consequences.push(format!("Had a meaningful exchange: {}", summarize(&result.message)));
        }

        Decision {
            timestamp,
            location_id: location_id.to_string(),
            description,
            consequences,
        }
    }
}

/// The most recent `window` decisions, newest first.
pub fn recent_decisions(history: &[Decision], window: usize) -> Vec<Decision> {
    history.iter().rev().take(window).cloned().collect()
}

fn summarize(text: &str) -> String {
    const LIMIT: usize = 80;
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= LIMIT {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(LIMIT).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::StateChange;
    use crate::executor::Milestone;
    use crate::state::{DoorNumber, HUB_LOCATION_ID};

    fn door(n: u8) -> DoorNumber {
        DoorNumber::new(n).unwrap()
    }

    fn opened_door_result() -> ActionResult {
        let mut result = ActionResult::success("You step through door 3.");
        result.changes.push(StateChange::CurrentDoorSet {
            door: Some(door(3)),
        });
        result.milestones.push(Milestone::EnteredDoor(door(3)));
        result
    }

    #[test]
    fn test_open_door_is_significant() {
        let tracker = DecisionTracker::new();
        let intent = Intent::new(Action::OpenDoor, Some("door 3".to_string()), "open door 3");
        assert!(tracker.is_significant(&intent, &opened_door_result()));
    }

    #[test]
    fn test_movement_is_never_significant() {
        let tracker = DecisionTracker::new();
        let intent = Intent::new(Action::Move, Some("north".to_string()), "go north");
        let mut result = opened_door_result();
        result.major_interaction = true;
        assert!(!tracker.is_significant(&intent, &result));
    }

    #[test]
    fn test_failed_action_is_not_significant() {
        let tracker = DecisionTracker::new();
        let intent = Intent::new(Action::OpenDoor, Some("door 3".to_string()), "open door 3");
        let result = ActionResult::failure("The door creaks.");
        assert!(!tracker.is_significant(&intent, &result));
    }

    #[test]
    fn test_decision_text() {
        let tracker = DecisionTracker::new();
        let intent = Intent::new(Action::OpenDoor, Some("door 3".to_string()), "open door 3");
        let decision =
            tracker.make_decision(&intent, &opened_door_result(), HUB_LOCATION_ID, Utc::now());
        assert_eq!(decision.description, "Player chose to open door 3");
        assert_eq!(decision.consequences, vec!["Entered world behind door 3"]);
    }

    #[test]
    fn test_recent_decisions_newest_first() {
        let make = |n: usize| Decision {
            timestamp: Utc::now(),
            location_id: HUB_LOCATION_ID.to_string(),
            description: format!("decision {n}"),
            consequences: vec![],
        };
        let history: Vec<Decision> = (0..5).map(make).collect();
        let recent = recent_decisions(&history, 3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].description, "decision 4");
        assert_eq!(recent[2].description, "decision 2");
        assert!(recent_decisions(&[], 3).is_empty());
    }
}
