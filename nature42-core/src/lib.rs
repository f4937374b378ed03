//! Command-processing and progression engine for the Nature42 text adventure.
//!
//! This crate provides:
//! - The game state model (hub, six doors, keys, vault) and its invariants
//! - A command pipeline: intent parsing, validation, execution, decision tracking
//! - Idempotent state deltas the caller applies to its own copy of the state
//! - A content oracle seam, with a Claude-backed implementation
//! - Sessions and save files
//!
//! # Quick Start
//!
//! ```ignore
//! use nature42_core::GameSession;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = GameSession::from_env()?;
//!
//!     let result = session.send("open door 1").await?;
//!     println!("{}", result.message);
//!
//!     session.save("nature42.json").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decisions;
pub mod difficulty;
pub mod effects;
pub mod executor;
pub mod fallback;
pub mod hub;
pub mod intent;
pub mod matching;
pub mod oracle;
pub mod orchestrator;
pub mod persist;
pub mod session;
pub mod state;
pub mod testing;
pub mod validate;

// Re-export for convenience
pub use nature42_macros::Tool;

// Primary public API
pub use config::{ConfigError, EngineConfig, RetryPolicy};
pub use decisions::DecisionTracker;
pub use difficulty::{DifficultyTable, DoorDifficulty, HintGenerosity, PuzzleComplexity, Virtue, WorldSize};
pub use effects::{apply_changes, StateChange, StateChanges};
pub use intent::{Action, Intent, IntentParser};
pub use oracle::{ClaudeOracle, ContentOracle, OracleError};
pub use orchestrator::{CommandProcessor, CommandResult, FailureKind};
pub use persist::{PersistError, SavedGame};
pub use session::{GameSession, SessionError, SessionId};
pub use state::{DoorNumber, GameState, Item, LocationData, HUB_LOCATION_ID};
pub use testing::{ScriptedOracle, TestHarness};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    /// Record which door the player chose
    #[derive(Tool, Deserialize)]
    #[tool(name = "choose_door")]
    struct ChooseDoor {
        /// Door number between 1 and 6
        door: u8,
        /// How the player feels about it
        #[tool(one_of = "eager|wary")]
        mood: String,
        /// Optional remark
        remark: Option<String>,
    }

    #[test]
    fn test_tool_derive() {
        assert_eq!(ChooseDoor::tool_name(), "choose_door");
        assert_eq!(ChooseDoor::tool_description(), "Record which door the player chose");
    }

    #[test]
    fn test_tool_schema() {
        let schema = ChooseDoor::input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["door"]["type"], "integer");
        assert_eq!(schema["properties"]["mood"]["enum"][1], "wary");

        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "door"));
        assert!(!required.iter().any(|v| v == "remark"));
    }

    #[test]
    fn test_tool_input_round_trip() {
        let input = serde_json::json!({ "door": 4, "mood": "eager" });
        let parsed = ChooseDoor::from_tool_input(input).unwrap();
        assert_eq!(parsed.door, 4);
        assert_eq!(parsed.mood, "eager");
        assert!(parsed.remark.is_none());
    }
}
