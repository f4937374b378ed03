//! Content oracle backed by Claude.
//!
//! Every call forces a single tool so the reply arrives as structured JSON
//! matching one of the report structs below.

use async_trait::async_trait;
use claude::{Claude, Message, Request};
use nature42_macros::Tool;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::{
    ContentOracle, DialogueRequest, HintRequest, Interpretation, JudgeContext, Judgment,
    LocationDraft, LocationRequest, NpcReply, OracleError, Puzzle, PuzzleRequest, PuzzleVerdict,
};
use crate::intent::{ContextDigest, Intent};
use crate::state::{Decision, Item, PuzzleState, Sentiment};

const SYSTEM_PROMPT: &str = "You are the narrator of Nature42, a gentle text adventure. \
The player starts in a twilight forest clearing with six numbered doors and a stone vault \
inscribed \"The Ultimate Question\". Behind each door is a world holding one key. \
Write in second person, keep descriptions to a short paragraph, and never invent game \
mechanics: only report what the tool asks for.";

/// Model settings for the oracle.
#[derive(Debug, Clone)]
pub struct OracleModelConfig {
    /// Model override; the client default is used when unset.
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    pub request_timeout: Duration,
}

impl Default for OracleModelConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: Some(0.8),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl OracleModelConfig {
    /// Defaults, with `NATURE42_MODEL` overriding the model.
    pub fn from_env() -> Self {
        Self {
            model: std::env::var("NATURE42_MODEL").ok().filter(|m| !m.is_empty()),
            ..Self::default()
        }
    }
}

/// [`ContentOracle`] that talks to the Anthropic Messages API.
pub struct ClaudeOracle {
    client: Claude,
    config: OracleModelConfig,
}

impl ClaudeOracle {
    pub fn new(client: Claude, config: OracleModelConfig) -> Result<Self, OracleError> {
        let client = client.with_timeout(config.request_timeout)?;
        let client = match &config.model {
            Some(model) => client.with_model(model),
            None => client,
        };
        Ok(Self { client, config })
    }

    /// Build from `ANTHROPIC_API_KEY` and `NATURE42_MODEL`.
    pub fn from_env() -> Result<Self, OracleError> {
        let client = Claude::from_env()?;
        Self::new(client, OracleModelConfig::from_env())
    }

    async fn ask<T: DeserializeOwned>(
        &self,
        prompt: String,
        tool: claude::Tool,
    ) -> Result<T, OracleError> {
        let mut request = Request::new(vec![Message::user(prompt)])
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(self.config.max_tokens);
        if let Some(temp) = self.config.temperature {
            request = request.with_temperature(temp);
        }

        let input = self.client.complete_with_forced_tool(request, tool).await?;
        serde_json::from_value(input).map_err(|e| OracleError::InvalidResponse(e.to_string()))
    }
}

// ============================================================================
// Tool reports
// ============================================================================

/// Report how the player's command should be read
#[derive(Tool, Deserialize)]
#[tool(name = "report_interpretation")]
struct InterpretationReport {
    /// Verb for the action the player most likely means
    #[tool(one_of = "move|take|drop|inventory|use|examine|open|retrieve|insert|talk|hint|attempt|help|unknown")]
    action: String,
    /// The object, exit, door or character the action is aimed at
    target: Option<String>,
    /// Confidence between 0 and 1
    confidence: f32,
    /// Alternative readings when the command is genuinely ambiguous
    #[tool(optional)]
    #[serde(default)]
    candidates: Vec<String>,
}

/// Decide whether the player's action is possible here
#[derive(Tool, Deserialize)]
#[tool(name = "judge_action")]
struct JudgmentReport {
    /// Whether the action can happen in this place
    allowed: bool,
    /// One sentence the player will read explaining the outcome
    reason: String,
}

/// An object lying in a location
#[derive(Tool, Deserialize)]
#[tool(name = "item")]
struct ItemReport {
    /// Short name, two or three words
    name: String,
    /// One sentence description
    description: String,
}

/// Describe a new location
#[derive(Tool, Deserialize)]
#[tool(name = "describe_location")]
struct LocationReport {
    /// A short paragraph describing the place
    description: String,
    /// Names of ways out, such as "north path" or "spiral stair"
    exits: Vec<String>,
    /// Notable objects the player could pick up
    #[tool(optional)]
    #[serde(default)]
    items: Vec<ItemReport>,
    /// Names of characters present
    #[tool(optional)]
    #[serde(default)]
    npcs: Vec<String>,
}

/// Speak as a character in the world
#[derive(Tool, Deserialize)]
#[tool(name = "character_reply")]
struct DialogueReport {
    /// What the character says or does in response
    text: String,
    /// How the character feels about the exchange
    #[tool(one_of = "positive|neutral|negative")]
    sentiment: String,
    /// True only if this exchange changes the course of the story
    major: bool,
}

/// Design a puzzle guarding this world's key
#[derive(Tool, Deserialize)]
#[tool(name = "design_puzzle")]
struct PuzzleReport {
    /// What the player sees and must figure out
    description: String,
    /// What a successful attempt must involve; hidden from the player
    solution_criteria: String,
}

/// Judge an attempt at a puzzle
#[derive(Tool, Deserialize)]
#[tool(name = "judge_attempt")]
struct VerdictReport {
    /// Whether the attempt satisfies the solution criteria
    solved: bool,
    /// Narration of what happens
    feedback: String,
}

/// Offer a hint
#[derive(Tool, Deserialize)]
#[tool(name = "give_hint")]
struct HintReport {
    /// The hint text
    hint: String,
}

fn history_lines(history: &[Decision]) -> String {
    if history.is_empty() {
        return "none yet".to_string();
    }
    history
        .iter()
        .map(|d| format!("- {}", d.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ContentOracle for ClaudeOracle {
    async fn interpret_command(
        &self,
        text: &str,
        digest: &ContextDigest,
    ) -> Result<Interpretation, OracleError> {
        let prompt = format!(
            "{}\n\nThe player typed: \"{text}\"\nReport how to read this command.",
            digest.render()
        );
        let report: InterpretationReport =
            self.ask(prompt, InterpretationReport::as_tool()).await?;
        Ok(Interpretation {
            action: report.action,
            target: report.target,
            confidence: report.confidence.clamp(0.0, 1.0),
            candidates: report.candidates,
        })
    }

    async fn judge_action(
        &self,
        intent: &Intent,
        context: &JudgeContext,
    ) -> Result<Judgment, OracleError> {
        let prompt = format!(
            "{}\nRecent choices:\n{}\n\nThe player wants to: \"{}\". Is this possible here?",
            context.digest.render(),
            history_lines(&context.player_history),
            intent.raw,
        );
        let report: JudgmentReport = self.ask(prompt, JudgmentReport::as_tool()).await?;
        Ok(Judgment {
            allowed: report.allowed,
            reason: report.reason,
        })
    }

    async fn generate_location(
        &self,
        request: &LocationRequest,
    ) -> Result<LocationDraft, OracleError> {
        let size = request.difficulty.world_size;
        let range = size.location_range();
        let arrival = match (&request.from_location, &request.via_exit) {
            (Some(from), Some(exit)) => format!("The player arrives from {from} via \"{exit}\"."),
            _ => "The player has just stepped through the door.".to_string(),
        };
        let prompt = format!(
            "Describe location '{}' in the world behind door {}: {}.\n\
             The world is {} ({} to {} locations in total). {arrival}\n\
             Give at least two exits. Do not place keys; the game handles them.\n\
             Recent choices by the player:\n{}",
            request.location_id,
            request.door,
            request.theme,
            size.label(),
            range.start(),
            range.end(),
            history_lines(&request.player_history),
        );
        let report: LocationReport = self.ask(prompt, LocationReport::as_tool()).await?;
        Ok(LocationDraft {
            description: report.description,
            exits: report.exits,
            items: report
                .items
                .into_iter()
                .map(|i| Item::new(String::new(), i.name, i.description))
                .collect(),
            npcs: report.npcs,
        })
    }

    async fn generate_npc_dialogue(
        &self,
        request: &DialogueRequest,
    ) -> Result<NpcReply, OracleError> {
        let earlier = request
            .interaction_history
            .iter()
            .map(|i| format!("Player: {}\n{}: {}", i.player_action, i.npc_id, i.npc_response))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Setting: {}\nYou are {}. Earlier conversation:\n{}\nRecent choices by the player:\n{}\n\n\
             The player says or does: \"{}\"",
            request.location_description,
            request.npc_id,
            if earlier.is_empty() { "none" } else { earlier.as_str() },
            history_lines(&request.player_history),
            request.player_action,
        );
        let report: DialogueReport = self.ask(prompt, DialogueReport::as_tool()).await?;
        Ok(NpcReply {
            text: report.text,
            sentiment: Sentiment::from_label(&report.sentiment),
            major: report.major,
        })
    }

    async fn generate_puzzle(&self, request: &PuzzleRequest) -> Result<Puzzle, OracleError> {
        let virtues = request
            .required_virtues
            .iter()
            .map(|v| v.label())
            .collect::<Vec<_>>()
            .join(" and ");
        let prompt = format!(
            "Setting ({}): {}\nDesign a {} puzzle that rewards {virtues}. \
             Solving it earns the key for door {}.\nRecent choices by the player:\n{}",
            request.theme,
            request.location_description,
            request.complexity.label(),
            request.door,
            history_lines(&request.player_history),
        );
        let report: PuzzleReport = self.ask(prompt, PuzzleReport::as_tool()).await?;
        Ok(Puzzle {
            description: report.description,
            solution_criteria: report.solution_criteria,
            reward: None,
        })
    }

    async fn evaluate_puzzle_attempt(
        &self,
        puzzle: &PuzzleState,
        attempt: &str,
        inventory: &[Item],
    ) -> Result<PuzzleVerdict, OracleError> {
        let carrying = inventory
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "Puzzle: {}\nSolution criteria: {}\nPlayer is carrying: {}\n\
             Previous attempts: {}\n\nThe player tries: \"{attempt}\"",
            puzzle.description,
            puzzle.solution_criteria,
            if carrying.is_empty() { "nothing" } else { carrying.as_str() },
            puzzle.attempts.len(),
        );
        let report: VerdictReport = self.ask(prompt, VerdictReport::as_tool()).await?;
        Ok(PuzzleVerdict {
            solved: report.solved,
            feedback: report.feedback,
        })
    }

    async fn generate_hint(&self, request: &HintRequest) -> Result<String, OracleError> {
        let prompt = format!(
            "Setting: {}\nPuzzle: {}\nSolution criteria (do not reveal verbatim): {}\n\
             Hints already given: {}. Keys collected: {}.\n{}",
            request.location_description,
            request.puzzle.description,
            request.puzzle.solution_criteria,
            request.previous_hints,
            request.keys_collected,
            request.style.tone.instructions(),
        );
        let report: HintReport = self.ask(prompt, HintReport::as_tool()).await?;
        Ok(report.hint)
    }

    async fn generate_location_image(&self, _description: &str) -> Result<String, OracleError> {
        Err(OracleError::Rejected(
            "image generation is not configured for this oracle".to_string(),
        ))
    }
}
