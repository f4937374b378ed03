//! Per-door difficulty curve.
//!
//! The table is plain data handed to the executor, so tests can swap in a
//! flatter or steeper curve without touching any handler.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::state::{DoorNumber, DOOR_COUNT};

/// How intricate a door's puzzle should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PuzzleComplexity {
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

impl PuzzleComplexity {
    pub fn label(self) -> &'static str {
        match self {
            PuzzleComplexity::Simple => "simple",
            PuzzleComplexity::Moderate => "moderate",
            PuzzleComplexity::Complex => "complex",
            PuzzleComplexity::VeryComplex => "very complex",
        }
    }
}

/// How sprawling a door's world should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldSize {
    Small,
    Medium,
    Large,
    VeryLarge,
}

impl WorldSize {
    /// Number of distinct locations the world should offer.
    pub fn location_range(self) -> RangeInclusive<u32> {
        match self {
            WorldSize::Small => 3..=5,
            WorldSize::Medium => 5..=8,
            WorldSize::Large => 8..=12,
            WorldSize::VeryLarge => 12..=20,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WorldSize::Small => "small",
            WorldSize::Medium => "medium",
            WorldSize::Large => "large",
            WorldSize::VeryLarge => "very large",
        }
    }
}

/// How freely hints are handed out. Ordered from most to least generous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintGenerosity {
    High,
    Medium,
    Low,
    Minimal,
}

/// Character traits a door's puzzle is built around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Virtue {
    Kindness,
    Curiosity,
    Courage,
    Gratitude,
}

impl Virtue {
    pub fn label(self) -> &'static str {
        match self {
            Virtue::Kindness => "kindness",
            Virtue::Curiosity => "curiosity",
            Virtue::Courage => "courage",
            Virtue::Gratitude => "gratitude",
        }
    }
}

/// Difficulty settings for one door.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorDifficulty {
    pub door: DoorNumber,
    pub target_minutes: f32,
    pub puzzle_complexity: PuzzleComplexity,
    pub world_size: WorldSize,
    pub hint_generosity: HintGenerosity,
    pub required_virtues: Vec<Virtue>,
}

/// Tone the oracle should take when giving a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintTone {
    /// Direct and encouraging; may point straight at the next step.
    Free,
    /// Helpful but makes the player work for it.
    Reluctant,
    /// Cryptic; a nudge at most.
    Minimal,
}

impl HintTone {
    pub fn instructions(self) -> &'static str {
        match self {
            HintTone::Free => "Be warm and direct. Point clearly toward the next step.",
            HintTone::Reluctant => {
                "Be helpful but indirect. Nudge the player toward the answer without stating it."
            }
            HintTone::Minimal => "Be brief and cryptic. Offer only a subtle clue.",
        }
    }
}

/// Hint constraints derived from the player's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintStyle {
    pub generosity: HintGenerosity,
    pub tone: HintTone,
}

/// Door-indexed difficulty curve. Always holds exactly one entry per door,
/// in door order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TableEntries")]
pub struct DifficultyTable {
    entries: Vec<DoorDifficulty>,
}

/// Wire form of a table; loading goes through [`DifficultyTable::custom`].
#[derive(Deserialize)]
struct TableEntries {
    #[serde(default)]
    entries: Vec<DoorDifficulty>,
}

impl From<TableEntries> for DifficultyTable {
    fn from(raw: TableEntries) -> Self {
        Self::custom(raw.entries)
    }
}

impl DifficultyTable {
    /// The shipped curve: door 1 is a short, gentle warm-up; door 6 is long and sparse on hints.
    pub fn standard() -> Self {
        use HintGenerosity as H;
        use PuzzleComplexity as P;
        use Virtue::*;
        use WorldSize as W;

        let rows = [
            (7.5, P::Simple, W::Small, H::High, vec![Kindness]),
            (15.0, P::Moderate, W::Medium, H::High, vec![Curiosity]),
            (30.0, P::Moderate, W::Medium, H::Medium, vec![Courage]),
            (45.0, P::Complex, W::Large, H::Medium, vec![Gratitude]),
            (75.0, P::Complex, W::Large, H::Low, vec![Kindness, Curiosity]),
            (
                150.0,
                P::VeryComplex,
                W::VeryLarge,
                H::Minimal,
                vec![Kindness, Curiosity, Courage, Gratitude],
            ),
        ];

        let entries = DoorNumber::all()
            .zip(rows)
            .map(
                |(door, (target_minutes, puzzle_complexity, world_size, hint_generosity, virtues))| {
                    DoorDifficulty {
                        door,
                        target_minutes,
                        puzzle_complexity,
                        world_size,
                        hint_generosity,
                        required_virtues: virtues,
                    }
                },
            )
            .collect();

        Self { entries }
    }

    /// A custom curve. Entries are re-sorted by door; doors missing from
    /// `entries` fall back to the standard settings.
    pub fn custom(entries: Vec<DoorDifficulty>) -> Self {
        let mut table = Self::standard();
        for entry in entries {
            let idx = (entry.door.get() - 1) as usize;
            table.entries[idx] = entry;
        }
        table
    }

    pub fn for_door(&self, door: DoorNumber) -> &DoorDifficulty {
        &self.entries[(door.get() - 1) as usize]
    }

    pub fn entries(&self) -> &[DoorDifficulty] {
        &self.entries
    }

    /// Whether time, size and complexity never decrease with the door number.
    pub fn is_monotonic(&self) -> bool {
        self.entries.windows(2).all(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            b.target_minutes >= a.target_minutes
                && b.world_size >= a.world_size
                && b.puzzle_complexity >= a.puzzle_complexity
                && b.hint_generosity >= a.hint_generosity
        })
    }

    /// Hint style for a player who has collected `keys_collected` keys.
    ///
    /// Hints follow the door the player is most likely working on next.
    pub fn hint_style(&self, keys_collected: usize) -> HintStyle {
        let next = (keys_collected + 1).clamp(1, DOOR_COUNT as usize) as u8;
        let generosity = DoorNumber::new(next)
            .map(|door| self.for_door(door).hint_generosity)
            .unwrap_or(HintGenerosity::Minimal);
        let tone = match generosity {
            HintGenerosity::High => HintTone::Free,
            HintGenerosity::Medium | HintGenerosity::Low => HintTone::Reluctant,
            HintGenerosity::Minimal => HintTone::Minimal,
        };
        HintStyle { generosity, tone }
    }
}

impl Default for DifficultyTable {
    fn default() -> Self {
        Self::standard()
    }
}
