//! Canned text for when the oracle cannot help.
//!
//! Only used where made-up prose cannot corrupt the game: looking, talking,
//! hinting and images. Anything that would change the world fails with a
//! try-again message instead.

/// Shown when a world-changing action needs the oracle and it is not there.
pub const TRY_AGAIN: &str =
    "Something shimmers and the world refuses to settle. Please try that again in a moment.";

/// Shown when opening a door fails to produce a world.
pub const DOOR_STUCK: &str = "The door creaks open, but something seems wrong and it swings shut again. Try again.";

/// Image reference used when no picture could be produced.
pub const PLACEHOLDER_IMAGE: &str = "placeholder:location";

/// Exits added when generated content offers too few.
pub const DEFAULT_EXITS: [&str; 2] = ["onward", "back"];

pub fn npc_dialogue(npc: &str) -> String {
    format!("{npc} seems distracted and doesn't respond clearly. Perhaps try talking to them again later.")
}

pub fn examine(target: &str) -> String {
    format!("You look closely at the {target}, but notice nothing out of the ordinary.")
}

pub fn hint() -> &'static str {
    "Take another careful look around. The people and things in this world tend to matter more than they first appear."
}

/// Hint text when there is no puzzle in play.
pub fn guidance(keys_collected: usize, in_hub: bool) -> String {
    if keys_collected >= 6 {
        return "You hold every key the worlds can give. The vault in the clearing is waiting.".to_string();
    }
    if in_hub {
        format!(
            "Each door hides a world with one key inside. You have {keys_collected} of 6. Try opening a door you haven't explored yet."
        )
    } else {
        "Explore this world and pay attention to whoever you meet. A key is hidden somewhere here.".to_string()
    }
}

pub fn use_nothing_happens(item: &str) -> String {
    format!("You try using the {item}, but nothing seems to happen.")
}
