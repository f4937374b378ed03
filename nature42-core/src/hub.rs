//! The forest clearing: fixed hub content that never goes through the oracle.

use chrono::{DateTime, Utc};

use crate::state::{DoorNumber, LocationData, DOOR_COUNT, HUB_LOCATION_ID};

const HUB_DESCRIPTION: &str = "You stand in a forest clearing at twilight. Old trees ring the \
space in a near-perfect circle, and the air hums with something like anticipation.

Six freestanding wooden doors stand in a wide arc, numbered 1 through 6. There are no walls \
around them, yet each looks solid enough to lean on.

In the middle of the clearing sits a waist-high stone vault. Carvings drift across its \
surface in the fading light, and across the top runs a single engraved line: \
\"The Ultimate Question\". Six numbered keyholes form a ring on its face.";

/// Words engraved on the vault lid.
pub const VAULT_INSCRIPTION: &str = "The Ultimate Question";

/// Text shown once, when the sixth key turns.
pub const VAULT_COMPLETION_TEXT: &str = "The vault brightens as the sixth key settles into place. \
With a soft click the lid swings open, and inside lies a single folded sheet of parchment.

You unfold it and read:

\"Suppose a good life is not one grand purpose but six small habits: a moment of kindness, \
a moment of curiosity, a moment of courage, a moment of gratitude, a moment of play, and a \
moment of honest rest. Practice each of them every day for a week. How many small, \
deliberate choices is that before the universe has to admit you are doing rather well \
at being alive?\"

Congratulations! You've completed Nature42 and discovered the meaning of 42.";

pub const HELP_TEXT: &str = "Here are some things you can do:

- LOOK AROUND: take in your surroundings
- EXAMINE [thing]: look closely at something (\"examine vault\", \"examine door 2\")
- OPEN DOOR [1-6]: step through one of the six doors
- GO [exit]: follow an exit, or GO BACK to return to the clearing
- TAKE / DROP [item]: pick things up or put them down
- USE [item]: use something you are carrying
- TALK TO [someone]: strike up a conversation
- INVENTORY: see what you are carrying
- INSERT KEY: place your keys in the vault
- HINT: ask for a nudge when you are stuck

Plain language works too. Your goal: recover a key from each of the six worlds and open the vault.";

/// Build the hub location.
pub fn hub_location(now: DateTime<Utc>) -> LocationData {
    LocationData {
        id: HUB_LOCATION_ID.to_string(),
        description: HUB_DESCRIPTION.to_string(),
        image_ref: None,
        exits: DoorNumber::all().map(|d| format!("door {d}")).collect(),
        items: Vec::new(),
        npcs: Vec::new(),
        generated_at: now,
        door: None,
    }
}

/// Close-up text for a single door.
pub fn door_description(door: DoorNumber, key_collected: bool) -> String {
    let base = match door.get() {
        1 => "A weathered oak door with brass fittings. It looks sturdy and welcoming.",
        2 => "A door carved with looping patterns that seem to shimmer when you look away.",
        3 => "A dark door bound in iron. Forbidding, and yet you want to know what is behind it.",
        4 => "A painted door whose colors have faded under many hands.",
        5 => "A tall door of pale wood, elegant and quiet.",
        _ => "An ancient door wrapped in moss and vines. It feels older than the forest.",
    };
    if key_collected {
        format!("{base}\n\nYou have already recovered the key from the world behind this door.")
    } else {
        base.to_string()
    }
}

/// The vault as it looks with `inserted` keys in place.
pub fn vault_description(inserted: usize) -> String {
    let top = format!(
        "The stone vault sits at the center of the clearing. Engraved across the top: \"{VAULT_INSCRIPTION}\"."
    );
    let total = DOOR_COUNT as usize;
    match inserted {
        0 => format!("{top}\n\nSix empty keyholes wait in a ring on its face. The vault is locked."),
        n if n < total => {
            let remaining = total - n;
            format!(
                "{top}\n\n{n} {} softly in their keyholes, while {remaining} {} still empty. The vault is locked.",
                if n == 1 { "key glows" } else { "keys glow" },
                if remaining == 1 { "keyhole is" } else { "keyholes are" },
            )
        }
        _ => format!("{top}\n\nAll six keys glow in their keyholes. The vault stands open, the parchment inside."),
    }
}

/// Themes that flavor each door's world.
pub fn world_theme(door: DoorNumber) -> &'static str {
    match door.get() {
        1 => "a mystical forest realm",
        2 => "an ancient library",
        3 => "a twilight carnival",
        4 => "a steampunk city in the clouds",
        5 => "a haunted mansion",
        _ => "a cosmic observatory",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_has_six_door_exits() {
        let hub = hub_location(Utc::now());
        assert_eq!(hub.exits.len(), 6);
        assert_eq!(hub.exits[0], "door 1");
        assert!(hub.door.is_none());
        assert!(hub.description.contains(VAULT_INSCRIPTION));
    }

    #[test]
    fn test_vault_description_tracks_progress() {
        assert!(vault_description(0).contains("Six empty keyholes"));
        assert!(vault_description(1).contains("1 key glows"));
        assert!(vault_description(5).contains("1 keyhole is"));
        assert!(vault_description(6).contains("stands open"));
        for n in 0..=6 {
            assert!(vault_description(n).contains(VAULT_INSCRIPTION));
        }
    }

    #[test]
    fn test_door_description_mentions_collected_key() {
        let door = DoorNumber::new(3).unwrap();
        assert!(!door_description(door, false).contains("already recovered"));
        assert!(door_description(door, true).contains("already recovered"));
    }
}
