//! Matching player words against names in the world.

use crate::state::{DoorNumber, DoorNumberError};

/// Result of matching a phrase against candidate names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match<'a, T> {
    None,
    One(&'a T),
    Many(Vec<&'a T>),
}

impl<'a, T> Match<'a, T> {
    pub fn one(self) -> Option<&'a T> {
        match self {
            Match::One(found) => Some(found),
            _ => None,
        }
    }
}

const FILLER: &[&str] = &["the", "a", "an", "my", "some", "this", "that"];

/// Lowercase, trim, and drop leading articles.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty() && !FILLER.contains(&w.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find the candidates named by `query`.
///
/// An exact name wins outright. Failing that, names containing the query
/// (or contained by it) match; failing that, names sharing a significant
/// word match. More than one candidate at a tier is ambiguous.
pub fn find<'a, T>(query: &str, candidates: &'a [T], name: impl Fn(&T) -> &str) -> Match<'a, T> {
    let query = normalize(query);
    if query.is_empty() {
        return Match::None;
    }

    let named: Vec<(String, &T)> = candidates.iter().map(|c| (normalize(name(c)), c)).collect();

    if let Some((_, exact)) = named.iter().find(|(n, _)| *n == query) {
        return Match::One(exact);
    }

    let contained: Vec<&T> = named
        .iter()
        .filter(|(n, _)| !n.is_empty() && (n.contains(&query) || query.contains(n.as_str())))
        .map(|(_, c)| *c)
        .collect();
    match contained.len() {
        0 => {}
        1 => return Match::One(contained[0]),
        _ => return Match::Many(contained),
    }

    let query_words: Vec<&str> = query.split(' ').filter(|w| w.len() > 2).collect();
    let overlapping: Vec<&T> = named
        .iter()
        .filter(|(n, _)| n.split(' ').any(|w| query_words.contains(&w)))
        .map(|(_, c)| *c)
        .collect();
    match overlapping.len() {
        0 => Match::None,
        1 => Match::One(overlapping[0]),
        _ => Match::Many(overlapping),
    }
}

/// Match against plain strings, such as exits or NPC ids.
pub fn find_name<'a>(query: &str, names: &'a [String]) -> Match<'a, String> {
    find(query, names, |s| s.as_str())
}

/// Words that send the player back to the clearing from anywhere.
const RETURN_ALIASES: &[&str] = &[
    "back",
    "return",
    "hub",
    "clearing",
    "forest clearing",
    "exit",
    "leave",
    "home",
    "go back",
];

pub fn is_return_alias(target: &str) -> bool {
    let target = normalize(target);
    RETURN_ALIASES.contains(&target.as_str()) || target.ends_with("clearing")
}

const SURROUNDINGS: &[&str] = &[
    "area",
    "room",
    "surroundings",
    "location",
    "here",
    "around",
    "place",
];

/// Whether an examine target just means "look around".
pub fn is_surroundings(target: &str) -> bool {
    let target = normalize(target);
    target.is_empty() || SURROUNDINGS.contains(&target.as_str()) || target == "look around"
}

/// Why a phrase could not be read as a door number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorReference {
    Missing,
    OutOfRange(DoorNumberError),
}

const NUMBER_WORDS: &[(&str, i64)] = &[
    ("one", 1),
    ("first", 1),
    ("two", 2),
    ("second", 2),
    ("three", 3),
    ("third", 3),
    ("four", 4),
    ("fourth", 4),
    ("five", 5),
    ("fifth", 5),
    ("six", 6),
    ("sixth", 6),
    ("seven", 7),
    ("seventh", 7),
    ("eight", 8),
    ("nine", 9),
    ("zero", 0),
];

/// Read a door number out of phrases like "door 3", "the third door" or "door three".
pub fn parse_door_number(text: &str) -> Result<DoorNumber, DoorReference> {
    let lowered = text.to_lowercase();

    if let Some(start) = lowered.find(|c: char| c.is_ascii_digit()) {
        let run: String = lowered[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let n = run.parse::<i64>().unwrap_or(i64::MAX);
        let negative = lowered[..start].ends_with('-');
        return to_door(if negative { -n } else { n });
    }

    for word in lowered.split(|c: char| !c.is_alphanumeric()) {
        if let Some((_, n)) = NUMBER_WORDS.iter().find(|(w, _)| *w == word) {
            return to_door(*n);
        }
    }

    Err(DoorReference::Missing)
}

fn to_door(n: i64) -> Result<DoorNumber, DoorReference> {
    u8::try_from(n)
        .ok()
        .and_then(|n| DoorNumber::new(n).ok())
        .ok_or(DoorReference::OutOfRange(DoorNumberError(n)))
}

/// Whether the phrase talks about a door at all.
pub fn mentions_door(text: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == "door" || w == "doors")
}

/// Slug suitable for building ids out of names.
pub fn slug(text: &str) -> String {
    let mut out = String::new();
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}
