//! Conversation turns and the bounded history owned by the widget.
//!
//! On the wire (and in client-local storage) a turn has the provider's shape
//! `{ "role": "user", "parts": [{ "text": "..." }] }`. In memory it is a flat
//! [`ConversationTurn`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Default number of turns kept by [`ConversationHistory`].
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Upper bound on the text of a single inbound history entry, in characters.
pub const MAX_TURN_TEXT_CHARS: usize = 4000;

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Normalizes a role string coming from an untrusted client.
    ///
    /// `bot` and `assistant` are accepted as aliases of `model`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "model" | "bot" | "assistant" => Some(Self::Model),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One message exchange unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireTurn", into = "WireTurn")]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }
}

/// Provider-shaped turn: `{role, parts:[{text}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTurn {
    pub role: String,
    pub parts: Vec<WirePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePart {
    pub text: String,
}

impl From<ConversationTurn> for WireTurn {
    fn from(turn: ConversationTurn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            parts: vec![WirePart { text: turn.text }],
        }
    }
}

impl TryFrom<WireTurn> for ConversationTurn {
    type Error = String;

    fn try_from(wire: WireTurn) -> Result<Self, Self::Error> {
        let role = Role::parse(&wire.role).ok_or_else(|| format!("unknown role '{}'", wire.role))?;
        let text = wire
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            return Err("turn has no text parts".to_string());
        }
        Ok(Self { role, text })
    }
}

/// Capacity-bounded, oldest-first sequence of turns.
///
/// Appending past `limit` evicts from the front, so `len() <= limit` holds
/// after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    limit: usize,
}

impl ConversationHistory {
    /// Creates an empty history. A limit of zero is raised to one.
    pub fn new(limit: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Builds a history from restored turns, keeping only the most recent `limit`.
    pub fn from_turns(turns: impl IntoIterator<Item = ConversationTurn>, limit: usize) -> Self {
        let mut history = Self::new(limit);
        for turn in turns {
            history.push(turn);
        }
        history
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn to_vec(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    /// Serializes to the JSON array stored client-side and sent to the relay.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_vec())
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

/// Cleans an inbound, JSON-encoded history array.
///
/// Entries that are not objects, lack a `role` or a `parts` array, carry an
/// unknown role, or have no string `text` part are dropped. The survivors keep
/// their relative order. Anything that is not a JSON array yields an empty
/// history.
pub fn sanitize_history_json(raw: &str) -> Vec<ConversationTurn> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => sanitize_history(&value),
        Err(_) => Vec::new(),
    }
}

/// Same as [`sanitize_history_json`] for an already-decoded value.
pub fn sanitize_history(value: &Value) -> Vec<ConversationTurn> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    entries.iter().filter_map(sanitize_entry).collect()
}

fn sanitize_entry(entry: &Value) -> Option<ConversationTurn> {
    let object = entry.as_object()?;
    let role = Role::parse(object.get("role")?.as_str()?)?;
    let parts = object.get("parts")?.as_array()?;

    let texts: Vec<String> = parts
        .iter()
        .filter_map(|part| part.as_object()?.get("text")?.as_str())
        .map(clean_text)
        .filter(|text| !text.trim().is_empty())
        .collect();

    if texts.is_empty() {
        return None;
    }

    let joined = texts.join("\n");
    Some(ConversationTurn::new(role, truncate_chars(&joined, MAX_TURN_TEXT_CHARS)))
}

/// Drops control characters other than newlines and tabs.
fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Truncates to at most `max` characters (Unicode scalar values).
///
/// Strings already within the bound are returned unchanged.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
