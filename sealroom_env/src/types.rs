//! Common types for the decision provider boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two parties acting in the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Controls the hazards; wants the task to fail.
    Opponent,

    /// Occupies the room; wants to complete the task.
    Proponent,
}

impl Role {
    /// Returns the other party.
    pub fn counterpart(&self) -> Role {
        match self {
            Role::Opponent => Role::Proponent,
            Role::Proponent => Role::Opponent,
        }
    }

    /// Returns the role name.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Opponent => "opponent",
            Role::Proponent => "proponent",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Unique identifier for one scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Creates a new random RunId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic RunId from a seed (for reproducible runs).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 chars are enough to tell runs apart in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Who produced a transcript message, from the transcript owner's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// Text relayed from the other party (or the scripted opening line).
    Counterpart,

    /// The owner's own earlier response.
    Own,

    /// Status returned by a tool the owner invoked.
    Tool,
}

/// One entry in a party's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub speaker: Speaker,
    pub text: String,
}

/// Ordered, append-only message history for one party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.messages.push(TranscriptMessage {
            speaker,
            text: text.into(),
        });
    }

    /// Returns all messages in order.
    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing has been said yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the most recent message from the counterpart, if any.
    pub fn last_counterpart_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.speaker == Speaker::Counterpart)
            .map(|m| m.text.clone())
    }

    /// Counts messages from one speaker.
    pub fn count_from(&self, speaker: Speaker) -> usize {
        self.messages.iter().filter(|m| m.speaker == speaker).count()
    }
}

/// A provider's answer for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse<A> {
    /// Free text addressed to the counterpart (may be blank)
    pub text: String,

    /// Actions to apply, in order
    pub actions: Vec<A>,
}

impl<A> ProviderResponse<A> {
    /// Creates a response with text and actions.
    pub fn new(text: impl Into<String>, actions: Vec<A>) -> Self {
        Self {
            text: text.into(),
            actions,
        }
    }

    /// Creates a text-only response.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    /// The empty turn substituted for a failed provider call.
    pub fn empty() -> Self {
        Self::new(String::new(), Vec::new())
    }

    /// Returns true if the text is blank.
    pub fn is_silent(&self) -> bool {
        self.text.trim().is_empty()
    }
}
