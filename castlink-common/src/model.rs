//! Normalized event model
//!
//! Every raw message from the chat relay is normalized into at most one
//! [`NormalizedEvent`] by the ingestion adapter. Events are immutable once
//! created; all downstream components (dispatcher, store, TTS queue) consume
//! them read-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Paid membership tier ("guard" in the source platform's terminology)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardTier {
    Captain,
    Admiral,
    Governor,
}

impl GuardTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardTier::Captain => "captain",
            GuardTier::Admiral => "admiral",
            GuardTier::Governor => "governor",
        }
    }
}

impl fmt::Display for GuardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event kind with kind-specific payload
///
/// Matches the relay's message families. `VoteCast` is synthesized by the
/// adapter from bare-digit chat messages; the dispatcher validates it
/// against the live vote session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Gift sent in chat (free gifts normalize to value 0.0)
    Gift {
        gift_name: String,
        quantity: u32,
        value: f64,
    },

    /// Paid highlighted message
    Superchat { amount: f64, message: String },

    /// Guard membership purchase or renewal
    Membership {
        tier: GuardTier,
        /// Renewal period count (months)
        periods: u32,
        value: f64,
    },

    /// Plain chat message
    ChatMessage { text: String },

    /// Vote for an option of the running vote session (0-based index)
    VoteCast { option_index: usize },
}

impl EventKind {
    /// Kind name as used in configuration (`[tts].speak_kinds`) and logs
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Gift { .. } => "gift",
            EventKind::Superchat { .. } => "superchat",
            EventKind::Membership { .. } => "membership",
            EventKind::ChatMessage { .. } => "chat_message",
            EventKind::VoteCast { .. } => "vote_cast",
        }
    }
}

/// A single normalized relay event
///
/// Immutable once created. `amount()` exposes the monetary value carried by
/// monetization kinds; non-monetary kinds have no amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub id: Uuid,
    /// Sender identity as reported by the relay
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl NormalizedEvent {
    pub fn new(sender_id: impl Into<String>, timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.into(),
            timestamp,
            kind,
        }
    }

    /// Monetary amount of the event, if any
    pub fn amount(&self) -> Option<f64> {
        match &self.kind {
            EventKind::Gift { value, .. } => Some(*value),
            EventKind::Superchat { amount, .. } => Some(*amount),
            EventKind::Membership { value, .. } => Some(*value),
            EventKind::ChatMessage { .. } | EventKind::VoteCast { .. } => None,
        }
    }
}

/// Identifier of an overlay widget category
///
/// Each widget subscribes to exactly one category; the fan-out broadcaster
/// scopes pushes per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetId {
    /// Monetization goal progress (gifts + superchats + memberships)
    Monetization,
    /// Guard member count progress
    GuardProgress,
    /// Chat voting
    Voting,
    /// TTS reader panel (queue status, now playing)
    Tts,
    /// Sound-command clip triggers
    Sounds,
}

impl WidgetId {
    pub const ALL: [WidgetId; 5] = [
        WidgetId::Monetization,
        WidgetId::GuardProgress,
        WidgetId::Voting,
        WidgetId::Tts,
        WidgetId::Sounds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetId::Monetization => "monetization",
            WidgetId::GuardProgress => "guard_progress",
            WidgetId::Voting => "voting",
            WidgetId::Tts => "tts",
            WidgetId::Sounds => "sounds",
        }
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monetization" => Ok(WidgetId::Monetization),
            "guard_progress" => Ok(WidgetId::GuardProgress),
            "voting" => Ok(WidgetId::Voting),
            "tts" => Ok(WidgetId::Tts),
            "sounds" => Ok(WidgetId::Sounds),
            other => Err(crate::Error::NotFound(format!("unknown widget: {other}"))),
        }
    }
}

/// Origin of a TTS request, for display and phrasing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum TtsOrigin {
    Chat,
    Superchat { amount: f64 },
    Membership { tier: GuardTier },
}

/// A spoken-message request
///
/// Created by the dispatcher for speech-eligible events, consumed by the TTS
/// queue manager. Never mutated after creation; arrival order is assigned by
/// the queue on enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsRequest {
    pub id: Uuid,
    pub sender_id: String,
    /// Text handed to the synthesis engine
    pub text: String,
    /// Target language the engine should translate into before speaking
    /// (e.g. "EN-US"); unset means speak the text as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate_to: Option<String>,
    #[serde(flatten)]
    pub origin: TtsOrigin,
}

impl TtsRequest {
    pub fn new(sender_id: impl Into<String>, text: impl Into<String>, origin: TtsOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.into(),
            text: text.into(),
            translate_to: None,
            origin,
        }
    }

    pub fn with_translate_to(mut self, target: Option<String>) -> Self {
        self.translate_to = target;
        self
    }
}
