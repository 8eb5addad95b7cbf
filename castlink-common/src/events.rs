//! Widget push types
//!
//! The fan-out broadcaster delivers two shapes to overlay widgets over SSE:
//! a full `Snapshot` on subscribe, then incremental `Delta` patches. Both
//! carry a per-widget monotonic version so a client can verify it missed
//! nothing between the snapshot and the first delta.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::WidgetId;

/// Envelope pushed to a subscribed widget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetPush {
    /// Full widget state, sent once on subscribe
    Snapshot {
        #[serde(rename = "widgetId")]
        widget_id: WidgetId,
        version: u64,
        state: WidgetSnapshot,
    },

    /// Incremental change since the previous version
    Delta {
        #[serde(rename = "widgetId")]
        widget_id: WidgetId,
        version: u64,
        patch: WidgetPatch,
    },
}

impl WidgetPush {
    pub fn widget_id(&self) -> WidgetId {
        match self {
            WidgetPush::Snapshot { widget_id, .. } => *widget_id,
            WidgetPush::Delta { widget_id, .. } => *widget_id,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            WidgetPush::Snapshot { version, .. } => *version,
            WidgetPush::Delta { version, .. } => *version,
        }
    }
}

/// Full state of one widget category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum WidgetSnapshot {
    Counter(CounterSnapshot),
    Voting(VotingSnapshot),
    Tts(TtsSnapshot),
    /// Sound clips are fire-and-forget; the snapshot carries no state
    Sounds,
}

/// State of a cumulative counter widget (monetization or guard progress)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub current_value: f64,
    /// Milestone thresholds already crossed, ascending
    pub reached: Vec<MilestoneHit>,
    /// Next uncrossed threshold, if any remain
    pub next_threshold: Option<f64>,
}

/// A milestone threshold crossing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneHit {
    /// Position in the configured milestone list
    pub index: usize,
    pub threshold: f64,
    /// Opaque payload configured for this milestone (e.g. a reward label)
    pub payload: String,
}

/// Lifecycle of a vote session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    /// No session configured
    Idle,
    /// Accepting vote casts
    Running,
    /// Session closed; tallies frozen until reset
    Stopped,
}

/// Full voting widget state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingSnapshot {
    pub status: VoteStatus,
    pub question: Option<String>,
    pub options: Vec<String>,
    /// One tally per option, same order as `options`
    pub tallies: Vec<u64>,
}

/// TTS reader panel state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSnapshot {
    pub autoplay: bool,
    pub queued: usize,
    /// Request currently being synthesized or played
    pub now_playing: Option<NowPlaying>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlaying {
    pub request_id: Uuid,
    pub sender_id: String,
    pub text: String,
}

/// Incremental widget change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "patch", rename_all = "snake_case")]
pub enum WidgetPatch {
    /// Counter value moved
    ProgressChanged { current_value: f64, delta: f64 },

    /// One or more milestone thresholds crossed by a single event,
    /// ascending by threshold
    MilestonesReached { hits: Vec<MilestoneHit> },

    /// Counter returned to zero; reached milestones cleared
    CounterReset,

    VoteStarted {
        question: String,
        options: Vec<String>,
        tallies: Vec<u64>,
    },

    /// Tallies after a vote cast was applied
    VoteUpdated { tallies: Vec<u64> },

    /// Session closed with final tallies
    VoteStopped { tallies: Vec<u64> },

    VoteReset,

    /// TTS queue depth or autoplay flag changed
    TtsQueueChanged { queued: usize, autoplay: bool },

    /// A request entered synthesis
    TtsStarted {
        request_id: Uuid,
        sender_id: String,
        text: String,
    },

    /// A request finished playing, failed, or was skipped
    TtsFinished { request_id: Uuid, skipped: bool },

    /// A configured sound command fired
    SoundClip {
        token: String,
        file: String,
        volume: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_serialization() {
        let push = WidgetPush::Delta {
            widget_id: WidgetId::Monetization,
            version: 7,
            patch: WidgetPatch::ProgressChanged {
                current_value: 150.0,
                delta: 30.0,
            },
        };
        let json = serde_json::to_string(&push).unwrap();
        assert!(json.contains("\"type\":\"delta\""));
        assert!(json.contains("\"widgetId\":\"monetization\""));
        assert!(json.contains("\"patch\":\"progress_changed\""));

        let back: WidgetPush = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version(), 7);
        assert_eq!(back.widget_id(), WidgetId::Monetization);
    }

    #[test]
    fn test_snapshot_serialization() {
        let push = WidgetPush::Snapshot {
            widget_id: WidgetId::Voting,
            version: 0,
            state: WidgetSnapshot::Voting(VotingSnapshot {
                status: VoteStatus::Running,
                question: Some("which game next?".into()),
                options: vec!["a".into(), "b".into()],
                tallies: vec![0, 0],
            }),
        };
        let json = serde_json::to_string(&push).unwrap();
        assert!(json.contains("\"widget\":\"voting\""));
        assert!(json.contains("\"status\":\"running\""));
    }
}
