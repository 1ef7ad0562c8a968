//! Message types for Turnstile's wire format.
//!
//! Both enums are *internally tagged*: the variant name travels as a
//! camelCase `type` field next to the variant's own (camelCase) fields.
//! `ServerMessage::QueueUpdate { position: 1, total: 3 }` is
//! `{"type":"queueUpdate","position":1,"total":3}` on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};
use turnstile_transport::ConnectionId;

/// Longest display name kept after normalization, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 24;

/// Name given to requesters that join with a blank display name.
const FALLBACK_DISPLAY_NAME: &str = "Player";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity of one transport session.
///
/// Stable for the lifetime of the connection and never reused. The
/// scheduler, queue, and round refer to sessions only through this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

impl From<ConnectionId> for SessionId {
    fn from(id: ConnectionId) -> Self {
        Self(id.into_inner())
    }
}

/// The role a session claims when it registers.
///
/// `game` and `player` are accepted as aliases since that is what the
/// game page and the controller page send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoleClaim {
    /// The single live game instance.
    #[serde(alias = "game")]
    Resource,
    /// A player controller that wants turns on the game.
    #[serde(alias = "player", alias = "controller")]
    Requester,
}

// ---------------------------------------------------------------------------
// Control input
// ---------------------------------------------------------------------------

/// Direction of a control input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Whether a control input is being pressed or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MovePhase {
    Start,
    Stop,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// Which messages are honored depends on the sender's role; anything sent
/// by the wrong role is dropped without a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Classify this session as the resource or as a requester.
    Register { role: RoleClaim },

    /// Requester: "I want a turn."
    Join { display_name: String },

    /// Active requester: control input for the game.
    Move {
        direction: Direction,
        phase: MovePhase,
    },

    /// Active requester: "I'm done, end my turn now."
    EndTurn,

    /// Resource: the final score for the round it was asked about.
    ///
    /// `user_id` echoes the id from `requestFinalScore`. When present it
    /// must match the round awaiting settlement.
    ReportFinalScore {
        value: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },

    /// Resource: advisory running score while the round is live.
    UpdateScore { value: u64 },
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// To a waiting requester: 1-based place in line out of `total`.
    QueueUpdate { position: usize, total: usize },

    /// To the selected requester: your turn starts in `duration_ms`.
    PrepareToPlay { duration_ms: u64 },

    /// To the selected requester: controls are live.
    YourTurn,

    /// To the resource: a round begins for `player_name`.
    RoundStart { player_name: String },

    /// To the resource: control input from the active requester.
    GameAction {
        direction: Direction,
        phase: MovePhase,
    },

    /// To the resource: report the final score of `user_id`'s round.
    RequestFinalScore { user_id: String },

    /// To the active requester: latest score reported by the resource.
    ScoreUpdate { value: u64 },

    /// To the active requester: time left in the round.
    TimeUpdate { remaining_ms: u64 },

    /// To the requester whose round settled.
    GameOver { final_score: u64 },

    /// To the resource: summary of a settled round for external storage.
    /// `timestamp` is milliseconds since the Unix epoch.
    RecordGameSession {
        user_id: String,
        player_name: String,
        total_score: u64,
        timestamp: u64,
    },

    /// To the resource: nobody is playing or waiting.
    WaitingForPlayers,

    /// Broadcast to non-resource sessions: the game is free to join.
    GameAvailable,

    /// To a newly registered non-resource session: whether a round is
    /// currently in progress.
    ConnectionStatus { is_active: bool },
}

/// Trims a requested display name and caps its length.
///
/// Blank names become `"Player"`. Truncation counts characters, not bytes,
/// so multi-byte names are never split mid-character.
pub fn normalize_display_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FALLBACK_DISPLAY_NAME.to_string();
    }
    trimmed.chars().take(MAX_DISPLAY_NAME_LEN).collect()
}

// =========================================================================
// Tests
// =========================================================================
