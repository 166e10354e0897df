//! Events pushed to observers.
//!
//! Every state change the controller makes is announced as one of four
//! [`RaceEvent`] variants. On the wire an event is a pair: the
//! [`EventKind`] (used as the stream's event name) and the JSON-encoded
//! payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The four kinds of announcement an observer can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// Lobby membership or countdown changed (or a periodic refresh).
    LobbyUpdate,
    /// The lobby closed and a race began.
    RaceStart,
    /// One race tick completed.
    RaceUpdate,
    /// Every participant crossed the finish threshold.
    RaceComplete,
}

impl EventKind {
    /// Wire name of this kind, e.g. `"race-update"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LobbyUpdate => "lobby-update",
            Self::RaceStart => "race-start",
            Self::RaceUpdate => "race-update",
            Self::RaceComplete => "race-complete",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the open lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LobbySnapshot {
    /// Member names, sorted case-insensitively.
    pub members: Vec<String>,
    /// When the lobby turns into a race.
    pub start_time: DateTime<Utc>,
    /// Server time the snapshot was taken, so clients can correct drift.
    pub now: DateTime<Utc>,
    /// Whether the receiving visitor already has a name in this lobby.
    pub you_joined: bool,
}

/// Payload of a `race-start` announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RaceStarted {
    /// Participants in their frozen race order.
    pub participants: Vec<String>,
    /// When the race began.
    pub started_at: DateTime<Utc>,
}

/// Progress of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ParticipantProgress {
    /// Participant name.
    pub name: String,
    /// Distance covered, never above the finish threshold.
    pub progress: u32,
    /// Whether the participant has reached the finish threshold.
    pub finished: bool,
}

/// Payload of a `race-update` announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RaceProgress {
    /// Number of ticks applied so far (0 before the first tick).
    pub tick: u64,
    /// Progress value that marks a participant as finished.
    pub finish_threshold: u32,
    /// Per-participant progress in race order.
    pub progress: Vec<ParticipantProgress>,
    /// Participants that have finished, in finishing order.
    pub finish_order: Vec<String>,
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// A final standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Placement {
    /// 1-based finishing position.
    pub place: u32,
    /// Participant name.
    pub name: String,
}

/// Payload of a `race-complete` announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RaceResult {
    /// Every participant, in finishing order.
    pub finish_order: Vec<String>,
    /// Placements 1..N matching `finish_order`.
    pub placements: Vec<Placement>,
    /// When the race began.
    pub started_at: DateTime<Utc>,
    /// When the last participant finished.
    pub finished_at: DateTime<Utc>,
}

/// A state-change announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum RaceEvent {
    /// See [`EventKind::LobbyUpdate`].
    LobbyUpdate(LobbySnapshot),
    /// See [`EventKind::RaceStart`].
    RaceStart(RaceStarted),
    /// See [`EventKind::RaceUpdate`].
    RaceUpdate(RaceProgress),
    /// See [`EventKind::RaceComplete`].
    RaceComplete(RaceResult),
}

impl RaceEvent {
    /// The kind of this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::LobbyUpdate(_) => EventKind::LobbyUpdate,
            Self::RaceStart(_) => EventKind::RaceStart,
            Self::RaceUpdate(_) => EventKind::RaceUpdate,
            Self::RaceComplete(_) => EventKind::RaceComplete,
        }
    }

    /// Serialize only the payload (without the kind tag).
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::LobbyUpdate(p) => serde_json::to_string(p),
            Self::RaceStart(p) => serde_json::to_string(p),
            Self::RaceUpdate(p) => serde_json::to_string(p),
            Self::RaceComplete(p) => serde_json::to_string(p),
        }
    }
}
