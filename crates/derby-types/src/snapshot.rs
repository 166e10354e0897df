//! Inspection and request/response shapes that are not broadcast.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Which half of the cycle the system is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum PhaseKind {
    /// Lobby accepting joins.
    Open,
    /// Race in progress; joins rejected.
    Running,
}

/// Whole-system view returned by the inspection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StateSnapshot {
    /// Current phase.
    pub phase: PhaseKind,
    /// Server time of the snapshot.
    pub now: DateTime<Utc>,
    /// Scheduled start of the open lobby (absent while running).
    pub start_time: Option<DateTime<Utc>>,
    /// Lobby members, sorted (empty while running).
    pub members: Vec<String>,
    /// Frozen participant list of the running race.
    pub participants: Option<Vec<String>>,
    /// Finish order so far of the running race.
    pub finish_order: Option<Vec<String>>,
    /// Ticks applied to the running race.
    pub tick: Option<u64>,
}

/// Successful join confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct JoinReceipt {
    /// The accepted (trimmed) name.
    pub name: String,
    /// When the lobby the name joined will start racing.
    pub start_time: DateTime<Utc>,
}
