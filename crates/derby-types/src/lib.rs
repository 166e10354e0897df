//! Shared type definitions for the Derby lobby/race cycle.
//!
//! This crate is the single source of truth for everything that crosses a
//! crate or process boundary: observer and visitor identifiers, the four
//! broadcast event payloads, and the inspection snapshot. Types flow to
//! `TypeScript` via `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`ids`] -- Observer and visitor identifiers
//! - [`events`] -- Broadcast event kinds and payloads
//! - [`snapshot`] -- Inspection snapshot and join receipt

pub mod events;
pub mod ids;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use events::{
    EventKind, LobbySnapshot, ParticipantProgress, Placement, RaceEvent, RaceProgress, RaceResult,
    RaceStarted,
};
pub use ids::{ObserverId, VisitorId};
pub use snapshot::{JoinReceipt, PhaseKind, StateSnapshot};
