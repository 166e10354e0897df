//! Lobby/race state machine, timers and observer fan-out for Derby.
//!
//! This crate owns the recurring cycle: an open lobby collects names until
//! its scheduled start time, becomes a race that ticks until everyone
//! finishes, then reopens with a freshly computed start time.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait, system and manual clocks, and the
//!   recurring start-time boundary.
//! - [`config`] -- Configuration loading from `derby-config.yaml` into
//!   strongly-typed structs.
//! - [`lobby`] -- The pre-race roster and join validation.
//! - [`race`] -- The race engine.
//! - [`sampler`] -- [`ProgressSampler`] trait and its random and
//!   deterministic implementations.
//! - [`hub`] -- Observer registry and best-effort fan-out.
//! - [`controller`] -- The state machine tying the above together.
//! - [`scheduler`] -- Timer tasks that drive the controller.
//!
//! [`Clock`]: clock::Clock
//! [`ProgressSampler`]: sampler::ProgressSampler

pub mod clock;
pub mod config;
pub mod controller;
pub mod hub;
pub mod lobby;
pub mod race;
pub mod sampler;
pub mod scheduler;

pub use controller::{Advance, ControlError, Controller, CycleSettings};
pub use hub::{Announcement, BroadcastHub, Subscription};
pub use lobby::LobbyError;
