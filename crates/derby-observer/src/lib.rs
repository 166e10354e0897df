//! HTTP API and live event stream for Derby.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Join endpoint** (`POST /api/join`) for entering the open lobby
//! - **Force start** (`POST /api/force-start`), a dev-only shortcut that
//!   closes the lobby immediately
//! - **Read endpoints** for the whole-system state and the caller's lobby
//!   view
//! - **Server-Sent Events** (`GET /events`) carrying lobby and race
//!   announcements, starting with a point-in-time snapshot
//!
//! # Architecture
//!
//! Every handler goes through the shared [`Controller`], so HTTP requests
//! serialize with the timers on the controller's lock. The event stream
//! is a thin adapter over a [`Subscription`]; closing the connection
//! drops the subscription, which unregisters the observer.
//!
//! [`Controller`]: derby_core::Controller
//! [`Subscription`]: derby_core::Subscription

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod stream;
pub mod visitor;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
