//! Derby server binary.
//!
//! Wires the controller, its timers, and the HTTP API together and runs
//! until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `DERBY_CONFIG` (default `derby-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the controller with the first lobby
//! 4. Spawn the start-check, lobby-refresh and race-ticker loops
//! 5. Bind and serve the HTTP API
//! 6. Wait for `Ctrl-C`, then stop the loops and the server

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use derby_core::clock::{Clock, SystemClock};
use derby_core::config::{DerbyConfig, LoggingConfig};
use derby_core::sampler::RandomSampler;
use derby_core::scheduler::{self, SchedulerTimings};
use derby_core::{BroadcastHub, Controller, CycleSettings};
use derby_observer::{AppState, ServerConfig, spawn_observer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config path used when `DERBY_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "derby-config.yaml";

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, source) = load_config()?;

    // 2. Initialize tracing.
    init_tracing(&config.logging);
    info!(
        source = %source.display(),
        interval_seconds = config.lobby.interval_seconds,
        finish_threshold = config.race.finish_threshold,
        tick_interval_ms = config.race.tick_interval_ms,
        "Configuration loaded"
    );

    // 3. Controller.
    let settings = CycleSettings::from_config(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let controller = Arc::new(Controller::new(
        settings,
        clock,
        Box::new(RandomSampler::new(config.race.seed)),
        BroadcastHub::new(config.observer.stream_buffer),
    )?);

    // 4. Timers.
    let timers = scheduler::spawn(&controller, SchedulerTimings::from_config(&config));

    // 5. HTTP API.
    if config.observer.allow_force_start {
        warn!("force start endpoint is enabled");
    }
    let state = Arc::new(AppState::new(
        Arc::clone(&controller),
        config.observer.allow_force_start,
    ));
    let server = spawn_observer(&ServerConfig::from_config(&config.observer), state).await?;

    // 6. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    timers.abort();
    server.abort();

    Ok(())
}

/// Load configuration from `DERBY_CONFIG` or the default path.
///
/// A missing file means built-in defaults (plus environment overrides).
fn load_config() -> Result<(DerbyConfig, PathBuf), EngineError> {
    let path = std::env::var_os("DERBY_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        let config = DerbyConfig::from_file(&path)?;
        Ok((config, path))
    } else {
        let mut config = DerbyConfig::default();
        config.observer.apply_env_overrides();
        config.validate()?;
        Ok((config, PathBuf::from("<defaults>")))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
