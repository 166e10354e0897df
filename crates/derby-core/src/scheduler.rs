//! Timer tasks that drive the controller.
//!
//! Three independent loops run on the Tokio runtime:
//!
//! - **start check** (~1 s): starts the race once the lobby is due;
//! - **lobby refresh** (~5 s): re-announces the open lobby so client
//!   countdowns never stall on a missed event;
//! - **race ticker** (race tick period): sleeps until a race starts, then
//!   ticks it to completion, one tick at a time.
//!
//! Each loop takes the controller lock only for the duration of one
//! operation. Errors are logged and the loop carries on with the next
//! cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::DerbyConfig;
use crate::controller::{Advance, ControlError, Controller};

/// Periods of the three timer loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTimings {
    /// Start-check period.
    pub check_interval: Duration,
    /// Lobby re-announcement period.
    pub lobby_refresh_interval: Duration,
    /// Race tick period.
    pub tick_interval: Duration,
}

impl SchedulerTimings {
    /// Read the periods from a loaded configuration.
    pub const fn from_config(config: &DerbyConfig) -> Self {
        Self {
            check_interval: config.scheduler.check_interval(),
            lobby_refresh_interval: config.scheduler.lobby_refresh_interval(),
            tick_interval: config.race.tick_interval(),
        }
    }
}

impl Default for SchedulerTimings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(1),
            lobby_refresh_interval: Duration::from_secs(5),
            tick_interval: Duration::from_millis(500),
        }
    }
}

/// Handles to the spawned timer tasks.
#[derive(Debug)]
pub struct SchedulerHandles {
    start_check: JoinHandle<()>,
    lobby_refresh: JoinHandle<()>,
    race_ticker: JoinHandle<()>,
}

impl SchedulerHandles {
    /// Stop all three loops.
    pub fn abort(&self) {
        self.start_check.abort();
        self.lobby_refresh.abort();
        self.race_ticker.abort();
    }

    /// Whether any loop has exited.
    pub fn any_finished(&self) -> bool {
        self.start_check.is_finished()
            || self.lobby_refresh.is_finished()
            || self.race_ticker.is_finished()
    }
}

/// Spawn the three timer loops for `controller`.
pub fn spawn(controller: &Arc<Controller>, timings: SchedulerTimings) -> SchedulerHandles {
    info!(
        check_interval_ms = timings.check_interval.as_millis(),
        lobby_refresh_interval_ms = timings.lobby_refresh_interval.as_millis(),
        tick_interval_ms = timings.tick_interval.as_millis(),
        "scheduler starting"
    );

    SchedulerHandles {
        start_check: tokio::spawn(run_start_check(
            Arc::clone(controller),
            timings.check_interval,
        )),
        lobby_refresh: tokio::spawn(run_lobby_refresh(
            Arc::clone(controller),
            timings.lobby_refresh_interval,
        )),
        race_ticker: tokio::spawn(run_race_ticker(
            Arc::clone(controller),
            timings.tick_interval,
        )),
    }
}

fn interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run_start_check(controller: Arc<Controller>, period: Duration) {
    let mut timer = interval(period);
    loop {
        timer.tick().await;
        if let Err(e) = controller.poll_start().await {
            error!(error = %e, "scheduled race start failed");
        }
    }
}

async fn run_lobby_refresh(controller: Arc<Controller>, period: Duration) {
    let mut timer = interval(period);
    loop {
        timer.tick().await;
        controller.refresh_lobby().await;
    }
}

async fn run_race_ticker(controller: Arc<Controller>, period: Duration) {
    loop {
        controller.race_started().await;

        let mut timer = interval(period);
        // The first tick of a fresh interval fires immediately; consume it so
        // observers see the start state for one full period.
        timer.tick().await;

        loop {
            timer.tick().await;
            match controller.advance_race().await {
                Ok(Advance::Continued { .. }) => {}
                Ok(Advance::Finished(_)) => break,
                Err(ControlError::NoActiveRace) => {
                    warn!("race ticker woken with no race running");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "race tick failed");
                    break;
                }
            }
        }
    }
}
