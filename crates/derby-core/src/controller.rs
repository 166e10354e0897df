//! The lobby/race state machine.
//!
//! [`Controller`] is the single owner of "which phase are we in". The phase
//! and the progress sampler live behind one async mutex; every operation
//! takes the lock, mutates, publishes its announcements, and only then
//! releases it. That gives three guarantees:
//!
//! - joins, ticks and the two transitions never interleave;
//! - a join accepted while open is in every later lobby update and in the
//!   next race's frozen roster;
//! - an observer's initial snapshot is ordered consistently with the
//!   broadcasts around it.
//!
//! The controller never sleeps. Timing comes from the tasks in
//! [`scheduler`](crate::scheduler), which call [`Controller::poll_start`],
//! [`Controller::refresh_lobby`] and [`Controller::advance_race`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use derby_types::{
    JoinReceipt, LobbySnapshot, PhaseKind, RaceEvent, RaceResult, RaceStarted, StateSnapshot,
    VisitorId,
};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use crate::clock::{self, Clock, ClockError};
use crate::config::{ConfigError, DerbyConfig};
use crate::hub::{BroadcastHub, Subscription};
use crate::lobby::{Lobby, LobbyError};
use crate::race::{Race, RaceError, RaceSettings};
use crate::sampler::ProgressSampler;

/// Errors surfaced by controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// A caller-facing rejection (e.g. force start while running).
    #[error(transparent)]
    Rejected(#[from] LobbyError),

    /// A race operation was attempted with no race running.
    #[error("no race is running")]
    NoActiveRace,

    /// The race engine refused the operation.
    #[error("race error: {source}")]
    Race {
        /// The underlying engine error.
        #[from]
        source: RaceError,
    },

    /// The next start time could not be computed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Fixed parameters of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSettings {
    /// Lobbies start on multiples of this interval.
    pub start_interval: Duration,
    /// Longest accepted display name, in characters.
    pub max_name_length: usize,
    /// Race engine parameters.
    pub race: RaceSettings,
}

impl CycleSettings {
    /// Extract the cycle settings from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the race settings are unusable.
    pub fn from_config(config: &DerbyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            start_interval: config.lobby.interval(),
            max_name_length: config.lobby.max_name_length,
            race: config.race.settings()?,
        })
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            start_interval: Duration::from_secs(60),
            max_name_length: 20,
            race: RaceSettings::default(),
        }
    }
}

/// Result of one [`Controller::advance_race`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The tick was applied; the race continues.
    Continued {
        /// Tick number just applied.
        tick: u64,
    },
    /// The tick finished the race and the lobby has reopened.
    Finished(RaceResult),
}

#[derive(Debug)]
enum Phase {
    Open(Lobby),
    Running(Race),
}

struct State {
    phase: Phase,
    sampler: Box<dyn ProgressSampler>,
}

/// Coordinates the lobby, the race engine and the broadcast hub.
pub struct Controller {
    state: Mutex<State>,
    hub: BroadcastHub,
    clock: Arc<dyn Clock>,
    settings: CycleSettings,
    race_started: Notify,
}

impl core::fmt::Debug for Controller {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("settings", &self.settings)
            .field("observers", &self.hub.observer_count())
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Create a controller with an open, empty lobby scheduled on the next
    /// boundary after the clock's current time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError`] if the first start time cannot be computed.
    pub fn new(
        settings: CycleSettings,
        clock: Arc<dyn Clock>,
        sampler: Box<dyn ProgressSampler>,
        hub: BroadcastHub,
    ) -> Result<Self, ClockError> {
        let start_time = clock::next_start_time(clock.now(), settings.start_interval)?;
        info!(%start_time, "lobby open");
        Ok(Self {
            state: Mutex::new(State {
                phase: Phase::Open(Lobby::new(start_time, settings.max_name_length)),
                sampler,
            }),
            hub,
            clock,
            settings,
            race_started: Notify::new(),
        })
    }

    /// The broadcast hub observers are registered with.
    pub const fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// The cycle settings.
    pub const fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Current time according to the controller's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // External requests
    // -----------------------------------------------------------------------

    /// Add `name` to the open lobby on behalf of `visitor`.
    ///
    /// # Errors
    ///
    /// [`LobbyError::RaceInProgress`] while running, otherwise whatever
    /// [`Lobby::try_join`] rejects with.
    pub async fn join(&self, name: &str, visitor: &VisitorId) -> Result<JoinReceipt, LobbyError> {
        let mut state = self.state.lock().await;
        let Phase::Open(lobby) = &mut state.phase else {
            return Err(LobbyError::RaceInProgress);
        };

        let receipt = lobby.try_join(name, visitor)?;
        info!(name = receipt.name, members = lobby.len(), "participant joined");
        self.hub.publish_lobby(lobby, self.clock.now());
        Ok(receipt)
    }

    /// Close the lobby now, ignoring its scheduled start time.
    ///
    /// # Errors
    ///
    /// [`ControlError::Rejected`] with [`LobbyError::RaceInProgress`] if a
    /// race is already running.
    pub async fn force_start(&self) -> Result<RaceStarted, ControlError> {
        let mut state = self.state.lock().await;
        if matches!(state.phase, Phase::Running(_)) {
            return Err(LobbyError::RaceInProgress.into());
        }
        info!("force start requested");
        self.begin_race(&mut state, self.clock.now())
    }

    /// Register an observer and hand it the current state immediately.
    pub async fn subscribe(&self, visitor: Option<VisitorId>) -> Subscription {
        let state = self.state.lock().await;
        let now = self.clock.now();
        let initial = match &state.phase {
            Phase::Open(lobby) => RaceEvent::LobbyUpdate(lobby.snapshot_for(visitor.as_ref(), now)),
            Phase::Running(race) => RaceEvent::RaceUpdate(race.progress_snapshot(now)),
        };
        self.hub.subscribe(visitor, &initial)
    }

    /// Lobby view for one visitor.
    ///
    /// # Errors
    ///
    /// [`LobbyError::RaceInProgress`] while running.
    pub async fn lobby_snapshot_for(&self, visitor: &VisitorId) -> Result<LobbySnapshot, LobbyError> {
        let state = self.state.lock().await;
        match &state.phase {
            Phase::Open(lobby) => Ok(lobby.snapshot_for(Some(visitor), self.clock.now())),
            Phase::Running(_) => Err(LobbyError::RaceInProgress),
        }
    }

    /// Whole-system view for inspection.
    pub async fn state_snapshot(&self) -> StateSnapshot {
        let state = self.state.lock().await;
        let now = self.clock.now();
        match &state.phase {
            Phase::Open(lobby) => StateSnapshot {
                phase: PhaseKind::Open,
                now,
                start_time: Some(lobby.start_time()),
                members: lobby.sorted_members(),
                participants: None,
                finish_order: None,
                tick: None,
            },
            Phase::Running(race) => StateSnapshot {
                phase: PhaseKind::Running,
                now,
                start_time: None,
                members: Vec::new(),
                participants: Some(race.participants().to_vec()),
                finish_order: Some(race.finish_order()),
                tick: Some(race.ticks()),
            },
        }
    }

    /// Which phase the system is in.
    pub async fn phase(&self) -> PhaseKind {
        match self.state.lock().await.phase {
            Phase::Open(_) => PhaseKind::Open,
            Phase::Running(_) => PhaseKind::Running,
        }
    }

    // -----------------------------------------------------------------------
    // Timer entry points
    // -----------------------------------------------------------------------

    /// Start the race if the lobby is open and due. Returns whether a race
    /// was started.
    ///
    /// Safe to call repeatedly: the phase itself is the guard, so a second
    /// call while running (or before the start time) is a no-op.
    pub async fn poll_start(&self) -> Result<bool, ControlError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let due = matches!(&state.phase, Phase::Open(lobby) if lobby.is_due(now));
        if !due {
            return Ok(false);
        }
        self.begin_race(&mut state, now)?;
        Ok(true)
    }

    /// Re-announce the open lobby so countdowns stay fresh. Suppressed
    /// while running. Returns whether an announcement went out.
    pub async fn refresh_lobby(&self) -> bool {
        let state = self.state.lock().await;
        match &state.phase {
            Phase::Open(lobby) => {
                let delivered = self.hub.publish_lobby(lobby, self.clock.now());
                debug!(delivered, "lobby refreshed");
                true
            }
            Phase::Running(_) => false,
        }
    }

    /// Apply one race tick and announce it. Completing the race reopens
    /// the lobby within the same call.
    ///
    /// # Errors
    ///
    /// [`ControlError::NoActiveRace`] if the lobby is open. This is a
    /// caller bug; no state changes.
    pub async fn advance_race(&self) -> Result<Advance, ControlError> {
        let mut state = self.state.lock().await;
        let State { phase, sampler } = &mut *state;
        let Phase::Running(race) = phase else {
            return Err(ControlError::NoActiveRace);
        };

        let outcome = race.tick(sampler.as_mut())?;
        let now = self.clock.now();
        self.hub
            .publish(&RaceEvent::RaceUpdate(race.progress_snapshot(now)));
        debug!(
            tick = outcome.tick,
            finished = ?outcome.newly_finished,
            "race tick"
        );

        if outcome.complete {
            let result = self.finish_race(&mut state, now)?;
            Ok(Advance::Finished(result))
        } else {
            Ok(Advance::Continued { tick: outcome.tick })
        }
    }

    /// Resolve once a race has started that needs ticking.
    ///
    /// Backed by a [`Notify`] permit, so a start that happens before the
    /// ticker starts waiting is not lost.
    pub async fn race_started(&self) {
        self.race_started.notified().await;
    }

    // -----------------------------------------------------------------------
    // Transitions (caller holds the lock)
    // -----------------------------------------------------------------------

    /// Open -> Running.
    fn begin_race(&self, state: &mut State, now: DateTime<Utc>) -> Result<RaceStarted, ControlError> {
        let Phase::Open(lobby) = &state.phase else {
            return Err(LobbyError::RaceInProgress.into());
        };

        let race = Race::start(lobby.members().to_vec(), now, self.settings.race);
        let started = race.start_announcement();
        let instant = race.is_complete();
        state.phase = Phase::Running(race);

        info!(participants = started.participants.len(), "race started");
        self.hub.publish(&RaceEvent::RaceStart(started.clone()));

        if instant {
            // Nobody to move: complete without any tick.
            self.finish_race(state, now)?;
        } else {
            self.race_started.notify_one();
        }
        Ok(started)
    }

    /// Running -> Open.
    fn finish_race(&self, state: &mut State, now: DateTime<Utc>) -> Result<RaceResult, ControlError> {
        let Phase::Running(race) = &state.phase else {
            return Err(ControlError::NoActiveRace);
        };

        // Compute before touching anything so a failure leaves state intact.
        let next_start = clock::next_start_time(now, self.settings.start_interval)?;
        let result = race.result(now);

        info!(finish_order = ?result.finish_order, ticks = race.ticks(), "race complete");
        self.hub.publish(&RaceEvent::RaceComplete(result.clone()));

        let lobby = Lobby::new(next_start, self.settings.max_name_length);
        self.hub.publish_lobby(&lobby, now);
        state.phase = Phase::Open(lobby);
        info!(start_time = %next_start, "lobby open");

        Ok(result)
    }
}
