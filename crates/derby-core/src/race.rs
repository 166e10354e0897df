//! The race engine.
//!
//! A [`Race`] is created from the lobby roster at the moment the lobby
//! closes. Each [`tick`](Race::tick) moves every unfinished participant
//! forward by a sampled step, clamped at the finish threshold. Participants
//! that land exactly on the threshold join the finish order in race order,
//! so same-tick ties always resolve by roster position.
//!
//! A race is complete when the finish order holds every participant. A
//! race with no participants is complete from the start.

use chrono::{DateTime, Utc};
use derby_types::{ParticipantProgress, Placement, RaceProgress, RaceResult, RaceStarted};

use crate::config::ConfigError;
use crate::sampler::ProgressSampler;

/// Invariant violations raised by the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RaceError {
    /// `tick` was called on a race that had already finished.
    #[error("race already complete after {ticks} ticks")]
    AlreadyComplete {
        /// Ticks applied before completion.
        ticks: u64,
    },
}

/// Validated engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceSettings {
    finish_threshold: u32,
    min_step: u32,
    max_step: u32,
}

impl RaceSettings {
    /// Build settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] unless
    /// `finish_threshold >= 1` and `1 <= min_step <= max_step`.
    pub fn new(finish_threshold: u32, min_step: u32, max_step: u32) -> Result<Self, ConfigError> {
        if finish_threshold == 0 {
            return Err(ConfigError::Invalid {
                reason: "race.finish_threshold must be at least 1".to_owned(),
            });
        }
        if min_step == 0 {
            return Err(ConfigError::Invalid {
                reason: "race.min_step must be at least 1".to_owned(),
            });
        }
        if min_step > max_step {
            return Err(ConfigError::Invalid {
                reason: format!("race.min_step ({min_step}) exceeds race.max_step ({max_step})"),
            });
        }
        Ok(Self {
            finish_threshold,
            min_step,
            max_step,
        })
    }

    /// Progress value that marks a participant finished.
    pub const fn finish_threshold(&self) -> u32 {
        self.finish_threshold
    }

    /// Smallest step.
    pub const fn min_step(&self) -> u32 {
        self.min_step
    }

    /// Largest step.
    pub const fn max_step(&self) -> u32 {
        self.max_step
    }
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            finish_threshold: 100,
            min_step: 1,
            max_step: 10,
        }
    }
}

/// Summary of one applied tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Tick number just applied (1-based).
    pub tick: u64,
    /// Participants that finished on this tick, in race order.
    pub newly_finished: Vec<String>,
    /// Whether the race is now complete.
    pub complete: bool,
}

/// One running race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Race {
    participants: Vec<String>,
    /// Parallel to `participants`.
    progress: Vec<u32>,
    /// Indices into `participants`.
    finish_order: Vec<usize>,
    started_at: DateTime<Utc>,
    ticks: u64,
    settings: RaceSettings,
}

impl Race {
    /// Start a race with `participants` frozen in the given order.
    pub fn start(participants: Vec<String>, now: DateTime<Utc>, settings: RaceSettings) -> Self {
        let progress = vec![0; participants.len()];
        Self {
            participants,
            progress,
            finish_order: Vec::new(),
            started_at: now,
            ticks: 0,
            settings,
        }
    }

    /// Advance every unfinished participant by one sampled step.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::AlreadyComplete`] without touching state if the
    /// race has already finished.
    pub fn tick(&mut self, sampler: &mut dyn ProgressSampler) -> Result<TickOutcome, RaceError> {
        if self.is_complete() {
            return Err(RaceError::AlreadyComplete { ticks: self.ticks });
        }

        let threshold = self.settings.finish_threshold;
        let (low, high) = (self.settings.min_step, self.settings.max_step);
        let mut newly_finished = Vec::new();

        for (idx, current) in self.progress.iter_mut().enumerate() {
            if *current >= threshold {
                continue;
            }
            let step = sampler.sample(low, high).clamp(low, high);
            *current = current.saturating_add(step).min(threshold);
            if *current == threshold {
                self.finish_order.push(idx);
                if let Some(name) = self.participants.get(idx) {
                    newly_finished.push(name.clone());
                }
            }
        }

        self.ticks = self.ticks.saturating_add(1);
        Ok(TickOutcome {
            tick: self.ticks,
            newly_finished,
            complete: self.is_complete(),
        })
    }

    /// True once every participant has finished (immediately for none).
    pub fn is_complete(&self) -> bool {
        self.finish_order.len() == self.participants.len()
    }

    /// Participants in race order.
    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    /// Names in finishing order so far.
    pub fn finish_order(&self) -> Vec<String> {
        self.finish_order
            .iter()
            .filter_map(|&idx| self.participants.get(idx).cloned())
            .collect()
    }

    /// Current progress of `name`, if it is a participant.
    pub fn progress_of(&self, name: &str) -> Option<u32> {
        self.participants
            .iter()
            .position(|p| p == name)
            .and_then(|idx| self.progress.get(idx).copied())
    }

    /// When the race started.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Ticks applied so far.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Engine parameters.
    pub const fn settings(&self) -> RaceSettings {
        self.settings
    }

    /// `race-start` payload.
    pub fn start_announcement(&self) -> RaceStarted {
        RaceStarted {
            participants: self.participants.clone(),
            started_at: self.started_at,
        }
    }

    /// Full progress snapshot, used for every tick and for late observers.
    pub fn progress_snapshot(&self, now: DateTime<Utc>) -> RaceProgress {
        let threshold = self.settings.finish_threshold;
        RaceProgress {
            tick: self.ticks,
            finish_threshold: threshold,
            progress: self
                .participants
                .iter()
                .zip(&self.progress)
                .map(|(name, &progress)| ParticipantProgress {
                    name: name.clone(),
                    progress,
                    finished: progress >= threshold,
                })
                .collect(),
            finish_order: self.finish_order(),
            timestamp: now,
        }
    }

    /// Final standings. Meaningful once [`is_complete`](Self::is_complete).
    pub fn result(&self, finished_at: DateTime<Utc>) -> RaceResult {
        let finish_order = self.finish_order();
        let placements = (1_u32..)
            .zip(&finish_order)
            .map(|(place, name)| Placement {
                place,
                name: name.clone(),
            })
            .collect();
        RaceResult {
            finish_order,
            placements,
            started_at: self.started_at,
            finished_at,
        }
    }
}
