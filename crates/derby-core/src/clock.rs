//! Wall-clock time and lobby start-time computation.
//!
//! The lobby always starts on a fixed recurring boundary. Boundaries are
//! aligned to the Unix epoch in multiples of the configured interval, so a
//! 60-second interval lands on whole minutes with zero seconds and zero
//! milliseconds.
//!
//! Time is read through the [`Clock`] trait so the controller can be driven
//! by a [`ManualClock`] in tests.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Errors that can occur during start-time computation.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The recurring interval is zero or too large to represent.
    #[error("invalid start interval: {reason}")]
    InvalidInterval {
        /// Explanation of what is wrong with the interval.
        reason: String,
    },

    /// The next boundary would fall outside the representable time range.
    #[error("start time overflow after {now}")]
    Overflow {
        /// The instant the computation started from.
        now: DateTime<Utc>,
    },
}

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// Return the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move forward by `delta`. Saturates instead of overflowing.
    pub fn advance(&self, delta: TimeDelta) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = guard.checked_add_signed(delta).unwrap_or(*guard);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Compute the first start boundary strictly after `now`.
///
/// # Errors
///
/// Returns [`ClockError::InvalidInterval`] if `interval` is zero or does not
/// fit in milliseconds, and [`ClockError::Overflow`] if the boundary is out
/// of range.
pub fn next_start_time(now: DateTime<Utc>, interval: Duration) -> Result<DateTime<Utc>, ClockError> {
    let period_ms = i64::try_from(interval.as_millis()).map_err(|_err| {
        ClockError::InvalidInterval {
            reason: "interval exceeds i64 milliseconds".to_owned(),
        }
    })?;
    if period_ms <= 0 {
        return Err(ClockError::InvalidInterval {
            reason: "interval must be at least 1ms".to_owned(),
        });
    }

    let now_ms = now.timestamp_millis();
    // Floor division so instants before the epoch still round down.
    let current = now_ms.div_euclid(period_ms);
    let boundary_ms = current
        .checked_add(1)
        .and_then(|n| n.checked_mul(period_ms))
        .ok_or(ClockError::Overflow { now })?;

    DateTime::from_timestamp_millis(boundary_ms).ok_or(ClockError::Overflow { now })
}
