//! Sources of per-tick progress amounts.
//!
//! The race engine asks a [`ProgressSampler`] how far each unfinished
//! participant moves on a tick. Production uses [`RandomSampler`]; tests
//! swap in [`FixedSampler`] or [`SequenceSampler`] to get exact finish
//! orders.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A source of step sizes.
pub trait ProgressSampler: Send {
    /// Return a value in `low..=high`.
    ///
    /// Callers clamp the result into range, so implementations that
    /// ignore the bounds still yield legal steps.
    fn sample(&mut self, low: u32, high: u32) -> u32;
}

/// Uniform random steps from a small, fast RNG.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: SmallRng,
}

impl RandomSampler {
    /// Seed from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Seed deterministically.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Seed from `seed` when given, OS entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }
}

impl ProgressSampler for RandomSampler {
    fn sample(&mut self, low: u32, high: u32) -> u32 {
        if low >= high {
            return low;
        }
        self.rng.random_range(low..=high)
    }
}

/// Always the same step.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub u32);

impl ProgressSampler for FixedSampler {
    fn sample(&mut self, _low: u32, _high: u32) -> u32 {
        self.0
    }
}

/// Cycles through a fixed list of steps.
///
/// An empty list behaves like always returning the lower bound.
#[derive(Debug, Clone)]
pub struct SequenceSampler {
    steps: Vec<u32>,
    next: usize,
}

impl SequenceSampler {
    /// Cycle through `steps` in order.
    pub const fn new(steps: Vec<u32>) -> Self {
        Self { steps, next: 0 }
    }
}

impl ProgressSampler for SequenceSampler {
    fn sample(&mut self, low: u32, _high: u32) -> u32 {
        let Some(&step) = self.steps.get(self.next) else {
            return low;
        };
        self.next = self.next.saturating_add(1);
        if self.next >= self.steps.len() {
            self.next = 0;
        }
        step
    }
}
