//! Injectable randomness for skill selection.
//!
//! The random selection policy draws through [`RandomSource`] so tests can
//! script the exact candidate chosen and the CLI can reproduce a run from a
//! seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A source of uniform indices.
pub trait RandomSource: Send {
    /// Returns an index in `0..len`.
    ///
    /// Returns 0 when `len` is 0.
    fn pick(&mut self, len: usize) -> usize;
}

/// Reproducible randomness from a 64-bit seed.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    /// Creates a source seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.rng.gen_range(0..len)
    }
}

/// OS-seeded randomness, drawn from the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..len)
    }
}

/// Scripted indices, replayed in order and cycled when exhausted.
///
/// Each scripted value is reduced modulo `len`.
#[derive(Debug, Clone)]
pub struct FixedSequence {
    values: Vec<usize>,
    cursor: usize,
}

impl FixedSequence {
    /// Creates a source that replays `values`.
    #[must_use]
    pub fn new(values: impl Into<Vec<usize>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }
}

impl RandomSource for FixedSequence {
    fn pick(&mut self, len: usize) -> usize {
        if len == 0 || self.values.is_empty() {
            return 0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor = self.cursor.wrapping_add(1);
        value % len
    }
}
