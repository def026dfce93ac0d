//! Deterministic Sequence Generator
//!
//! Weyl-sequence-plus-xorshift-multiply generator (Mulberry32) over a single
//! 32-bit state. Both peers drive their obstacle streams from it, so the
//! mixing constants and the modulo-2^32 arithmetic must never change.

use serde::{Serialize, Deserialize};
use tracing::debug;

/// Weyl increment added to the state on every draw.
const WEYL_INCREMENT: u32 = 0x6D2B_79F5;

/// 2^32 as a float, used to map the mixed word into `[0, 1)`.
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Seed value (one per participant stream).
pub type Seed = u32;

/// Deterministic sequence generator.
///
/// # Determinism Guarantee
///
/// Given the same seed and the same sequence of `next(min, max)` calls,
/// produces identical outputs on every platform. Call order is part of
/// the contract: every call advances the state, whether or not the caller
/// uses the result.
///
/// # Example
///
/// ```
/// use dino_duel::core::rng::SequenceGenerator;
///
/// let mut rng = SequenceGenerator::new(32);
/// assert_eq!(rng.next(0, 1000), 388); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceGenerator {
    state: u32,
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SequenceGenerator {
    /// Create a generator with the given seed.
    pub const fn new(seed: Seed) -> Self {
        Self { state: seed }
    }

    /// Reset the internal state to `value`.
    pub fn seed(&mut self, value: Seed) {
        self.state = value;
    }

    /// Advance the state and return the mixed 32-bit output.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(WEYL_INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Advance the state and return a fraction in `[0, 1)`.
    #[inline]
    pub fn next_unit(&mut self) -> f64 {
        self.next_u32() as f64 / TWO_POW_32
    }

    /// Return an integer in `[min, max]` inclusive.
    ///
    /// `min > max` is a caller precondition violation: the call is rejected,
    /// returns `min` and leaves the state untouched.
    #[inline]
    pub fn next(&mut self, min: i32, max: i32) -> i32 {
        if min > max {
            debug!(min, max, "rejected inverted range");
            return min;
        }
        let span = (max as i64 - min as i64 + 1) as f64;
        (self.next_unit() * span).floor() as i32 + min
    }

    /// Current state (for checkpointing/debugging).
    pub fn state(&self) -> u32 {
        self.state
    }
}

// =============================================================================
// TESTS
// =============================================================================
