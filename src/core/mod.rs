//! Core deterministic primitives.
//!
//! Everything in here must behave identically on both peers.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{SequenceGenerator, Seed};
pub use hash::{TrackHasher, TrackHash};
