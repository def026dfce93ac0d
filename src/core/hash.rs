//! Track Digests
//!
//! SHA-256 digests over the obstacle stream a participant has emitted.
//! Two peers that agree on seed and call order produce identical digests,
//! which makes divergence visible in logs without sending the stream.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type TrackHash = [u8; 32];

/// Incremental hasher for an obstacle stream.
///
/// Order of updates is critical for determinism.
#[derive(Clone)]
pub struct TrackHasher {
    hasher: Sha256,
}

impl std::fmt::Debug for TrackHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackHasher").finish_non_exhaustive()
    }
}

impl Default for TrackHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackHasher {
    /// Domain separator for track digests.
    pub const DOMAIN: &'static [u8] = b"DINO_DUEL_TRACK_V1";

    /// Create a new hasher with domain separator.
    pub fn new() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(Self::DOMAIN);
        Self { hasher }
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Snapshot the digest without consuming the hasher.
    pub fn digest(&self) -> TrackHash {
        self.hasher.clone().finalize().into()
    }
}
