//! Horizon Ground Line
//!
//! Two track-wide segments scroll left. When one leaves the screen it wraps
//! behind the other and draws a flat or bumpy texture from the participant's
//! sequence generator, so it is part of the stream's call order.

use crate::core::rng::SequenceGenerator;
use crate::game::config::RunnerConfig;

/// Probability threshold for a bumpy segment.
const BUMP_THRESHOLD: f64 = 0.5;

/// Scrolling ground line.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonLine {
    width: f64,
    x: [f64; 2],
    bumpy: [bool; 2],
}

impl HorizonLine {
    /// Create a ground line spanning the track.
    pub fn new(config: &RunnerConfig) -> Self {
        let width = config.track_width;
        Self { width, x: [0.0, width], bumpy: [false, false] }
    }

    /// Scroll for `delta_ms` at `speed`. Returns true if a segment wrapped.
    pub fn update(
        &mut self,
        delta_ms: f64,
        speed: f64,
        rng: &mut SequenceGenerator,
        config: &RunnerConfig,
    ) -> bool {
        let increment = config.scroll_increment(speed, delta_ms);
        let lead = if self.x[0] <= 0.0 { 0 } else { 1 };
        self.scroll(lead, increment, rng)
    }

    fn scroll(&mut self, lead: usize, increment: f64, rng: &mut SequenceGenerator) -> bool {
        let trail = 1 - lead;

        self.x[lead] -= increment;
        self.x[trail] = self.x[lead] + self.width;

        if self.x[lead] <= -self.width {
            self.x[lead] += self.width * 2.0;
            self.x[trail] = self.x[lead] - self.width;
            self.bumpy[lead] = rng.next(0, 1000) as f64 / 1000.0 > BUMP_THRESHOLD;
            return true;
        }
        false
    }

    /// Segment positions.
    pub fn positions(&self) -> [f64; 2] {
        self.x
    }

    /// Segment textures.
    pub fn bumpy(&self) -> [bool; 2] {
        self.bumpy
    }

    /// Back to the starting position, both segments flat.
    pub fn reset(&mut self) {
        self.x = [0.0, self.width];
        self.bumpy = [false, false];
    }
}
