//! Distance Meter
//!
//! Converts raw distance into displayed score units and reports milestones.

/// Raw distance to displayed units.
pub const DISTANCE_COEFFICIENT: f64 = 0.025;

/// Displayed units between milestone sounds.
pub const ACHIEVEMENT_DISTANCE: u32 = 100;

/// Displayed distance for a raw distance.
#[inline]
pub fn actual_distance(distance_ran: f64) -> u32 {
    if distance_ran <= 0.0 {
        return 0;
    }
    (distance_ran.ceil() * DISTANCE_COEFFICIENT).round() as u32
}

/// Tracks milestones and the high score across rounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistanceMeter {
    last_milestone: u32,
    high_score: u32,
}

impl DistanceMeter {
    /// Create a fresh meter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a milestone the first time each multiple of
    /// [`ACHIEVEMENT_DISTANCE`] is reached.
    pub fn update(&mut self, distance_ran: f64) -> Option<u32> {
        let distance = actual_distance(distance_ran);
        if distance > 0
            && distance % ACHIEVEMENT_DISTANCE == 0
            && distance > self.last_milestone
        {
            self.last_milestone = distance;
            return Some(distance);
        }
        None
    }

    /// Lock in the score of a finished round. Returns the high score.
    pub fn record(&mut self, distance_ran: f64) -> u32 {
        let score = distance_ran.max(0.0).ceil() as u32;
        self.high_score = self.high_score.max(score);
        self.high_score
    }

    /// Best score so far.
    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    /// Clear milestones for a new round, keeping the high score.
    pub fn reset(&mut self) {
        self.last_milestone = 0;
    }
}
