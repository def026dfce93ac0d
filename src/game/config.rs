//! Runner Configuration
//!
//! Tuning constants shared by every participant simulation. Both peers must
//! run with identical values or their obstacle streams diverge.

use serde::{Serialize, Deserialize};

/// Configuration for a participant simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Speed gained per tick while running.
    pub acceleration: f64,
    /// Speed at round start.
    pub initial_speed: f64,
    /// Speed cap.
    pub max_speed: f64,
    /// Converts obstacle min gap into trailing clearance.
    pub gap_coefficient: f64,
    /// Upper gap bound relative to the lower bound.
    pub max_gap_coefficient: f64,
    /// Milliseconds of running before obstacles appear (ms).
    pub clear_time: f64,
    /// Actual distance between day/night inversions.
    pub invert_distance: u32,
    /// How long an inversion lasts (ms).
    pub invert_fade_duration: f64,
    /// Maximum consecutive repeats of one obstacle type.
    pub max_obstacle_duplication: usize,
    /// Maximum obstacle group size.
    pub max_obstacle_length: i32,
    /// Redraws before the scheduler falls back to a deterministic pick.
    pub scheduler_retry_cap: u32,
    /// Visible track width.
    pub track_width: f64,
    /// Visible track height.
    pub track_height: f64,
    /// Padding below the avatar's feet.
    pub bottom_pad: f64,
    /// Reference frame rate used to scale per-frame quantities.
    pub fps: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            acceleration: 0.001,
            initial_speed: 6.0,
            max_speed: 13.0,
            gap_coefficient: 0.6,
            max_gap_coefficient: 1.5,
            clear_time: 3000.0,
            invert_distance: 700,
            invert_fade_duration: 12000.0,
            max_obstacle_duplication: 2,
            max_obstacle_length: 3,
            scheduler_retry_cap: 16,
            track_width: 600.0,
            track_height: 150.0,
            bottom_pad: 10.0,
            fps: 60.0,
        }
    }
}

impl RunnerConfig {
    /// Milliseconds per reference frame.
    #[inline]
    pub fn ms_per_frame(&self) -> f64 {
        1000.0 / self.fps
    }

    /// Pixels scrolled for `delta_ms` at `speed`.
    #[inline]
    pub fn scroll_increment(&self, speed: f64, delta_ms: f64) -> f64 {
        (speed * (self.fps / 1000.0) * delta_ms).floor()
    }

    /// Load from a JSON document; missing fields keep their defaults.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let config = RunnerConfig::default();
        assert_eq!(config.max_obstacle_duplication, 2);
        assert_eq!(config.invert_distance, 700);
        assert!((config.ms_per_frame() - 16.666_666).abs() < 1e-3);
    }

    #[test]
    fn test_scroll_increment_floors() {
        let config = RunnerConfig::default();
        // 6 * 0.06 * 16 = 5.76
        assert_eq!(config.scroll_increment(6.0, 16.0), 5.0);
        assert_eq!(config.scroll_increment(6.0, 0.0), 0.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RunnerConfig::from_json(r#"{"max_speed": 20.0}"#).unwrap();
        assert_eq!(config.max_speed, 20.0);
        assert_eq!(config.initial_speed, 6.0);
    }
}
