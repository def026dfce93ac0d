//! Simulation Events and Presentation Output
//!
//! Events produced by a participant simulation during a command or tick,
//! plus the per-tick render frame handed to the presentation layer.

use serde::{Serialize, Deserialize};

use crate::game::avatar::{AvatarPose, AvatarState};
use crate::game::obstacle::ObstacleKind;
use crate::game::scheduler::SpawnedObstacle;
use crate::game::simulation::{Lifecycle, Role};

/// Sound effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    /// Round start / jump from the start screen
    ButtonPress,
    /// Score milestone reached
    Score,
    /// Collision
    Hit,
}

/// Something that happened to one participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// Lifecycle transition
    LifecycleChanged {
        /// Previous state
        from: Lifecycle,
        /// New state
        to: Lifecycle,
    },
    /// New obstacle appended to the track
    ObstacleSpawned(SpawnedObstacle),
    /// Displayed distance crossed a milestone
    Milestone {
        /// Displayed distance
        distance: u32,
    },
    /// Day/night inversion toggled
    Inverted {
        /// Night on
        on: bool,
    },
    /// Round ended in a collision (reported once per round)
    Crashed {
        /// Raw distance at the crash
        distance: f64,
        /// High score after locking this round in
        high_score: u32,
    },
    /// Sound to play
    Sound {
        /// Which effect
        cue: SoundCue,
    },
}

/// Obstacle as drawn.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleView {
    /// Obstacle type
    pub kind: ObstacleKind,
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Total width
    pub width: f64,
}

/// Everything the renderer needs for one participant this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Which track
    pub role: Role,
    /// Lifecycle state
    pub lifecycle: Lifecycle,
    /// Raw distance
    pub distance: f64,
    /// Displayed distance
    pub display_distance: u32,
    /// Current speed
    pub speed: f64,
    /// Avatar pose
    pub avatar: AvatarPose,
    /// Avatar flags
    pub avatar_state: AvatarState,
    /// Obstacles on the track
    pub obstacles: Vec<ObstacleView>,
    /// Ground line segment positions
    pub horizon: [f64; 2],
    /// Ground line segment textures (bumpy or flat)
    pub horizon_bumpy: [bool; 2],
    /// Night mode
    pub inverted: bool,
    /// Best score so far
    pub high_score: u32,
}

/// Presentation collaborator: drawing, audio and UI notices.
pub trait PresentationSink {
    /// Draw one participant's frame.
    fn render(&mut self, frame: &RenderFrame);

    /// Play a sound for a participant.
    fn play(&mut self, role: Role, cue: SoundCue);

    /// Show an error message from the relay.
    fn show_error(&mut self, _text: &str) {}

    /// Opponent joined or left; the start action is enabled only while joined.
    fn opponent_presence(&mut self, _joined: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_tagging() {
        let json = serde_json::to_string(&SimEvent::Milestone { distance: 100 }).unwrap();
        assert!(json.contains("\"event\":\"milestone\""));

        let json = serde_json::to_string(&SimEvent::Sound { cue: SoundCue::Hit }).unwrap();
        assert!(json.contains("hit"));
    }
}
