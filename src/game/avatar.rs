//! Avatar Command Interface
//!
//! The simulation only talks to the avatar through [`Avatar`]: jump/duck
//! commands, a jump-arc integration step and collision geometry.
//! [`ArcAvatar`] is the default runner with the classic jump arc.

use serde::{Serialize, Deserialize};

use crate::game::collision::CollisionBox;
use crate::game::config::RunnerConfig;

/// Avatar flags visible to the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarState {
    /// In the air
    pub jumping: bool,
    /// Ducking on the ground
    pub ducking: bool,
    /// Fast-falling after a duck press mid-jump
    pub speed_dropping: bool,
}

/// Animation status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvatarStatus {
    /// Running on the ground
    #[default]
    Running,
    /// In the air
    Jumping,
    /// Ducking
    Ducking,
    /// Hit an obstacle
    Crashed,
}

/// Pose handed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AvatarPose {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Current status
    pub status: AvatarStatus,
}

/// Command interface for a participant's avatar.
pub trait Avatar: Send {
    /// Begin a jump if on the ground.
    fn start_jump(&mut self, speed: f64);

    /// Release the jump; cuts the arc short once the minimum height is reached.
    fn end_jump(&mut self);

    /// Fall fast while in the air.
    fn set_speed_drop(&mut self);

    /// Stop fast-falling.
    fn clear_speed_drop(&mut self);

    /// Enter or leave the ducking pose.
    fn set_duck(&mut self, ducking: bool);

    /// Integrate the jump arc over `delta_ms`.
    fn update_jump(&mut self, delta_ms: f64);

    /// Freeze in the crashed pose.
    fn crash(&mut self);

    /// Back to the ground, running, with the jump counter cleared.
    fn reset(&mut self);

    /// Current flags.
    fn state(&self) -> AvatarState;

    /// Number of completed jumps since the last reset.
    fn jump_count(&self) -> u32;

    /// Renderer pose.
    fn pose(&self) -> AvatarPose;

    /// Outer box in track coordinates, inset by one pixel.
    fn outer_box(&self) -> CollisionBox;

    /// Detailed boxes relative to the outer box.
    fn collision_boxes(&self) -> &'static [CollisionBox];
}

// =============================================================================
// DEFAULT AVATAR
// =============================================================================

const WIDTH: f64 = 44.0;
const HEIGHT: f64 = 47.0;
const START_X: f64 = 50.0;
const GRAVITY: f64 = 0.6;
const INITIAL_JUMP_VELOCITY: f64 = -10.0;
const DROP_VELOCITY: f64 = -5.0;
const MIN_JUMP_HEIGHT: f64 = 30.0;
const MAX_JUMP_HEIGHT: f64 = 30.0;
const SPEED_DROP_COEFFICIENT: f64 = 3.0;
const JUMP_MS_PER_FRAME: f64 = 1000.0 / 60.0;

static RUNNING_BOXES: [CollisionBox; 6] = [
    CollisionBox::new(22.0, 0.0, 17.0, 16.0),
    CollisionBox::new(1.0, 18.0, 30.0, 9.0),
    CollisionBox::new(10.0, 35.0, 14.0, 8.0),
    CollisionBox::new(1.0, 24.0, 29.0, 5.0),
    CollisionBox::new(5.0, 30.0, 21.0, 4.0),
    CollisionBox::new(9.0, 34.0, 15.0, 4.0),
];

static DUCKING_BOXES: [CollisionBox; 1] = [CollisionBox::new(1.0, 18.0, 55.0, 25.0)];

/// Runner with the classic gravity jump arc.
#[derive(Debug, Clone)]
pub struct ArcAvatar {
    x: f64,
    y: f64,
    ground_y: f64,
    min_jump_y: f64,
    jump_velocity: f64,
    reached_min_height: bool,
    state: AvatarState,
    status: AvatarStatus,
    jump_count: u32,
}

impl ArcAvatar {
    /// Create an avatar standing on the ground of the configured track.
    pub fn new(config: &RunnerConfig) -> Self {
        let ground_y = config.track_height - HEIGHT - config.bottom_pad;
        Self {
            x: START_X,
            y: ground_y,
            ground_y,
            min_jump_y: ground_y - MIN_JUMP_HEIGHT,
            jump_velocity: 0.0,
            reached_min_height: false,
            state: AvatarState::default(),
            status: AvatarStatus::Running,
            jump_count: 0,
        }
    }

    /// Y coordinate of the ground.
    pub fn ground_y(&self) -> f64 {
        self.ground_y
    }
}

impl Avatar for ArcAvatar {
    fn start_jump(&mut self, speed: f64) {
        if self.state.jumping {
            return;
        }
        self.status = AvatarStatus::Jumping;
        self.jump_velocity = INITIAL_JUMP_VELOCITY - speed / 10.0;
        self.state.jumping = true;
        self.reached_min_height = false;
        self.state.speed_dropping = false;
    }

    fn end_jump(&mut self) {
        if self.reached_min_height && self.jump_velocity < DROP_VELOCITY {
            self.jump_velocity = DROP_VELOCITY;
        }
    }

    fn set_speed_drop(&mut self) {
        self.state.speed_dropping = true;
        self.jump_velocity = 1.0;
    }

    fn clear_speed_drop(&mut self) {
        self.state.speed_dropping = false;
    }

    fn set_duck(&mut self, ducking: bool) {
        if ducking && self.status != AvatarStatus::Ducking {
            self.status = AvatarStatus::Ducking;
            self.state.ducking = true;
        } else if !ducking && self.status == AvatarStatus::Ducking {
            self.status = AvatarStatus::Running;
            self.state.ducking = false;
        }
    }

    fn update_jump(&mut self, delta_ms: f64) {
        let frames_elapsed = delta_ms / JUMP_MS_PER_FRAME;

        if self.state.speed_dropping {
            self.y += (self.jump_velocity * SPEED_DROP_COEFFICIENT * frames_elapsed).round();
        } else {
            self.y += (self.jump_velocity * frames_elapsed).round();
        }

        self.jump_velocity += GRAVITY * frames_elapsed;

        if self.y < self.min_jump_y || self.state.speed_dropping {
            self.reached_min_height = true;
        }

        if self.y < MAX_JUMP_HEIGHT || self.state.speed_dropping {
            self.end_jump();
        }

        if self.y > self.ground_y {
            self.reset();
            self.jump_count += 1;
        }
    }

    fn crash(&mut self) {
        self.status = AvatarStatus::Crashed;
    }

    fn reset(&mut self) {
        self.y = self.ground_y;
        self.jump_velocity = 0.0;
        self.state = AvatarState::default();
        self.status = AvatarStatus::Running;
        self.jump_count = 0;
    }

    fn state(&self) -> AvatarState {
        self.state
    }

    fn jump_count(&self) -> u32 {
        self.jump_count
    }

    fn pose(&self) -> AvatarPose {
        AvatarPose { x: self.x, y: self.y, status: self.status }
    }

    fn outer_box(&self) -> CollisionBox {
        CollisionBox::new(self.x + 1.0, self.y + 1.0, WIDTH - 2.0, HEIGHT - 2.0)
    }

    fn collision_boxes(&self) -> &'static [CollisionBox] {
        if self.state.ducking {
            &DUCKING_BOXES
        } else {
            &RUNNING_BOXES
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar() -> ArcAvatar {
        ArcAvatar::new(&RunnerConfig::default())
    }

    fn land(avatar: &mut ArcAvatar) -> u32 {
        let mut frames = 0;
        while avatar.state().jumping {
            avatar.update_jump(JUMP_MS_PER_FRAME);
            frames += 1;
            assert!(frames < 1000, "jump never landed");
        }
        frames
    }

    #[test]
    fn test_ground_position() {
        let a = avatar();
        assert_eq!(a.ground_y(), 93.0);
        assert_eq!(a.pose().y, 93.0);
    }

    #[test]
    fn test_jump_lands_and_counts() {
        let mut a = avatar();
        a.start_jump(6.0);
        assert!(a.state().jumping);
        assert_eq!(a.pose().status, AvatarStatus::Jumping);

        land(&mut a);
        assert!(!a.state().jumping);
        assert_eq!(a.jump_count(), 1);
        assert_eq!(a.pose().y, a.ground_y());
    }

    #[test]
    fn test_start_jump_is_ignored_midair() {
        let mut a = avatar();
        a.start_jump(6.0);
        a.update_jump(JUMP_MS_PER_FRAME);
        let y = a.pose().y;
        a.start_jump(6.0);
        a.update_jump(0.0);
        assert_eq!(a.pose().y, y);
    }

    #[test]
    fn test_speed_drop_lands_sooner() {
        let mut full = avatar();
        full.start_jump(6.0);
        let full_frames = land(&mut full);

        let mut dropped = avatar();
        dropped.start_jump(6.0);
        for _ in 0..5 {
            dropped.update_jump(JUMP_MS_PER_FRAME);
        }
        dropped.set_speed_drop();
        let dropped_frames = land(&mut dropped) + 5;

        assert!(dropped_frames < full_frames);
    }

    #[test]
    fn test_duck_toggles() {
        let mut a = avatar();
        a.set_duck(true);
        assert!(a.state().ducking);
        assert_eq!(a.collision_boxes().len(), 1);

        a.set_duck(false);
        assert!(!a.state().ducking);
        assert_eq!(a.pose().status, AvatarStatus::Running);
    }

    #[test]
    fn test_reset_clears_jump_count() {
        let mut a = avatar();
        a.start_jump(6.0);
        land(&mut a);
        a.reset();
        assert_eq!(a.jump_count(), 0);
    }
}
