//! Participant Simulation
//!
//! One side's game: either the local player or the mirrored copy of the
//! opponent. Advances purely from elapsed time and the participant's own
//! sequence generator; the session only sends commands into it.
//!
//! ## Lifecycle
//!
//! ```text
//! NotStarted ──start──▶ Intro ──first jump lands──▶ Running ⇄ Paused
//!                         │                           │        │
//!                         └──────────crash────────────┴────────┴──▶ Crashed
//! Crashed ──start──▶ Intro
//! ```

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::hash::TrackHash;
use crate::core::rng::SequenceGenerator;
use crate::game::avatar::{ArcAvatar, Avatar};
use crate::game::collision::check_for_collision;
use crate::game::config::RunnerConfig;
use crate::game::events::{ObstacleView, RenderFrame, SimEvent, SoundCue};
use crate::game::horizon::HorizonLine;
use crate::game::meter::{actual_distance, DistanceMeter};
use crate::game::scheduler::ObstacleScheduler;

/// Which side a simulation represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Driven by this peer's input
    Local,
    /// Mirror of the opponent, driven by protocol messages
    Remote,
}

impl Role {
    /// Index into per-role arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Role::Local => 0,
            Role::Remote => 1,
        }
    }
}

/// Participant lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Never started
    #[default]
    NotStarted,
    /// Round started, waiting for the opening jump to land
    Intro,
    /// Track moving
    Running,
    /// Stopped without a crash
    Paused,
    /// Hit an obstacle; only `start` leaves this state
    Crashed,
}

impl Lifecycle {
    /// Whether ticks advance this participant.
    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, Lifecycle::Intro | Lifecycle::Running)
    }
}

/// Input channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputChannel {
    /// Jump button
    Jump,
    /// Duck button
    Duck,
}

/// A press or release of one input channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputEdge {
    /// Pressed (true) or released (false)
    pub down: bool,
    /// Which button
    pub channel: InputChannel,
}

impl InputEdge {
    /// Press.
    pub const fn down(channel: InputChannel) -> Self {
        Self { down: true, channel }
    }

    /// Release.
    pub const fn up(channel: InputChannel) -> Self {
        Self { down: false, channel }
    }
}

/// One participant's simulation.
pub struct ParticipantSimulation {
    role: Role,
    config: RunnerConfig,
    lifecycle: Lifecycle,
    current_speed: f64,
    distance_ran: f64,
    running_time: f64,
    invert_timer: f64,
    inverted: bool,
    avatar: Box<dyn Avatar>,
    scheduler: ObstacleScheduler,
    horizon: HorizonLine,
    meter: DistanceMeter,
    rounds: u32,
}

impl std::fmt::Debug for ParticipantSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantSimulation")
            .field("role", &self.role)
            .field("lifecycle", &self.lifecycle)
            .field("current_speed", &self.current_speed)
            .field("distance_ran", &self.distance_ran)
            .field("rounds", &self.rounds)
            .finish_non_exhaustive()
    }
}

impl ParticipantSimulation {
    /// Create a simulation with the default avatar.
    pub fn new(role: Role, config: RunnerConfig) -> Self {
        let avatar = Box::new(ArcAvatar::new(&config));
        Self::with_avatar(role, config, avatar)
    }

    /// Create a simulation around a custom avatar.
    pub fn with_avatar(role: Role, config: RunnerConfig, avatar: Box<dyn Avatar>) -> Self {
        Self {
            role,
            lifecycle: Lifecycle::NotStarted,
            current_speed: config.initial_speed,
            distance_ran: 0.0,
            running_time: 0.0,
            invert_timer: 0.0,
            inverted: false,
            avatar,
            scheduler: ObstacleScheduler::new(&config),
            horizon: HorizonLine::new(&config),
            meter: DistanceMeter::new(),
            rounds: 0,
            config,
        }
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Begin a new round. The caller reseeds the generator beforehand.
    ///
    /// Resets distance, speed, night mode, obstacles and the avatar, then
    /// enters `Intro` with the opening jump in progress.
    pub fn start(&mut self) -> Vec<SimEvent> {
        let from = self.lifecycle;

        self.current_speed = self.config.initial_speed;
        self.distance_ran = 0.0;
        self.running_time = 0.0;
        self.invert_timer = 0.0;
        self.inverted = false;
        self.scheduler.reset();
        self.horizon.reset();
        self.meter.reset();
        self.avatar.reset();
        self.rounds += 1;

        self.lifecycle = Lifecycle::Intro;
        self.avatar.start_jump(self.current_speed);

        debug!(role = ?self.role, round = self.rounds, "participant started");

        vec![
            SimEvent::LifecycleChanged { from, to: Lifecycle::Intro },
            SimEvent::Sound { cue: SoundCue::ButtonPress },
        ]
    }

    /// Stop without crashing. Crashed and never-started simulations are untouched.
    pub fn stop(&mut self) -> Option<SimEvent> {
        self.transition_if(Lifecycle::is_live, Lifecycle::Paused)
    }

    /// Resume a paused round.
    pub fn resume(&mut self) -> Option<SimEvent> {
        self.transition_if(|l| l == Lifecycle::Paused, Lifecycle::Running)
    }

    /// End the round in a collision.
    ///
    /// Idempotent: a participant that is already crashed (or never started)
    /// produces no events, so score lock and sound happen once per round.
    pub fn crash(&mut self) -> Vec<SimEvent> {
        if matches!(self.lifecycle, Lifecycle::Crashed | Lifecycle::NotStarted) {
            return Vec::new();
        }

        let from = self.lifecycle;
        self.lifecycle = Lifecycle::Crashed;
        self.avatar.crash();
        let high_score = self.meter.record(self.distance_ran);

        debug!(role = ?self.role, distance = self.distance_ran, high_score, "participant crashed");

        vec![
            SimEvent::LifecycleChanged { from, to: Lifecycle::Crashed },
            SimEvent::Crashed { distance: self.distance_ran, high_score },
            SimEvent::Sound { cue: SoundCue::Hit },
        ]
    }

    /// Apply a jump/duck edge to the avatar. Ignored unless the round is live.
    pub fn apply_input(&mut self, edge: InputEdge) {
        if !self.lifecycle.is_live() {
            return;
        }

        let state = self.avatar.state();
        match (edge.channel, edge.down) {
            (InputChannel::Jump, true) => {
                if !state.jumping && !state.ducking {
                    self.avatar.start_jump(self.current_speed);
                }
            }
            (InputChannel::Jump, false) => self.avatar.end_jump(),
            (InputChannel::Duck, true) => {
                if state.jumping {
                    self.avatar.set_speed_drop();
                } else if !state.ducking {
                    self.avatar.set_duck(true);
                }
            }
            (InputChannel::Duck, false) => {
                self.avatar.clear_speed_drop();
                self.avatar.set_duck(false);
            }
        }
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Advance by `delta_ms` of wall-clock time.
    ///
    /// `rng` is this participant's own stream; it is only drawn from when an
    /// obstacle or ground segment is created.
    pub fn advance(&mut self, delta_ms: f64, rng: &mut SequenceGenerator) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if !self.lifecycle.is_live() {
            return events;
        }

        if self.avatar.state().jumping {
            self.avatar.update_jump(delta_ms);
        }

        if self.lifecycle == Lifecycle::Intro {
            if self.avatar.jump_count() >= 1 && !self.avatar.state().jumping {
                self.lifecycle = Lifecycle::Running;
                events.push(SimEvent::LifecycleChanged {
                    from: Lifecycle::Intro,
                    to: Lifecycle::Running,
                });
            } else {
                return events;
            }
        }

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(role = ?self.role, delta_ms, speed = self.current_speed, distance = self.distance_ran, "advance");

        self.running_time += delta_ms;
        let has_obstacles = self.running_time > self.config.clear_time;

        self.horizon.update(delta_ms, self.current_speed, rng, &self.config);

        if has_obstacles {
            if let Some(spawned) = self.scheduler.update(delta_ms, self.current_speed, rng, &self.config) {
                events.push(SimEvent::ObstacleSpawned(spawned));
            }
        }

        let collision = has_obstacles
            && self
                .scheduler
                .lead()
                .is_some_and(|obstacle| check_for_collision(obstacle, self.avatar.as_ref()));

        if !collision {
            self.distance_ran += self.current_speed * delta_ms / self.config.ms_per_frame();
            if self.current_speed < self.config.max_speed {
                self.current_speed = (self.current_speed + self.config.acceleration)
                    .min(self.config.max_speed);
            }
        } else if self.role == Role::Local {
            events.extend(self.crash());
            return events;
        }

        if let Some(distance) = self.meter.update(self.distance_ran) {
            events.push(SimEvent::Milestone { distance });
            events.push(SimEvent::Sound { cue: SoundCue::Score });
        }

        if let Some(on) = self.update_night_mode(delta_ms) {
            events.push(SimEvent::Inverted { on });
        }

        events
    }

    /// Timer-driven day/night toggle. Returns the new value on change.
    fn update_night_mode(&mut self, delta_ms: f64) -> Option<bool> {
        let was = self.inverted;

        if self.invert_timer > self.config.invert_fade_duration {
            self.invert_timer = 0.0;
            self.inverted = false;
        } else if self.invert_timer > 0.0 {
            self.invert_timer += delta_ms;
        } else {
            let distance = actual_distance(self.distance_ran);
            let interval = self.config.invert_distance.max(1);
            if distance > 0 && distance % interval == 0 {
                self.invert_timer += delta_ms;
                self.inverted = true;
            }
        }

        (was != self.inverted).then_some(self.inverted)
    }

    fn transition_if(&mut self, allowed: impl Fn(Lifecycle) -> bool, to: Lifecycle) -> Option<SimEvent> {
        if !allowed(self.lifecycle) {
            return None;
        }
        let from = self.lifecycle;
        self.lifecycle = to;
        Some(SimEvent::LifecycleChanged { from, to })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Which side this is.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Current speed.
    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    /// Raw distance this round.
    pub fn distance(&self) -> f64 {
        self.distance_ran
    }

    /// Night mode.
    pub fn inverted(&self) -> bool {
        self.inverted
    }

    /// Best score across rounds.
    pub fn high_score(&self) -> u32 {
        self.meter.high_score()
    }

    /// Rounds started.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Avatar (read-only).
    pub fn avatar(&self) -> &dyn Avatar {
        self.avatar.as_ref()
    }

    /// Obstacle scheduler (read-only).
    pub fn scheduler(&self) -> &ObstacleScheduler {
        &self.scheduler
    }

    /// Digest of this round's obstacle stream.
    pub fn track_digest(&self) -> TrackHash {
        self.scheduler.digest()
    }

    /// Snapshot for the renderer.
    pub fn frame(&self) -> RenderFrame {
        RenderFrame {
            role: self.role,
            lifecycle: self.lifecycle,
            distance: self.distance_ran,
            display_distance: actual_distance(self.distance_ran),
            speed: self.current_speed,
            avatar: self.avatar.pose(),
            avatar_state: self.avatar.state(),
            obstacles: self
                .scheduler
                .obstacles()
                .iter()
                .map(|o| ObstacleView { kind: o.kind(), x: o.x, y: o.y, width: o.width })
                .collect(),
            horizon: self.horizon.positions(),
            horizon_bumpy: self.horizon.bumpy(),
            inverted: self.inverted,
            high_score: self.meter.high_score(),
        }
    }
}
