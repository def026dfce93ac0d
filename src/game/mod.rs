//! Game Logic Module
//!
//! The runner simulation. Deterministic given a seed and the sequence of
//! elapsed-time deltas.
//!
//! ## Module Structure
//!
//! - `config`: Tunable constants
//! - `collision`: Axis-aligned box tests
//! - `obstacle`: Obstacle catalog and instances
//! - `scheduler`: Obstacle selection and spawning
//! - `avatar`: Runner jump/duck physics behind a trait
//! - `horizon`: Scrolling ground line
//! - `meter`: Displayed distance and high score
//! - `clock`: Cancellable self-rescheduling tick
//! - `simulation`: One participant's round
//! - `events`: Simulation events and presentation output

pub mod config;
pub mod collision;
pub mod obstacle;
pub mod scheduler;
pub mod avatar;
pub mod horizon;
pub mod meter;
pub mod clock;
pub mod simulation;
pub mod events;

// Re-export key types
pub use config::RunnerConfig;
pub use obstacle::{ObstacleKind, ObstacleSpec, Obstacle, OBSTACLE_CATALOG};
pub use scheduler::{ObstacleScheduler, ObstacleHistory, SpawnedObstacle};
pub use avatar::{Avatar, ArcAvatar, AvatarState};
pub use clock::{TickScheduler, TickHandle, TickFrame};
pub use simulation::{ParticipantSimulation, Role, Lifecycle, InputChannel, InputEdge};
pub use events::{SimEvent, SoundCue, RenderFrame, PresentationSink};
