//! # Dino Duel
//!
//! Two-player lockstep endless runner. Each peer simulates both its own
//! runner and a mirror of the opponent; the only traffic is start, crash and
//! button edges, relayed through a lobby server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        DINO DUEL                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Deterministic primitives                 │
//! │  ├── rng.rs       - Mulberry32 sequence generator            │
//! │  └── hash.rs      - Track digests for divergence checks      │
//! │                                                              │
//! │  game/            - Runner simulation (deterministic)        │
//! │  ├── obstacle.rs  - Obstacle catalog and instances           │
//! │  ├── scheduler.rs - Obstacle selection and spawning          │
//! │  ├── avatar.rs    - Jump/duck physics                        │
//! │  ├── horizon.rs   - Ground line                              │
//! │  ├── simulation.rs- One participant's round                  │
//! │  └── clock.rs     - Cancellable tick                         │
//! │                                                              │
//! │  network/         - Networking (non-deterministic)           │
//! │  ├── protocol.rs  - `<tag>|<payload>` frames                 │
//! │  ├── channel.rs   - Loopback and WebSocket channels          │
//! │  ├── session.rs   - Session coordinator                      │
//! │  ├── peer.rs      - Headless peer driver                     │
//! │  └── relay.rs     - Lobby relay server                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Both peers reseed two generators to the same constant when a round
//! starts and draw from them in the same order:
//! - Horizon segment bumps first, then obstacle type/size/slot/offset/gap
//! - Each participant has its own generator; nothing global
//! - No HashMap (uses BTreeMap for sorted iteration)
//!
//! Given the same seed and the same sequence of tick deltas, a participant
//! and its remote mirror emit **identical obstacle streams**. Differing
//! frame timing between peers is not corrected.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::{SequenceGenerator, Seed};
pub use game::config::RunnerConfig;
pub use game::simulation::{ParticipantSimulation, Role, Lifecycle, InputChannel, InputEdge};
pub use network::session::{SessionCoordinator, SessionConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seed both generators are reset to at round start
pub const ROUND_SEED: Seed = 32;
