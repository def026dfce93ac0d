//! Obstacle Scheduler
//!
//! Decides when the next obstacle enters a participant's track and which
//! type it is. All randomness comes from the generator handed in by the
//! caller, so two schedulers fed the same seed, speeds and call points emit
//! identical streams.
//!
//! ## Type Selection
//!
//! 1. Draw `next(0, catalog_len - 1)`.
//! 2. Reject if the current speed is below the type's minimum, or if the
//!    last `max_obstacle_duplication` emitted types all equal it.
//! 3. After `scheduler_retry_cap` rejections, fall back to the least
//!    recently used eligible type without further draws.

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::hash::{TrackHasher, TrackHash};
use crate::core::rng::SequenceGenerator;
use crate::game::config::RunnerConfig;
use crate::game::obstacle::{Obstacle, ObstacleKind, ObstacleSpec, OBSTACLE_CATALOG};

// =============================================================================
// OBSTACLE HISTORY
// =============================================================================

/// Most recent obstacle types, newest first, bounded by the duplicate cap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObstacleHistory {
    entries: VecDeque<ObstacleKind>,
    cap: usize,
}

impl ObstacleHistory {
    /// Create an empty history holding at most `cap` entries.
    pub fn new(cap: usize) -> Self {
        Self { entries: VecDeque::with_capacity(cap), cap }
    }

    /// True if the last `cap` entries all equal `kind`.
    pub fn is_duplicate(&self, kind: ObstacleKind) -> bool {
        self.cap > 0
            && self.entries.len() >= self.cap
            && self.entries.iter().take(self.cap).all(|k| *k == kind)
    }

    /// Record an emitted type.
    pub fn push(&mut self, kind: ObstacleKind) {
        self.entries.push_front(kind);
        self.entries.truncate(self.cap);
    }

    /// How many emissions ago `kind` last appeared (`None` if not retained).
    pub fn age_of(&self, kind: ObstacleKind) -> Option<usize> {
        self.entries.iter().position(|k| *k == kind)
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ObstacleKind> {
        self.entries.iter()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything (round reset).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// An obstacle the scheduler just appended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnedObstacle {
    /// Obstacle type
    pub kind: ObstacleKind,
    /// Group size
    pub size: i32,
    /// Required trailing gap
    pub gap: f64,
}

/// Per-track obstacle scheduler.
#[derive(Debug, Clone)]
pub struct ObstacleScheduler {
    catalog: &'static [ObstacleSpec],
    obstacles: Vec<Obstacle>,
    history: ObstacleHistory,
    hasher: TrackHasher,
    emitted: u32,
}

impl ObstacleScheduler {
    /// Scheduler over the built-in catalog.
    pub fn new(config: &RunnerConfig) -> Self {
        Self::with_catalog(&OBSTACLE_CATALOG, config)
    }

    /// Scheduler over a custom catalog.
    pub fn with_catalog(catalog: &'static [ObstacleSpec], config: &RunnerConfig) -> Self {
        Self {
            catalog,
            obstacles: Vec::new(),
            history: ObstacleHistory::new(config.max_obstacle_duplication),
            hasher: TrackHasher::new(),
            emitted: 0,
        }
    }

    /// Move obstacles, drop the ones that left the track and append a new one
    /// once the last has fully entered with its gap satisfied.
    pub fn update(
        &mut self,
        delta_ms: f64,
        speed: f64,
        rng: &mut SequenceGenerator,
        config: &RunnerConfig,
    ) -> Option<SpawnedObstacle> {
        for obstacle in &mut self.obstacles {
            obstacle.update(delta_ms, speed, config);
        }
        self.obstacles.retain(Obstacle::is_visible);

        let needs_next = match self.obstacles.last() {
            Some(last) => {
                !last.following_created
                    && last.is_visible()
                    && last.x + last.width + last.gap < config.track_width
            }
            None => true,
        };

        if !needs_next {
            return None;
        }

        if let Some(last) = self.obstacles.last_mut() {
            last.following_created = true;
        }
        Some(self.add_obstacle(speed, rng, config))
    }

    /// Choose, create and record the next obstacle.
    pub fn add_obstacle(
        &mut self,
        speed: f64,
        rng: &mut SequenceGenerator,
        config: &RunnerConfig,
    ) -> SpawnedObstacle {
        let spec = self.select_type(speed, rng, config);
        let obstacle = Obstacle::spawn(spec, speed, rng, config);

        let spawned = SpawnedObstacle {
            kind: spec.kind,
            size: obstacle.size,
            gap: obstacle.gap,
        };

        self.hasher.update_u8(spawned.kind as u8);
        self.hasher.update_i32(spawned.size);
        self.hasher.update_i32(spawned.gap as i32);
        self.history.push(spec.kind);
        self.obstacles.push(obstacle);
        self.emitted += 1;

        spawned
    }

    /// Pick the next obstacle type.
    pub fn select_type(
        &self,
        speed: f64,
        rng: &mut SequenceGenerator,
        config: &RunnerConfig,
    ) -> &'static ObstacleSpec {
        let catalog = self.catalog;
        let last_index = catalog.len() as i32 - 1;

        for _ in 0..config.scheduler_retry_cap.max(1) {
            let index = rng.next(0, last_index);
            let Some(spec) = catalog.get(index as usize) else {
                continue;
            };
            if spec.allowed_at(speed) && !self.history.is_duplicate(spec.kind) {
                return spec;
            }
        }

        let spec = self.fallback_type(speed);
        debug!(kind = ?spec.kind, speed, "obstacle retry cap hit, using fallback");
        spec
    }

    /// Least recently used type allowed at `speed`, preferring ones that pass
    /// the duplicate check. If nothing is fast enough, the slowest type.
    fn fallback_type(&self, speed: f64) -> &'static ObstacleSpec {
        let catalog = self.catalog;
        let staleness = |spec: &ObstacleSpec| self.history.age_of(spec.kind).unwrap_or(usize::MAX);

        let eligible = || catalog.iter().filter(|s| s.allowed_at(speed));

        eligible()
            .filter(|s| !self.history.is_duplicate(s.kind))
            .rev()
            .max_by_key(|s| staleness(*s))
            .or_else(|| eligible().rev().max_by_key(|s| staleness(*s)))
            .or_else(|| {
                catalog
                    .iter()
                    .min_by(|a, b| a.min_speed.total_cmp(&b.min_speed))
            })
            .unwrap_or(&OBSTACLE_CATALOG[0])
    }

    /// The obstacle nearest the avatar.
    pub fn lead(&self) -> Option<&Obstacle> {
        self.obstacles.first()
    }

    /// Obstacles currently on the track.
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Recently emitted types.
    pub fn history(&self) -> &ObstacleHistory {
        &self.history
    }

    /// Obstacles emitted this round.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    /// Digest of this round's emitted stream.
    pub fn digest(&self) -> TrackHash {
        self.hasher.digest()
    }

    /// Clear obstacles, history and digest for a new round.
    pub fn reset(&mut self) {
        self.obstacles.clear();
        self.history.clear();
        self.hasher = TrackHasher::new();
        self.emitted = 0;
    }
}
