//! Obstacle Catalog and Live Obstacles
//!
//! The catalog is static and identical on both peers. A live obstacle draws
//! its size, height slot, speed offset and trailing gap from the owning
//! participant's sequence generator, in that order.

use serde::{Serialize, Deserialize};

use crate::core::rng::SequenceGenerator;
use crate::game::collision::CollisionBox;
use crate::game::config::RunnerConfig;

/// Obstacle type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObstacleKind {
    /// Small cactus group
    CactusSmall = 0,
    /// Large cactus group
    CactusLarge = 1,
    /// Flying obstacle at one of several heights
    Pterodactyl = 2,
}

/// Static catalog entry.
#[derive(Debug, PartialEq)]
pub struct ObstacleSpec {
    /// Obstacle type
    pub kind: ObstacleKind,
    /// Width of a single unit
    pub width: f64,
    /// Height
    pub height: f64,
    /// Possible top edges; more than one means a slot is drawn
    pub y_slots: &'static [f64],
    /// Minimum speed at which groups larger than one are allowed
    pub multiple_speed: f64,
    /// Base trailing gap before the gap coefficient is applied
    pub min_gap: f64,
    /// Speed below which this type is never chosen
    pub min_speed: f64,
    /// Extra horizontal speed magnitude (sign is drawn per obstacle)
    pub speed_offset: f64,
    /// Detailed collision boxes, relative to the outer box
    pub collision_boxes: &'static [CollisionBox],
}

/// The obstacle catalog.
pub static OBSTACLE_CATALOG: [ObstacleSpec; 3] = [
    ObstacleSpec {
        kind: ObstacleKind::CactusSmall,
        width: 17.0,
        height: 35.0,
        y_slots: &[105.0],
        multiple_speed: 4.0,
        min_gap: 120.0,
        min_speed: 0.0,
        speed_offset: 0.0,
        collision_boxes: &[
            CollisionBox::new(0.0, 7.0, 5.0, 27.0),
            CollisionBox::new(4.0, 0.0, 6.0, 34.0),
            CollisionBox::new(10.0, 4.0, 7.0, 14.0),
        ],
    },
    ObstacleSpec {
        kind: ObstacleKind::CactusLarge,
        width: 25.0,
        height: 50.0,
        y_slots: &[90.0],
        multiple_speed: 7.0,
        min_gap: 120.0,
        min_speed: 0.0,
        speed_offset: 0.0,
        collision_boxes: &[
            CollisionBox::new(0.0, 12.0, 7.0, 38.0),
            CollisionBox::new(8.0, 0.0, 7.0, 49.0),
            CollisionBox::new(13.0, 10.0, 10.0, 38.0),
        ],
    },
    ObstacleSpec {
        kind: ObstacleKind::Pterodactyl,
        width: 46.0,
        height: 40.0,
        y_slots: &[100.0, 75.0, 50.0],
        multiple_speed: 999.0,
        min_gap: 150.0,
        min_speed: 8.5,
        speed_offset: 0.8,
        collision_boxes: &[
            CollisionBox::new(15.0, 15.0, 16.0, 5.0),
            CollisionBox::new(18.0, 21.0, 24.0, 6.0),
            CollisionBox::new(2.0, 14.0, 4.0, 3.0),
            CollisionBox::new(6.0, 10.0, 4.0, 7.0),
            CollisionBox::new(10.0, 8.0, 6.0, 9.0),
        ],
    },
];

impl ObstacleSpec {
    /// Whether this type may be chosen at `speed`.
    #[inline]
    pub fn allowed_at(&self, speed: f64) -> bool {
        speed >= self.min_speed
    }
}

/// An obstacle on a participant's track.
#[derive(Debug, Clone)]
pub struct Obstacle {
    spec: &'static ObstacleSpec,
    /// Group size (1..=max length)
    pub size: i32,
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Total width (unit width × size)
    pub width: f64,
    /// Required trailing clearance before the next obstacle
    pub gap: f64,
    /// Signed extra speed for this obstacle
    pub speed_offset: f64,
    /// Whether the scheduler already queued the next obstacle behind this one
    pub following_created: bool,
    collision_boxes: Vec<CollisionBox>,
}

impl Obstacle {
    /// Create an obstacle at the right edge of the track.
    ///
    /// Draws from `rng` in a fixed order: size, y slot (only when the type
    /// has several), speed-offset sign (only when the type has an offset),
    /// then gap.
    pub fn spawn(
        spec: &'static ObstacleSpec,
        speed: f64,
        rng: &mut SequenceGenerator,
        config: &RunnerConfig,
    ) -> Self {
        let mut size = rng.next(1, config.max_obstacle_length);
        if size > 1 && spec.multiple_speed > speed {
            size = 1;
        }
        let width = spec.width * size as f64;

        let y = if spec.y_slots.len() > 1 {
            let slot = rng.next(0, spec.y_slots.len() as i32 - 1);
            spec.y_slots[slot as usize]
        } else {
            spec.y_slots.first().copied().unwrap_or_default()
        };

        let speed_offset = if spec.speed_offset != 0.0 {
            if rng.next(0, 1) == 1 {
                spec.speed_offset
            } else {
                -spec.speed_offset
            }
        } else {
            0.0
        };

        let min_gap = (width * speed + spec.min_gap * config.gap_coefficient).round();
        let max_gap = (min_gap * config.max_gap_coefficient).round();
        let gap = rng.next(min_gap as i32, max_gap as i32) as f64;

        let mut collision_boxes = spec.collision_boxes.to_vec();
        if size > 1 && collision_boxes.len() >= 3 {
            // Stretch the middle box across the group and pin the last box to the right edge.
            let first = collision_boxes[0].width;
            let last = collision_boxes[2].width;
            collision_boxes[1].width = width - first - last;
            collision_boxes[2].x = width - last;
        }

        Self {
            spec,
            size,
            x: config.track_width - width,
            y,
            width,
            gap,
            speed_offset,
            following_created: false,
            collision_boxes,
        }
    }

    /// Catalog entry for this obstacle.
    pub fn spec(&self) -> &'static ObstacleSpec {
        self.spec
    }

    /// Obstacle type.
    pub fn kind(&self) -> ObstacleKind {
        self.spec.kind
    }

    /// Scroll left for `delta_ms` at the track speed.
    pub fn update(&mut self, delta_ms: f64, speed: f64, config: &RunnerConfig) {
        let speed = speed + self.speed_offset;
        self.x -= config.scroll_increment(speed, delta_ms);
    }

    /// Whether any part is still on screen.
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.x + self.width > 0.0
    }

    /// Outer box, inset by one pixel.
    pub fn outer_box(&self) -> CollisionBox {
        CollisionBox::new(self.x + 1.0, self.y + 1.0, self.width - 2.0, self.spec.height - 2.0)
    }

    /// Detailed boxes relative to the outer box.
    pub fn collision_boxes(&self) -> &[CollisionBox] {
        &self.collision_boxes
    }
}
