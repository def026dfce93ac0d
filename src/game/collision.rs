//! Collision Detection
//!
//! Axis-aligned box tests between the avatar and the lead obstacle.
//! An outer box check (inset by one pixel) gates the detailed per-box check.

use serde::{Serialize, Deserialize};

use crate::game::avatar::Avatar;
use crate::game::obstacle::Obstacle;

/// Axis-aligned collision box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionBox {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl CollisionBox {
    /// Create a new box.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Translate by the origin of another box.
    #[inline]
    pub fn offset_by(&self, origin: &CollisionBox) -> CollisionBox {
        CollisionBox::new(self.x + origin.x, self.y + origin.y, self.width, self.height)
    }

    /// Check if two boxes overlap (touching edges do not count).
    #[inline]
    pub fn overlaps(&self, other: &CollisionBox) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// Check whether the avatar collides with an obstacle.
pub fn check_for_collision(obstacle: &Obstacle, avatar: &dyn Avatar) -> bool {
    let avatar_box = avatar.outer_box();
    let obstacle_box = obstacle.outer_box();

    if !avatar_box.overlaps(&obstacle_box) {
        return false;
    }

    let avatar_boxes = avatar.collision_boxes();
    let obstacle_boxes = obstacle.collision_boxes();

    avatar_boxes.iter().any(|a| {
        let a = a.offset_by(&avatar_box);
        obstacle_boxes
            .iter()
            .any(|o| a.overlaps(&o.offset_by(&obstacle_box)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap() {
        let a = CollisionBox::new(0.0, 0.0, 10.0, 10.0);
        let b = CollisionBox::new(5.0, 5.0, 10.0, 10.0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = CollisionBox::new(0.0, 0.0, 10.0, 10.0);
        let b = CollisionBox::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_offset() {
        let inner = CollisionBox::new(2.0, 3.0, 4.0, 5.0);
        let origin = CollisionBox::new(100.0, 50.0, 1.0, 1.0);
        let moved = inner.offset_by(&origin);
        assert_eq!(moved, CollisionBox::new(102.0, 53.0, 4.0, 5.0));
    }
}
