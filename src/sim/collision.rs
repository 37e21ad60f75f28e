//! Circle vs. axis-aligned rectangle collision
//!
//! Clamp the circle center onto the rectangle to find the closest point,
//! then compare squared distance against the squared radius. The comparison
//! is strict and exact: touching at exactly `radius` is not a hit.

use glam::Vec2;

use super::state::{Circle, Obstacle};
use crate::tuning::Tuning;

/// Closest point on the rectangle `[min, max]` to `p`
#[inline]
pub fn closest_point_on_rect(p: Vec2, min: Vec2, max: Vec2) -> Vec2 {
    Vec2::new(p.x.min(max.x).max(min.x), p.y.min(max.y).max(min.y))
}

/// Whether a circle at `center` overlaps the obstacle
#[inline]
pub fn circle_rect_overlap(center: Vec2, radius: f32, obstacle: &Obstacle) -> bool {
    let closest = closest_point_on_rect(center, obstacle.min(), obstacle.max());
    center.distance_squared(closest) < radius * radius
}

/// True as soon as any (obstacle, circle) pair overlaps
pub fn collides(circles: &[Circle; 2], obstacles: &[Obstacle], tuning: &Tuning) -> bool {
    let centers = [circles[0].position(tuning), circles[1].position(tuning)];
    obstacles.iter().any(|obstacle| {
        centers
            .iter()
            .any(|&center| circle_rect_overlap(center, tuning.circle_radius, obstacle))
    })
}
