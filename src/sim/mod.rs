//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Time comes in as arguments, never read from a clock
//! - Seeded RNG only
//! - Obstacles keep spawn order
//! - No rendering or platform dependencies

pub mod collision;
pub mod difficulty;
pub mod state;
pub mod tick;

pub use collision::{circle_rect_overlap, closest_point_on_rect, collides};
pub use difficulty::{difficulty, obstacle_speed, score, spawn_interval};
pub use state::{Circle, CircleColor, GameState, GameStatus, Obstacle, ObstacleKind, Spin};
pub use tick::{TickInput, TickOutcome, advance, spawn_obstacle};
