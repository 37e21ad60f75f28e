//! Game state and core simulation types
//!
//! One `GameState` record holds everything a session needs. It is owned by
//! the loop driver and threaded through [`super::tick::advance`] by value.

use std::f32::consts::PI;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::polar_to_cartesian;
use crate::tuning::Tuning;

/// Lifecycle of the game screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameStatus {
    /// Waiting for the player to pay and start
    #[default]
    Menu,
    /// Session in progress, frames are being advanced
    Playing,
    /// Session ended by a collision
    GameOver,
}

/// Rotation direction of the circles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spin {
    #[default]
    Cw,
    Ccw,
}

/// Fixed identity color of each circle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircleColor {
    Red,
    Blue,
}

impl CircleColor {
    pub fn hex(&self) -> &'static str {
        match self {
            CircleColor::Red => "#ef4444",
            CircleColor::Blue => "#3b82f6",
        }
    }
}

/// A player-controlled orbiter. Position is derived from `angle`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Angle on the orbit (radians)
    pub angle: f32,
    pub spin: Spin,
    pub color: CircleColor,
}

impl Circle {
    pub fn new(angle: f32, color: CircleColor) -> Self {
        Self {
            angle,
            spin: Spin::Cw,
            color,
        }
    }

    /// Absolute canvas position of the circle center
    #[inline]
    pub fn position(&self, tuning: &Tuning) -> Vec2 {
        polar_to_cartesian(tuning.center(), tuning.orbit_radius, self.angle)
    }
}

/// Circles at rest on the menu screen
pub fn menu_circles() -> [Circle; 2] {
    [
        Circle::new(0.0, CircleColor::Red),
        Circle::new(PI, CircleColor::Blue),
    ]
}

/// Circles at the start of a session: one above, one below the center
pub fn starting_circles() -> [Circle; 2] {
    [
        Circle::new(PI * 1.5, CircleColor::Red),
        Circle::new(PI * 0.5, CircleColor::Blue),
    ]
}

/// Cosmetic obstacle flavor (does not affect behavior)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    Left,
    Right,
    Center,
}

impl ObstacleKind {
    pub const ALL: [ObstacleKind; 3] = [ObstacleKind::Left, ObstacleKind::Right, ObstacleKind::Center];
}

/// A falling axis-aligned block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Spawn time in the high bits, random salt in the low 16
    pub id: u64,
    /// Top-left corner
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Fall speed at spawn time (pixels per reference frame)
    pub speed: f32,
    pub kind: ObstacleKind,
}

impl Obstacle {
    #[inline]
    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }
}

/// Complete game state (serializable so hosts can snapshot it)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub status: GameStatus,
    /// Frames are ignored while set; cleared at session start
    pub paused: bool,
    /// floor(elapsed / 100); monotonic within a session
    pub score: u64,
    /// Best final score across sessions
    pub high_score: u64,
    /// Difficulty tier in [0, max_difficulty]
    pub difficulty: u32,
    /// Session start (ms, host clock)
    pub start_time: f64,
    /// Elapsed time at the last advance (ms)
    pub elapsed_ms: f64,
    /// Spawn order; entries are only appended or filtered out
    pub obstacles: Vec<Obstacle>,
    pub circles: [Circle; 2],
    /// Set only while the session gate is waiting on the payment
    pub transaction_pending: bool,
    pub last_obstacle_spawn: f64,
    /// Spawn placement RNG, reseeded every session
    rng: Pcg32,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(0)
    }
}

impl GameState {
    /// Menu state carrying a previously persisted high score
    pub fn new(high_score: u64) -> Self {
        Self {
            status: GameStatus::Menu,
            paused: false,
            score: 0,
            high_score,
            difficulty: 0,
            start_time: 0.0,
            elapsed_ms: 0.0,
            obstacles: Vec::new(),
            circles: menu_circles(),
            transaction_pending: false,
            last_obstacle_spawn: 0.0,
            rng: Pcg32::seed_from_u64(0),
        }
    }

    /// Whether frames should be advanced
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.status == GameStatus::Playing
    }

    /// Reset for a fresh session starting at `now`
    pub fn begin_session(self, now: f64, seed: u64) -> Self {
        Self {
            status: GameStatus::Playing,
            paused: false,
            score: 0,
            high_score: self.high_score,
            difficulty: 0,
            start_time: now,
            elapsed_ms: 0.0,
            obstacles: Vec::new(),
            circles: starting_circles(),
            transaction_pending: false,
            last_obstacle_spawn: now,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Stop the session and fold the final score into the high score.
    /// Returns true when the high score improved.
    pub fn end_session(&mut self) -> bool {
        self.status = GameStatus::GameOver;
        if self.score > self.high_score {
            self.high_score = self.score;
            true
        } else {
            false
        }
    }

    pub(crate) fn rng_mut(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }
}
