//! Duet - twin orbiting markers dodging falling blocks
//!
//! Core modules:
//! - `sim`: Deterministic simulation (spawning, motion, collisions, difficulty)
//! - `gate`: Fee-gated session start (balance check, chain switch, payment)
//! - `session`: Frame-driven loop driver and menu/play/game-over lifecycle
//! - `platform`: Browser/native platform abstraction
//! - `tuning`: Data-driven game balance and payment configuration

pub mod gate;
pub mod highscores;
pub mod platform;
pub mod price;
pub mod session;
pub mod sim;
pub mod tuning;

pub use gate::{GateError, Wallet, WalletError};
pub use highscores::HighScore;
pub use session::{Session, format_elapsed};
pub use tuning::{GateConfig, Tuning};

use glam::Vec2;

/// Convert polar (r, theta) around `center` to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(center: Vec2, r: f32, theta: f32) -> Vec2 {
    center + Vec2::new(r * theta.cos(), r * theta.sin())
}
