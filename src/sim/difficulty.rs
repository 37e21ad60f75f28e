//! Difficulty and score as pure functions of elapsed session time

use crate::tuning::{SPAWN_INTERVAL_STEP_MS, Tuning};

/// Difficulty tier: one step per `difficulty_interval_ms`, capped
pub fn difficulty(elapsed_ms: f64, tuning: &Tuning) -> u32 {
    if elapsed_ms <= 0.0 {
        return 0;
    }
    let tier = (elapsed_ms / tuning.difficulty_interval_ms).floor();
    if tier >= tuning.max_difficulty as f64 {
        tuning.max_difficulty
    } else {
        tier as u32
    }
}

/// Score: one point per 100 ms survived
#[inline]
pub fn score(elapsed_ms: f64) -> u64 {
    if elapsed_ms <= 0.0 {
        0
    } else {
        (elapsed_ms / 100.0).floor() as u64
    }
}

/// Minimum time between spawns at the given tier (ms): 100 ms less per tier
#[inline]
pub fn spawn_interval(difficulty: u32, tuning: &Tuning) -> f64 {
    tuning.spawn_interval_ms - difficulty as f64 * SPAWN_INTERVAL_STEP_MS
}

/// Obstacle fall speed at the given tier (pixels per reference frame)
#[inline]
pub fn obstacle_speed(difficulty: u32, tuning: &Tuning) -> f32 {
    tuning.base_obstacle_speed + difficulty as f32 * tuning.speed_multiplier
}
