//! Per-frame simulation step
//!
//! `advance` is the whole game loop body: difficulty, rotation, spawning,
//! falling, pruning, scoring and the collision check, in that order.

use rand::Rng;

use super::collision::collides;
use super::difficulty::{difficulty, obstacle_speed, score, spawn_interval};
use super::state::{GameState, Obstacle, ObstacleKind, Spin};
use crate::tuning::Tuning;

/// Held directions for a single frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInput {
    /// Rotate counter-clockwise
    pub left: bool,
    /// Rotate clockwise
    pub right: bool,
}

/// What a frame did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing (or paused); state untouched
    Idle,
    /// Frame advanced, session continues
    Continue,
    /// A circle hit an obstacle; the session is over
    Collided { final_score: u64, new_high_score: bool },
}

/// Create one obstacle just above the canvas, inside the orbit band
pub fn spawn_obstacle<R: Rng + ?Sized>(rng: &mut R, difficulty: u32, now: f64, tuning: &Tuning) -> Obstacle {
    let size = tuning.obstacle_size;
    let half_band = tuning.orbit_radius * tuning.spawn_band_factor;
    let min_x = tuning.center_x - half_band;
    let max_x = tuning.center_x + half_band - size;

    let x = min_x + rng.random::<f32>() * (max_x - min_x);
    let kind = ObstacleKind::ALL[rng.random_range(0..ObstacleKind::ALL.len())];
    // Spawns are at least one ms apart, so the time bits alone keep ids unique
    let id = ((now.max(0.0) as u64) << 16) | rng.random::<u16>() as u64;

    Obstacle {
        id,
        x,
        y: -size,
        width: size,
        height: size,
        speed: obstacle_speed(difficulty, tuning),
        kind,
    }
}

/// Advance the game by one display frame.
///
/// `delta_frames` is the frame time in units of reference frames (1.0 at
/// 60 fps). Both directions may be held; left is applied first, then right.
pub fn advance(
    mut state: GameState,
    now: f64,
    delta_frames: f64,
    input: &TickInput,
    tuning: &Tuning,
) -> (GameState, TickOutcome) {
    if !state.is_playing() || state.paused {
        return (state, TickOutcome::Idle);
    }

    let elapsed = (now - state.start_time).max(0.0);
    let tier = difficulty(elapsed, tuning);
    state.elapsed_ms = elapsed;
    state.difficulty = tier;

    let rotation = tuning.rotation_speed * delta_frames as f32;
    if input.left {
        for circle in &mut state.circles {
            circle.angle -= rotation;
            circle.spin = Spin::Ccw;
        }
    }
    if input.right {
        for circle in &mut state.circles {
            circle.angle += rotation;
            circle.spin = Spin::Cw;
        }
    }

    if now - state.last_obstacle_spawn > spawn_interval(tier, tuning) {
        let obstacle = spawn_obstacle(state.rng_mut(), tier, now, tuning);
        log::debug!("Spawned obstacle {} at x={:.1} (tier {})", obstacle.id, obstacle.x, tier);
        state.obstacles.push(obstacle);
        state.last_obstacle_spawn = now;
    }

    let fall = obstacle_speed(tier, tuning) * delta_frames as f32;
    for obstacle in &mut state.obstacles {
        obstacle.y += fall;
    }
    state.obstacles.retain(|o| o.y < tuning.canvas_height);

    state.score = score(elapsed);

    if collides(&state.circles, &state.obstacles, tuning) {
        let new_high_score = state.end_session();
        log::info!(
            "Collision after {:.1}s: score {} (best {})",
            elapsed / 1000.0,
            state.score,
            state.high_score
        );
        let final_score = state.score;
        return (
            state,
            TickOutcome::Collided {
                final_score,
                new_high_score,
            },
        );
    }

    (state, TickOutcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::GameStatus;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const START: f64 = 1_000_000.0;

    fn playing(seed: u64) -> GameState {
        GameState::new(0).begin_session(START, seed)
    }

    #[test]
    fn test_idle_when_not_playing() {
        let tuning = Tuning::default();
        let state = GameState::new(0);
        let (state, outcome) = advance(state, START + 5_000.0, 1.0, &TickInput::default(), &tuning);
        assert_eq!(outcome, TickOutcome::Idle);
        assert_eq!(state.status, GameStatus::Menu);
        assert!(state.obstacles.is_empty());
    }

    #[test]
    fn test_idle_when_paused() {
        let tuning = Tuning::default();
        let mut state = playing(1);
        state.paused = true;
        let (state, outcome) = advance(state, START + 5_000.0, 1.0, &TickInput::default(), &tuning);
        assert_eq!(outcome, TickOutcome::Idle);
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_rotation_directions() {
        let tuning = Tuning::default();
        let state = playing(1);
        let before = state.circles;

        let left = TickInput { left: true, right: false };
        let (state, _) = advance(state, START + 16.0, 1.0, &left, &tuning);
        for (after, before) in state.circles.iter().zip(before.iter()) {
            assert!((after.angle - (before.angle - 0.06)).abs() < 1e-6);
            assert_eq!(after.spin, Spin::Ccw);
        }

        let right = TickInput { left: false, right: true };
        let (state, _) = advance(state, START + 32.0, 2.0, &right, &tuning);
        for (after, before) in state.circles.iter().zip(before.iter()) {
            assert!((after.angle - (before.angle + 0.06)).abs() < 1e-5);
            assert_eq!(after.spin, Spin::Cw);
        }
    }

    #[test]
    fn test_both_held_cancels_and_right_wins_spin() {
        let tuning = Tuning::default();
        let state = playing(1);
        let before = state.circles;
        let both = TickInput { left: true, right: true };
        let (state, _) = advance(state, START + 16.0, 1.0, &both, &tuning);
        for (after, before) in state.circles.iter().zip(before.iter()) {
            assert!((after.angle - before.angle).abs() < 1e-5);
            assert_eq!(after.spin, Spin::Cw);
        }
    }

    #[test]
    fn test_spawn_after_interval() {
        let tuning = Tuning::default();
        let state = playing(3);

        let (state, _) = advance(state, START + 800.0, 0.0, &TickInput::default(), &tuning);
        assert!(state.obstacles.is_empty(), "interval must be strictly exceeded");

        let (state, outcome) = advance(state, START + 801.0, 0.0, &TickInput::default(), &tuning);
        assert_eq!(outcome, TickOutcome::Continue);
        assert_eq!(state.obstacles.len(), 1);
        assert_eq!(state.last_obstacle_spawn, START + 801.0);

        let obstacle = &state.obstacles[0];
        assert_eq!(obstacle.y, -tuning.obstacle_size);
        assert!(obstacle.x >= 250.0 && obstacle.x <= 530.0);
        assert_eq!(obstacle.speed, 2.5);
    }

    #[test]
    fn test_spawn_obstacle_within_band() {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(99);
        for i in 0..200 {
            let o = spawn_obstacle(&mut rng, 4, START + i as f64, &tuning);
            assert!(o.x >= 250.0);
            assert!(o.x <= 530.0);
            assert!((o.speed - 3.3).abs() < 1e-5);
        }
    }

    #[test]
    fn test_obstacles_fall_and_prune() {
        let tuning = Tuning::default();
        let mut state = playing(5);
        let mut low = spawn_obstacle(state.rng_mut(), 0, START, &tuning);
        low.x = 0.0;
        low.y = 598.0;
        let mut high = low.clone();
        high.id += 1;
        high.y = 100.0;
        state.obstacles = vec![low, high];

        let (state, _) = advance(state, START + 16.0, 1.0, &TickInput::default(), &tuning);
        assert_eq!(state.obstacles.len(), 1);
        assert!((state.obstacles[0].y - 102.5).abs() < 1e-5);
        assert!(state.obstacles.iter().all(|o| o.y < tuning.canvas_height));
    }

    #[test]
    fn test_prune_at_canvas_edge() {
        let tuning = Tuning::default();
        let mut state = playing(5);
        let mut edge = spawn_obstacle(state.rng_mut(), 0, START, &tuning);
        edge.x = 0.0;
        // Lands exactly on the bottom edge after a 2.5 px fall
        edge.y = 597.5;
        let mut inside = edge.clone();
        inside.id += 1;
        inside.y = 597.25;
        state.obstacles = vec![edge, inside];

        let (state, _) = advance(state, START + 16.0, 1.0, &TickInput::default(), &tuning);
        assert_eq!(state.obstacles.len(), 1);
        assert_eq!(state.obstacles[0].y, 599.75);
    }

    #[test]
    fn test_score_and_difficulty_from_time() {
        let tuning = Tuning::default();
        let state = playing(1);
        let (state, _) = advance(state, START + 12_345.0, 0.0, &TickInput::default(), &tuning);
        assert_eq!(state.score, 123);
        assert_eq!(state.difficulty, 1);
    }

    #[test]
    fn test_zero_delta_is_idempotent() {
        let tuning = Tuning::default();
        let state = playing(8);
        let now = START + 2_000.0;
        let (first, _) = advance(state, now, 0.0, &TickInput { left: true, right: false }, &tuning);
        let (second, _) = advance(first.clone(), now, 0.0, &TickInput { left: true, right: false }, &tuning);
        assert_eq!(first.obstacles, second.obstacles);
        assert_eq!(first.circles, second.circles);
        assert_eq!(first.score, second.score);
    }

    #[test]
    fn test_collision_ends_session() {
        let tuning = Tuning::default();
        let mut state = GameState::new(10).begin_session(START, 1);
        let mut obstacle = spawn_obstacle(state.rng_mut(), 0, START, &tuning);
        // Directly on the top circle at (400, 460)
        obstacle.x = 390.0;
        obstacle.y = 450.0;
        state.obstacles.push(obstacle);

        let (state, outcome) = advance(state, START + 5_000.0, 0.0, &TickInput::default(), &tuning);
        assert_eq!(
            outcome,
            TickOutcome::Collided {
                final_score: 50,
                new_high_score: true
            }
        );
        assert_eq!(state.status, GameStatus::GameOver);
        assert_eq!(state.high_score, 50);

        // No further frames once the session is over
        let (_, outcome) = advance(state, START + 6_000.0, 1.0, &TickInput::default(), &tuning);
        assert_eq!(outcome, TickOutcome::Idle);
    }

    #[test]
    fn test_determinism() {
        let tuning = Tuning::default();
        let mut a = playing(1234);
        let mut b = playing(1234);
        let input = TickInput { left: false, right: true };
        for frame in 1..600 {
            let now = START + frame as f64 * 16.0;
            a = advance(a, now, 1.0, &input, &tuning).0;
            b = advance(b, now, 1.0, &input, &tuning).0;
        }
        assert_eq!(a.obstacles, b.obstacles);
        assert_eq!(a.circles, b.circles);
        assert_eq!(a.status, b.status);
    }
}
