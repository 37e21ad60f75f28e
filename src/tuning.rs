//! Data-driven game balance
//!
//! Every gameplay constant lives in [`Tuning`] and every payment constant in
//! [`GateConfig`]. Both deserialize from JSON so balance can be adjusted
//! without a rebuild; `Default` reproduces the shipped values.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Spawn interval reduction per difficulty tier (ms)
pub const SPAWN_INTERVAL_STEP_MS: f64 = 100.0;

/// Rejected configuration
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("invalid tuning json: {0}")]
    Json(#[from] serde_json::Error),
    /// Spawn interval at max difficulty must stay positive
    #[error("spawn interval at max difficulty is {0} ms; must be > 0")]
    SpawnIntervalExhausted(f64),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    /// The attribution suffix has a one-byte length prefix
    #[error("builder code is {0} bytes; at most 255 fit")]
    BuilderCodeTooLong(usize),
}

/// Gameplay balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Visible canvas size (pixels)
    pub canvas_width: f32,
    pub canvas_height: f32,
    /// Orbit center
    pub center_x: f32,
    pub center_y: f32,
    /// Distance from center at which both circles travel
    pub orbit_radius: f32,
    /// Collision radius of each circle
    pub circle_radius: f32,
    /// Obstacle edge length (obstacles are square)
    pub obstacle_size: f32,
    /// Obstacle fall speed at difficulty 0 (pixels per reference frame)
    pub base_obstacle_speed: f32,
    /// Extra fall speed per difficulty tier
    pub speed_multiplier: f32,
    /// Spawn interval at difficulty 0 (ms)
    pub spawn_interval_ms: f64,
    /// Time per difficulty tier (ms)
    pub difficulty_interval_ms: f64,
    /// Highest tier. `spawn_interval_ms` must outlast this many
    /// [`SPAWN_INTERVAL_STEP_MS`] reductions.
    pub max_difficulty: u32,
    /// Rotation per reference frame while a direction is held (radians)
    pub rotation_speed: f32,
    /// Frame rate the per-frame speeds are expressed against
    pub reference_fps: f64,
    /// Spawn band half-width as a multiple of `orbit_radius`
    pub spawn_band_factor: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            canvas_width: 800.0,
            canvas_height: 600.0,
            center_x: 400.0,
            center_y: 520.0,
            orbit_radius: 60.0,
            circle_radius: 15.0,
            obstacle_size: 20.0,
            base_obstacle_speed: 2.5,
            speed_multiplier: 0.2,
            spawn_interval_ms: 800.0,
            difficulty_interval_ms: 10_000.0,
            max_difficulty: 7,
            rotation_speed: 0.06,
            reference_fps: 60.0,
            spawn_band_factor: 2.5,
        }
    }
}

impl Tuning {
    /// Parse and validate tuning from JSON (missing fields use defaults)
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Check the invariants the simulation relies on
    pub fn validate(&self) -> Result<(), TuningError> {
        let positive = [
            ("canvas_width", self.canvas_width as f64),
            ("canvas_height", self.canvas_height as f64),
            ("orbit_radius", self.orbit_radius as f64),
            ("circle_radius", self.circle_radius as f64),
            ("obstacle_size", self.obstacle_size as f64),
            ("difficulty_interval_ms", self.difficulty_interval_ms),
            ("reference_fps", self.reference_fps),
        ];
        for (name, value) in positive {
            if value <= 0.0 {
                return Err(TuningError::NonPositive(name));
            }
        }

        let floor = self.min_spawn_interval_ms();
        if floor <= 0.0 {
            return Err(TuningError::SpawnIntervalExhausted(floor));
        }
        Ok(())
    }

    /// Spawn interval once difficulty is capped
    pub fn min_spawn_interval_ms(&self) -> f64 {
        self.spawn_interval_ms - self.max_difficulty as f64 * SPAWN_INTERVAL_STEP_MS
    }

    /// Orbit center as a vector
    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.center_x, self.center_y)
    }

    /// Milliseconds per reference frame
    #[inline]
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.reference_fps
    }
}

/// Payment and chain parameters for the session gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Entry fee and minimum balance, in USD
    pub minimum_usd: f64,
    /// ETH/USD used when the price service is unreachable
    pub fallback_eth_price: f64,
    /// Chain the payment must be made on
    pub chain_id: u64,
    /// Fee recipient address
    pub recipient: String,
    /// Call data attached to the payment ("Duet")
    pub call_data: String,
    /// Builder code carried in the attribution suffix
    pub builder_code: String,
    /// Pause after a network switch before reading balances (ms)
    pub switch_settle_ms: u32,
    /// Price endpoint queried by the browser client
    pub price_endpoint: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            minimum_usd: 0.0001,
            fallback_eth_price: 2500.0,
            chain_id: 8453,
            recipient: "0xEA549e458e77Fd93bf330e5EAEf730c50d8F5249".to_string(),
            call_data: "0x44756574".to_string(),
            builder_code: "bc_dh0rqw67".to_string(),
            switch_settle_ms: 1000,
            price_endpoint: "/api/eth-price".to_string(),
        }
    }
}

impl GateConfig {
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let config: GateConfig = serde_json::from_str(json)?;
        if config.minimum_usd <= 0.0 {
            return Err(TuningError::NonPositive("minimum_usd"));
        }
        if config.fallback_eth_price <= 0.0 {
            return Err(TuningError::NonPositive("fallback_eth_price"));
        }
        if config.builder_code.len() > u8::MAX as usize {
            return Err(TuningError::BuilderCodeTooLong(config.builder_code.len()));
        }
        Ok(config)
    }
}
