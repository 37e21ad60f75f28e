//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Time/delays
//! - Input events
//! - Storage (LocalStorage on web)
//! - The embedding host and its wallet (web only)

pub mod host;
pub mod input;
pub mod storage;
pub mod time;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use host::{HostBridge, HostEnvironment, announce_ready, auto_connect};
pub use input::{HeldInput, Side};
pub use storage::{KeyValueStore, MemoryStore};
pub use time::{Clock, ManualClock, SystemClock, SystemTimer, Timer};
