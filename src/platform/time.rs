//! Wall clock and delays
//!
//! The simulation never reads time itself; these capabilities are what the
//! session driver and the gate use to obtain `now` and to wait.

use std::cell::Cell;

use async_trait::async_trait;

/// Source of wall-clock milliseconds
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Asynchronous delay
#[async_trait(?Send)]
pub trait Timer {
    async fn sleep(&self, ms: u32);
}

/// Host wall clock (`Date.now()` on web, `SystemTime` on native)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Timer backed by `setTimeout` on web and a thread sleep on native
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimer;

#[async_trait(?Send)]
impl Timer for SystemTimer {
    #[cfg(target_arch = "wasm32")]
    async fn sleep(&self, ms: u32) {
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            if let Some(window) = web_sys::window() {
                let _ = window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms as i32);
            }
        });
        let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn sleep(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}

/// Hand-driven clock for headless runs; `sleep` advances it instantly
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

#[async_trait(?Send)]
impl Timer for ManualClock {
    async fn sleep(&self, ms: u32) {
        self.advance(ms as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new(100.0);
        futures::executor::block_on(clock.sleep(250));
        assert_eq!(clock.now_ms(), 350.0);
        clock.set(5.0);
        assert_eq!(clock.now_ms(), 5.0);
    }
}
