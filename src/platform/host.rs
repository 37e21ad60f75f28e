//! Host embedding surface
//!
//! The game may run standalone or inside a wallet-bearing host (a Farcaster
//! mini app or the Base app). The host is injected as a [`HostBridge`] rather
//! than sniffed at runtime, so everything here runs against test doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::time::Timer;
use crate::gate::Wallet;

/// Delay before the first readiness signal
pub const READY_DELAY_MS: u32 = 100;
/// Delay before the single readiness retry
pub const READY_RETRY_DELAY_MS: u32 = 1000;
/// Delay before auto-connecting an embedded wallet
pub const AUTO_CONNECT_DELAY_MS: u32 = 500;

/// Where the game is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostEnvironment {
    Farcaster,
    BaseApp,
    #[default]
    Standalone,
}

impl HostEnvironment {
    /// Embedded hosts supply a wallet that can connect without a prompt
    pub fn is_embedded(&self) -> bool {
        !matches!(self, HostEnvironment::Standalone)
    }

    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "farcaster" => HostEnvironment::Farcaster,
            "baseapp" | "base" => HostEnvironment::BaseApp,
            _ => HostEnvironment::Standalone,
        }
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host readiness failed: {0}")]
    NotReady(String),
}

/// Capabilities of the embedding host
#[async_trait(?Send)]
pub trait HostBridge {
    fn environment(&self) -> HostEnvironment;

    /// Tell the host the app has loaded (dismisses its splash screen)
    async fn signal_ready(&self) -> Result<(), HostError>;
}

/// Signal readiness, retrying once after [`READY_RETRY_DELAY_MS`].
///
/// Never blocks startup on failure; returns whether the host acknowledged.
pub async fn announce_ready(host: &dyn HostBridge, timer: &dyn Timer) -> bool {
    timer.sleep(READY_DELAY_MS).await;
    match host.signal_ready().await {
        Ok(()) => {
            log::info!("Host ready ({:?})", host.environment());
            true
        }
        Err(e) => {
            log::warn!("{}; retrying in {}ms", e, READY_RETRY_DELAY_MS);
            timer.sleep(READY_RETRY_DELAY_MS).await;
            match host.signal_ready().await {
                Ok(()) => {
                    log::info!("Host ready on retry");
                    true
                }
                Err(e) => {
                    log::error!("Host readiness retry failed: {}", e);
                    false
                }
            }
        }
    }
}

/// Connect the host wallet automatically when embedded and not yet connected.
///
/// Returns whether a connection attempt succeeded.
pub async fn auto_connect(host: &dyn HostBridge, wallet: &dyn Wallet, timer: &dyn Timer) -> bool {
    if !host.environment().is_embedded() || wallet.account().is_some() {
        return false;
    }
    timer.sleep(AUTO_CONNECT_DELAY_MS).await;
    match wallet.connect().await {
        Ok(()) => {
            log::info!("Auto-connected wallet in {:?}", host.environment());
            true
        }
        Err(e) => {
            log::warn!("Auto-connect failed: {}", e);
            false
        }
    }
}
