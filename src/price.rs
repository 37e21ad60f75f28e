//! ETH/USD price quotes
//!
//! The price endpoint answers `{ "ethPrice": number, "timestamp": number }`.
//! When the upstream feed fails it still answers 200, with the default
//! price and an `error` field, so clients never see a hard failure.
//!
//! [`respond`] is the pure core of that endpoint: whatever serves it fetches
//! the upstream CoinGecko `simple/price` body and hands the result over.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Price served when the upstream feed is unavailable
pub const DEFAULT_ETH_PRICE: f64 = 2500.0;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price request failed: {0}")]
    Http(String),
    #[error("price service returned status {0}")]
    Status(u16),
    #[error("malformed price payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("implausible price {0}")]
    Invalid(f64),
}

/// Wire format of the price endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub eth_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriceQuote {
    /// Fallback answer served when the upstream fails
    pub fn fallback() -> Self {
        Self {
            eth_price: DEFAULT_ETH_PRICE,
            timestamp: None,
            error: Some("Failed to fetch ETH price".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CoinGeckoResponse {
    ethereum: CoinGeckoPrice,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoPrice {
    usd: f64,
}

fn checked(price: f64) -> Result<f64, PriceError> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(PriceError::Invalid(price))
    }
}

/// Extract ETH/USD from a CoinGecko `simple/price` body
pub fn parse_upstream(body: &str) -> Result<f64, PriceError> {
    let response: CoinGeckoResponse = serde_json::from_str(body)?;
    checked(response.ethereum.usd)
}

/// Extract ETH/USD from a price endpoint body (including fallback answers)
pub fn parse_quote(body: &str) -> Result<f64, PriceError> {
    let quote: PriceQuote = serde_json::from_str(body)?;
    checked(quote.eth_price)
}

/// A rendered endpoint answer
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub quote: PriceQuote,
}

impl EndpointResponse {
    pub fn body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.quote)
    }
}

/// Build the endpoint answer from the upstream fetch result.
///
/// Always status 200: a failed or malformed upstream yields the fallback quote.
pub fn respond(upstream: Result<String, PriceError>, now_ms: f64) -> EndpointResponse {
    let quote = match upstream.and_then(|body| parse_upstream(&body)) {
        Ok(eth_price) => PriceQuote {
            eth_price,
            timestamp: Some(now_ms),
            error: None,
        },
        Err(e) => {
            log::error!("Error fetching ETH price: {}", e);
            PriceQuote::fallback()
        }
    };
    EndpointResponse { status: 200, quote }
}

/// Source of the current ETH/USD price
#[async_trait(?Send)]
pub trait PriceOracle {
    async fn eth_usd(&self) -> Result<f64, PriceError>;
}

/// Oracle with a constant answer (native runs and tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedPrice(pub f64);

#[async_trait(?Send)]
impl PriceOracle for FixedPrice {
    async fn eth_usd(&self) -> Result<f64, PriceError> {
        checked(self.0)
    }
}

/// Oracle that is always down
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachablePrice;

#[async_trait(?Send)]
impl PriceOracle for UnreachablePrice {
    async fn eth_usd(&self) -> Result<f64, PriceError> {
        Err(PriceError::Http("price service unreachable".to_string()))
    }
}
