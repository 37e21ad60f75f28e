//! Browser bindings
//!
//! The page supplies a `window.duetHost` object wrapping its wallet library
//! and embedding SDK. Its shape:
//!
//! ```text
//! environment(): "farcaster" | "baseapp" | "standalone"
//! ready(): Promise<void>
//! account(): string | null            // JSON { address, chainId }
//! connect(): Promise<void>
//! switchChain(chainId): Promise<void>
//! balanceWei(chainId): Promise<string> // decimal wei
//! sendPayment(paymentJson): Promise<string>
//! render(snapshotJson): void
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::host::{HostBridge, HostEnvironment, HostError};
use crate::gate::{Account, Payment, TxId, Wallet, WalletError};
use crate::price::{PriceError, PriceOracle, parse_quote};

#[wasm_bindgen]
extern "C" {
    pub type JsHost;

    #[wasm_bindgen(method)]
    fn environment(this: &JsHost) -> String;

    #[wasm_bindgen(method, catch)]
    async fn ready(this: &JsHost) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method)]
    fn account(this: &JsHost) -> Option<String>;

    #[wasm_bindgen(method, catch)]
    async fn connect(this: &JsHost) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = switchChain)]
    async fn switch_chain(this: &JsHost, chain_id: f64) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = balanceWei)]
    async fn balance_wei(this: &JsHost, chain_id: f64) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = sendPayment)]
    async fn send_payment(this: &JsHost, payment_json: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method)]
    fn render(this: &JsHost, snapshot_json: &str);
}

/// Best-effort text of a thrown JS value
fn js_message(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    format!("{:?}", value)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsAccount {
    address: String,
    chain_id: u64,
}

/// Wallet and host capabilities backed by `window.duetHost`
pub struct WebHost {
    js: JsHost,
}

impl WebHost {
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        let value = js_sys::Reflect::get(&window, &JsValue::from_str("duetHost")).ok()?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
        Some(Self {
            js: value.unchecked_into(),
        })
    }

    /// Hand a frame snapshot to the page renderer
    pub fn render(&self, snapshot_json: &str) {
        self.js.render(snapshot_json);
    }
}

#[async_trait(?Send)]
impl HostBridge for WebHost {
    fn environment(&self) -> HostEnvironment {
        HostEnvironment::from_name(&self.js.environment())
    }

    async fn signal_ready(&self) -> Result<(), HostError> {
        self.js
            .ready()
            .await
            .map(|_| ())
            .map_err(|e| HostError::NotReady(js_message(&e)))
    }
}

#[async_trait(?Send)]
impl Wallet for WebHost {
    fn account(&self) -> Option<Account> {
        let json = self.js.account()?;
        match serde_json::from_str::<JsAccount>(&json) {
            Ok(account) => Some(Account {
                address: account.address,
                chain_id: account.chain_id,
            }),
            Err(e) => {
                log::warn!("Unreadable account from host: {}", e);
                None
            }
        }
    }

    async fn connect(&self) -> Result<(), WalletError> {
        self.js
            .connect()
            .await
            .map(|_| ())
            .map_err(|e| WalletError::from_message(&js_message(&e)))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        self.js
            .switch_chain(chain_id as f64)
            .await
            .map(|_| ())
            .map_err(|e| WalletError::from_message(&js_message(&e)))
    }

    async fn balance_wei(&self, chain_id: u64) -> Result<u128, WalletError> {
        let value = self
            .js
            .balance_wei(chain_id as f64)
            .await
            .map_err(|e| WalletError::Failed(js_message(&e)))?;
        let text = value
            .as_string()
            .ok_or_else(|| WalletError::Failed("balance is not a string".to_string()))?;
        text.trim()
            .parse::<u128>()
            .map_err(|e| WalletError::Failed(format!("bad balance {:?}: {}", text, e)))
    }

    async fn submit_payment(&self, payment: &Payment) -> Result<TxId, WalletError> {
        let json = serde_json::to_string(payment).map_err(|e| WalletError::Failed(e.to_string()))?;
        let value = self
            .js
            .send_payment(&json)
            .await
            .map_err(|e| WalletError::from_message(&js_message(&e)))?;
        Ok(TxId(value.as_string().unwrap_or_default()))
    }
}

/// Price oracle querying the site's price endpoint with `fetch`
pub struct FetchPriceOracle {
    pub endpoint: String,
}

#[async_trait(?Send)]
impl PriceOracle for FetchPriceOracle {
    async fn eth_usd(&self) -> Result<f64, PriceError> {
        let window = web_sys::window().ok_or_else(|| PriceError::Http("no window".to_string()))?;
        let response = JsFuture::from(window.fetch_with_str(&self.endpoint))
            .await
            .map_err(|e| PriceError::Http(js_message(&e)))?;
        let response: web_sys::Response = response
            .dyn_into()
            .map_err(|e| PriceError::Http(js_message(&e)))?;
        if !response.ok() {
            return Err(PriceError::Status(response.status()));
        }
        let text = response.text().map_err(|e| PriceError::Http(js_message(&e)))?;
        let body = JsFuture::from(text)
            .await
            .map_err(|e| PriceError::Http(js_message(&e)))?
            .as_string()
            .ok_or_else(|| PriceError::Http("price body is not text".to_string()))?;
        parse_quote(&body)
    }
}
