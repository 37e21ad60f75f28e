//! Fee-gated session start
//!
//! Before every session the player pays a small fixed USD fee in ETH. The
//! gate runs, in order and stopping at the first failure:
//!
//! 1. require a connected wallet
//! 2. fetch ETH/USD (falling back to a default price on failure)
//! 3. switch the wallet to the target chain if needed
//! 4. check the balance covers the fee
//! 5. submit the payment with the attribution suffix
//!
//! Wallet and price access are capabilities ([`Wallet`], [`PriceOracle`]);
//! chain semantics stay on the other side of those traits.

use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::platform::time::Timer;
use crate::price::{PriceError, PriceOracle};
use crate::tuning::GateConfig;

const WEI_PER_ETH: f64 = 1e18;

/// ERC-8021 trailing marker
const ERC8021_MARKER: [u8; 16] = [
    0x80, 0x21, 0x80, 0x21, 0x80, 0x21, 0x80, 0x21, 0x80, 0x21, 0x80, 0x21, 0x80, 0x21, 0x80, 0x21,
];

/// A connected wallet account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    pub chain_id: u64,
}

/// Failure reported by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The user declined in the wallet UI
    #[error("rejected by user: {0}")]
    Rejected(String),
    #[error("wallet request failed: {0}")]
    Failed(String),
}

impl WalletError {
    /// Classify a raw wallet error message
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("rejected") || lower.contains("denied") {
            WalletError::Rejected(message.to_string())
        } else {
            WalletError::Failed(message.to_string())
        }
    }
}

/// Transaction (or call bundle) identifier returned by the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxId(pub String);

/// Attribution codes that cannot be encoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributionError {
    #[error("no attribution code given")]
    Empty,
    /// The length prefix is a single byte
    #[error("attribution codes are {0} bytes; at most 255 fit")]
    TooLong(usize),
}

/// Revenue-share tag appended to the payment call data (ERC-8021 schema 0)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    codes: String,
}

impl Attribution {
    pub fn new(code: impl Into<String>) -> Result<Self, AttributionError> {
        Self::with_codes([code.into()])
    }

    /// Several codes, comma separated on the wire
    pub fn with_codes<I, S>(codes: I) -> Result<Self, AttributionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes: Vec<String> = codes.into_iter().map(|c| c.as_ref().to_string()).collect();
        let codes = codes.join(",");
        if codes.is_empty() {
            return Err(AttributionError::Empty);
        }
        if codes.len() > u8::MAX as usize {
            return Err(AttributionError::TooLong(codes.len()));
        }
        Ok(Self { codes })
    }

    pub fn codes(&self) -> &str {
        &self.codes
    }

    /// `codes ‖ codes length ‖ schema id ‖ marker`, hex encoded with `0x`
    pub fn data_suffix(&self) -> String {
        let mut bytes = self.codes.as_bytes().to_vec();
        bytes.push(self.codes.len() as u8);
        bytes.push(0);
        bytes.extend_from_slice(&ERC8021_MARKER);
        format!("0x{}", hex::encode(bytes))
    }
}

fn wei_as_string<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// The single entry-fee call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub chain_id: u64,
    pub to: String,
    #[serde(serialize_with = "wei_as_string")]
    pub value_wei: u128,
    pub data: String,
    pub data_suffix: String,
}

/// Convert an ETH amount to wei, rounding to the nearest unit
pub fn eth_to_wei(eth: f64) -> u128 {
    if eth <= 0.0 || !eth.is_finite() {
        return 0;
    }
    (eth * WEI_PER_ETH).round() as u128
}

pub fn wei_to_eth(wei: u128) -> f64 {
    wei as f64 / WEI_PER_ETH
}

/// Wallet capabilities the gate relies on
#[async_trait(?Send)]
pub trait Wallet {
    /// Connected account, if any
    fn account(&self) -> Option<Account>;
    async fn connect(&self) -> Result<(), WalletError>;
    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;
    async fn balance_wei(&self, chain_id: u64) -> Result<u128, WalletError>;
    /// May wait indefinitely for the user to confirm
    async fn submit_payment(&self, payment: &Payment) -> Result<TxId, WalletError>;
}

/// Why a session could not start
#[derive(Debug, Error)]
pub enum GateError {
    #[error("wallet not connected")]
    NotConnected,
    /// Recovered inside the gate by the fallback price
    #[error("price fetch failed: {0}")]
    PriceFetchFailed(#[from] PriceError),
    #[error("network switch to chain {chain_id} rejected: {reason}")]
    NetworkSwitchRejected { chain_id: u64, reason: String },
    #[error("balance unavailable: {0}")]
    BalanceUnavailable(String),
    #[error("insufficient funds: need ${required_usd}, have ${available_usd}")]
    InsufficientFunds {
        required_usd: f64,
        required_eth: f64,
        available_usd: f64,
    },
    #[error("transaction rejected by user")]
    UserRejectedTransaction,
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
    #[error("a session is already starting or running")]
    SessionBusy,
    #[error("bad attribution: {0}")]
    Attribution(#[from] AttributionError),
}

impl GateError {
    /// The single message shown to the player
    pub fn user_message(&self) -> String {
        match self {
            GateError::NotConnected => "Please connect your wallet to play".to_string(),
            GateError::PriceFetchFailed(_) => "Could not fetch the ETH price".to_string(),
            GateError::NetworkSwitchRejected { .. } => {
                "Please switch your wallet to Base to play".to_string()
            }
            GateError::BalanceUnavailable(_) => "Failed to check balance".to_string(),
            GateError::InsufficientFunds {
                required_usd,
                required_eth,
                ..
            } => format!(
                "Insufficient funds. You need at least ${:.4} (≈{:.8} ETH) to play.",
                required_usd, required_eth
            ),
            GateError::UserRejectedTransaction => {
                "Transaction cancelled. Please sign the transaction to play.".to_string()
            }
            GateError::TransactionFailed(_) => "Transaction failed. Please try again.".to_string(),
            GateError::SessionBusy => "A game is already starting".to_string(),
            GateError::Attribution(_) => "Payment is unavailable right now".to_string(),
        }
    }
}

impl From<WalletError> for GateError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected(_) => GateError::UserRejectedTransaction,
            WalletError::Failed(reason) => GateError::TransactionFailed(reason),
        }
    }
}

/// Result of steps 1-4
#[derive(Debug, Clone, PartialEq)]
pub struct FundsCheck {
    pub account: Account,
    pub eth_price: f64,
    pub balance_eth: f64,
    pub balance_usd: f64,
}

/// The pre-session payment gate
pub struct SessionGate<'a> {
    pub wallet: &'a dyn Wallet,
    pub oracle: &'a dyn PriceOracle,
    pub timer: &'a dyn Timer,
    pub config: &'a GateConfig,
}

impl<'a> SessionGate<'a> {
    pub fn new(
        wallet: &'a dyn Wallet,
        oracle: &'a dyn PriceOracle,
        timer: &'a dyn Timer,
        config: &'a GateConfig,
    ) -> Self {
        Self {
            wallet,
            oracle,
            timer,
            config,
        }
    }

    /// ETH/USD, or the configured fallback when the oracle fails
    pub async fn eth_price(&self) -> f64 {
        match self.oracle.eth_usd().await {
            Ok(price) => price,
            Err(e) => {
                let err = GateError::from(e);
                log::warn!("{}; using fallback ${}", err, self.config.fallback_eth_price);
                self.config.fallback_eth_price
            }
        }
    }

    /// Steps 1-4: connection, price, chain, balance
    pub async fn check_funds(&self) -> Result<FundsCheck, GateError> {
        let account = self.wallet.account().ok_or(GateError::NotConnected)?;
        let eth_price = self.eth_price().await;

        if account.chain_id != self.config.chain_id {
            log::info!(
                "Switching wallet from chain {} to {}",
                account.chain_id,
                self.config.chain_id
            );
            self.wallet
                .switch_chain(self.config.chain_id)
                .await
                .map_err(|e| GateError::NetworkSwitchRejected {
                    chain_id: self.config.chain_id,
                    reason: e.to_string(),
                })?;
            self.timer.sleep(self.config.switch_settle_ms).await;
        }

        let balance_wei = self
            .wallet
            .balance_wei(self.config.chain_id)
            .await
            .map_err(|e| GateError::BalanceUnavailable(e.to_string()))?;
        let balance_eth = wei_to_eth(balance_wei);
        let balance_usd = balance_eth * eth_price;

        if balance_usd < self.config.minimum_usd {
            return Err(GateError::InsufficientFunds {
                required_usd: self.config.minimum_usd,
                required_eth: self.config.minimum_usd / eth_price,
                available_usd: balance_usd,
            });
        }

        Ok(FundsCheck {
            account,
            eth_price,
            balance_eth,
            balance_usd,
        })
    }

    /// The fee call for the given price
    pub fn payment(&self, eth_price: f64) -> Result<Payment, GateError> {
        let attribution = Attribution::new(self.config.builder_code.clone())?;
        Ok(Payment {
            chain_id: self.config.chain_id,
            to: self.config.recipient.clone(),
            value_wei: eth_to_wei(self.config.minimum_usd / eth_price),
            data: self.config.call_data.clone(),
            data_suffix: attribution.data_suffix(),
        })
    }

    /// Step 5: submit the fee and wait for the wallet's answer
    pub async fn pay(&self, eth_price: f64) -> Result<TxId, GateError> {
        let payment = self.payment(eth_price)?;
        log::info!(
            "Submitting entry fee of {} wei to {}",
            payment.value_wei,
            payment.to
        );
        let tx = self.wallet.submit_payment(&payment).await?;
        log::info!("Entry fee submitted: {}", tx.0);
        Ok(tx)
    }
}

/// In-memory wallet used by headless runs and tests
#[derive(Debug)]
pub struct MemoryWallet {
    account: RefCell<Option<Account>>,
    address: String,
    chain_id: Cell<u64>,
    balance_wei: Cell<u128>,
    reject_switch: Cell<bool>,
    payment_outcome: RefCell<Result<(), WalletError>>,
    payments: RefCell<Vec<Payment>>,
}

impl MemoryWallet {
    /// Connected on `chain_id` with the given balance, approving everything
    pub fn connected(chain_id: u64, balance_wei: u128) -> Self {
        let address = "0x00000000000000000000000000000000000d0e7a".to_string();
        Self {
            account: RefCell::new(Some(Account {
                address: address.clone(),
                chain_id,
            })),
            address,
            chain_id: Cell::new(chain_id),
            balance_wei: Cell::new(balance_wei),
            reject_switch: Cell::new(false),
            payment_outcome: RefCell::new(Ok(())),
            payments: RefCell::new(Vec::new()),
        }
    }

    /// Not connected; `connect` attaches it on chain 8453 with no balance
    pub fn disconnected() -> Self {
        let wallet = Self::connected(8453, 0);
        wallet.account.replace(None);
        wallet
    }

    pub fn set_balance_wei(&self, wei: u128) {
        self.balance_wei.set(wei);
    }

    pub fn reject_switch(&self, reject: bool) {
        self.reject_switch.set(reject);
    }

    /// Outcome of the next payment submissions
    pub fn set_payment_outcome(&self, outcome: Result<(), WalletError>) {
        self.payment_outcome.replace(outcome);
    }

    /// Payments submitted so far
    pub fn payments(&self) -> Vec<Payment> {
        self.payments.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Wallet for MemoryWallet {
    fn account(&self) -> Option<Account> {
        self.account.borrow().clone()
    }

    async fn connect(&self) -> Result<(), WalletError> {
        self.account.replace(Some(Account {
            address: self.address.clone(),
            chain_id: self.chain_id.get(),
        }));
        Ok(())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        if self.reject_switch.get() {
            return Err(WalletError::Rejected("User rejected the request.".to_string()));
        }
        self.chain_id.set(chain_id);
        if let Some(account) = self.account.borrow_mut().as_mut() {
            account.chain_id = chain_id;
        }
        Ok(())
    }

    async fn balance_wei(&self, _chain_id: u64) -> Result<u128, WalletError> {
        Ok(self.balance_wei.get())
    }

    async fn submit_payment(&self, payment: &Payment) -> Result<TxId, WalletError> {
        self.payment_outcome.borrow().clone()?;
        let mut payments = self.payments.borrow_mut();
        payments.push(payment.clone());
        self.balance_wei
            .set(self.balance_wei.get().saturating_sub(payment.value_wei));
        Ok(TxId(format!("0x{:064x}", payments.len())))
    }
}
