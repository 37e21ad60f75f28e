//! Loop driver and screen lifecycle
//!
//! `Session` owns the [`GameState`] and moves it between screens:
//!
//! ```text
//! Menu --start (paid)--> Playing --collision--> GameOver --menu--> Menu
//!                                               GameOver --start (paid)--> Playing
//! ```
//!
//! The gate and the frame path never overlap: `start_session` holds
//! `&mut self` until the payment settles, and frames are ignored unless the
//! state is `Playing`. While the wallet waits for a signature the driver
//! cannot borrow the session, so `start_session` hands it the pending
//! snapshot through a callback instead.

use glam::Vec2;
use serde::Serialize;

use crate::gate::{GateError, SessionGate, TxId, Wallet};
use crate::highscores::HighScore;
use crate::platform::storage::KeyValueStore;
use crate::platform::time::{Clock, Timer};
use crate::price::PriceOracle;
use crate::sim::{GameState, GameStatus, TickInput, TickOutcome, advance};
use crate::tuning::{GateConfig, Tuning};

/// Shown while the wallet waits for the player to sign
pub const SIGN_PROMPT: &str = "Please confirm the transaction in your wallet";

/// Converts display-refresh timestamps into reference-frame deltas
#[derive(Debug, Clone)]
pub struct FramePacer {
    last: Option<f64>,
    frame_ms: f64,
}

impl FramePacer {
    pub fn new(frame_ms: f64) -> Self {
        Self {
            last: None,
            frame_ms,
        }
    }

    /// Forget the previous timestamp (new session)
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Frames elapsed since the previous call; 1.0 on the first call
    pub fn delta_frames(&mut self, timestamp: f64) -> f64 {
        let delta = match self.last {
            Some(last) => ((timestamp - last) / self.frame_ms).max(0.0),
            None => 1.0,
        };
        self.last = Some(timestamp);
        delta
    }
}

/// `m:ss` for the HUD clock
pub fn format_elapsed(ms: f64) -> String {
    let seconds = (ms.max(0.0) / 1000.0).floor() as u64;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// A circle as the renderer needs it
#[derive(Debug, Clone, Serialize)]
pub struct CircleView {
    pub pos: Vec2,
    pub color: &'static str,
}

/// An obstacle as the renderer needs it
#[derive(Debug, Clone, Serialize)]
pub struct ObstacleView {
    pub pos: Vec2,
    pub size: Vec2,
}

/// Everything the host draws for one frame
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HudSnapshot {
    pub status: GameStatus,
    pub score: u64,
    pub high_score: u64,
    /// Difficulty tier, 1-based
    pub level: u32,
    pub elapsed: String,
    pub transaction_pending: bool,
    pub message: Option<String>,
    pub circles: Vec<CircleView>,
    pub obstacles: Vec<ObstacleView>,
}

/// One player's run of sessions
pub struct Session {
    state: GameState,
    tuning: Tuning,
    gate_config: GateConfig,
    store: Box<dyn KeyValueStore>,
    pacer: FramePacer,
    message: Option<String>,
}

impl Session {
    /// Start on the menu with the persisted high score
    pub fn new(tuning: Tuning, gate_config: GateConfig, store: Box<dyn KeyValueStore>) -> Self {
        let high_score = HighScore::load(store.as_ref());
        let pacer = FramePacer::new(tuning.frame_ms());
        Self {
            state: GameState::new(high_score),
            tuning,
            gate_config,
            store,
            pacer,
            message: None,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn status(&self) -> GameStatus {
        self.state.status
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn gate_config(&self) -> &GateConfig {
        &self.gate_config
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Last user-facing gate message, if any
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Run the payment gate and, once paid, begin a fresh session.
    ///
    /// `on_pending` receives the snapshot with `transaction_pending` set, once
    /// the balance check has passed and before the payment is submitted.
    /// Any failure leaves the game on the menu with [`Session::message`] set.
    pub async fn start_session(
        &mut self,
        wallet: &dyn Wallet,
        oracle: &dyn PriceOracle,
        timer: &dyn Timer,
        clock: &dyn Clock,
        on_pending: &dyn Fn(&HudSnapshot),
    ) -> Result<TxId, GateError> {
        if self.state.transaction_pending || self.state.is_playing() {
            return Err(GateError::SessionBusy);
        }
        self.message = None;

        let config = self.gate_config.clone();
        let gate = SessionGate::new(wallet, oracle, timer, &config);

        let funds = match gate.check_funds().await {
            Ok(funds) => funds,
            Err(e) => return Err(self.reject(e)),
        };
        log::info!(
            "Balance ${:.4} covers the ${} entry fee",
            funds.balance_usd,
            config.minimum_usd
        );

        self.state.transaction_pending = true;
        self.message = Some(SIGN_PROMPT.to_string());
        on_pending(&self.snapshot());

        let paid = gate.pay(funds.eth_price).await;
        self.state.transaction_pending = false;
        self.message = None;

        match paid {
            Ok(tx) => {
                let now = clock.now_ms();
                let state = std::mem::take(&mut self.state);
                self.state = state.begin_session(now, now as u64);
                self.pacer.reset();
                log::info!("Session started (best {})", self.state.high_score);
                Ok(tx)
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    fn reject(&mut self, err: GateError) -> GateError {
        log::warn!("Session start failed: {}", err);
        self.message = Some(err.user_message());
        self.state.status = GameStatus::Menu;
        err
    }

    /// Advance one display frame. `timestamp` is the refresh callback time,
    /// `now` the wall clock the session start was measured against.
    pub fn frame(&mut self, timestamp: f64, now: f64, input: &TickInput) -> TickOutcome {
        if !self.state.is_playing() {
            return TickOutcome::Idle;
        }
        let delta_frames = self.pacer.delta_frames(timestamp);
        let state = std::mem::take(&mut self.state);
        let (next, outcome) = advance(state, now, delta_frames, input, &self.tuning);
        self.state = next;

        if let TickOutcome::Collided {
            final_score,
            new_high_score: true,
        } = outcome
        {
            HighScore::record(self.store.as_ref(), final_score);
        }
        outcome
    }

    /// Leave the game-over screen for the menu
    pub fn back_to_menu(&mut self) {
        if self.state.status == GameStatus::GameOver {
            self.state.status = GameStatus::Menu;
            self.message = None;
        }
    }

    pub fn snapshot(&self) -> HudSnapshot {
        let tuning = &self.tuning;
        HudSnapshot {
            status: self.state.status,
            score: self.state.score,
            high_score: self.state.high_score,
            level: self.state.difficulty + 1,
            elapsed: format_elapsed(self.state.elapsed_ms),
            transaction_pending: self.state.transaction_pending,
            message: self.message.clone(),
            circles: self
                .state
                .circles
                .iter()
                .map(|c| CircleView {
                    pos: c.position(tuning),
                    color: c.color.hex(),
                })
                .collect(),
            obstacles: self
                .state
                .obstacles
                .iter()
                .map(|o| ObstacleView {
                    pos: o.min(),
                    size: Vec2::new(o.width, o.height),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use async_trait::async_trait;
    use futures::executor::block_on;

    use super::*;
    use crate::gate::{Account, MemoryWallet, Payment, WalletError};
    use crate::platform::storage::MemoryStore;
    use crate::platform::time::ManualClock;
    use crate::price::FixedPrice;
    use crate::sim::spawn_obstacle;

    const ONE_ETH: u128 = 1_000_000_000_000_000_000;
    const START: f64 = 1_700_000_000_000.0;

    fn session_with_best(best: Option<&str>) -> Session {
        let store = MemoryStore::new();
        if let Some(best) = best {
            store.set(HighScore::STORAGE_KEY, best);
        }
        Session::new(Tuning::default(), GateConfig::default(), Box::new(store))
    }

    fn start(session: &mut Session, wallet: &MemoryWallet, clock: &ManualClock) -> Result<TxId, GateError> {
        block_on(session.start_session(wallet, &FixedPrice(2500.0), clock, clock, &|_| {}))
    }

    /// Records whether the host had been shown the pending screen by the
    /// time the wallet was asked to sign
    struct SigningWallet<'a> {
        inner: MemoryWallet,
        shown: &'a Cell<bool>,
        shown_at_signing: Cell<Option<bool>>,
    }

    #[async_trait(?Send)]
    impl Wallet for SigningWallet<'_> {
        fn account(&self) -> Option<Account> {
            self.inner.account()
        }

        async fn connect(&self) -> Result<(), WalletError> {
            self.inner.connect().await
        }

        async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
            self.inner.switch_chain(chain_id).await
        }

        async fn balance_wei(&self, chain_id: u64) -> Result<u128, WalletError> {
            self.inner.balance_wei(chain_id).await
        }

        async fn submit_payment(&self, payment: &Payment) -> Result<TxId, WalletError> {
            self.shown_at_signing.set(Some(self.shown.get()));
            self.inner.submit_payment(payment).await
        }
    }

    /// Drop an obstacle onto the top circle so the next frame collides
    fn force_collision(session: &mut Session) {
        let tuning = session.tuning.clone();
        let mut obstacle = spawn_obstacle(&mut rand_pcg::Pcg32::new(1, 1), 0, START, &tuning);
        obstacle.x = 390.0;
        obstacle.y = 450.0;
        session.state.obstacles.push(obstacle);
    }

    #[test]
    fn test_frame_pacer() {
        let mut pacer = FramePacer::new(1000.0 / 60.0);
        assert_eq!(pacer.delta_frames(5_000.0), 1.0);
        let d = pacer.delta_frames(5_000.0 + 1000.0 / 30.0);
        assert!((d - 2.0).abs() < 1e-9);
        pacer.reset();
        assert_eq!(pacer.delta_frames(9_000.0), 1.0);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0.0), "0:00");
        assert_eq!(format_elapsed(61_500.0), "1:01");
        assert_eq!(format_elapsed(600_000.0), "10:00");
    }

    #[test]
    fn test_loads_high_score() {
        let session = session_with_best(Some("300"));
        assert_eq!(session.state().high_score, 300);
        assert_eq!(session.status(), GameStatus::Menu);
    }

    #[test]
    fn test_paid_start_begins_session() {
        let mut session = session_with_best(None);
        let wallet = MemoryWallet::connected(8453, ONE_ETH);
        let clock = ManualClock::new(START);

        start(&mut session, &wallet, &clock).unwrap();
        assert_eq!(session.status(), GameStatus::Playing);
        assert!(!session.state().transaction_pending);
        assert_eq!(session.state().start_time, START);
        assert_eq!(wallet.payments().len(), 1);
        assert!(session.message().is_none());

        // A second start while playing is refused without paying
        assert!(matches!(start(&mut session, &wallet, &clock), Err(GateError::SessionBusy)));
        assert_eq!(wallet.payments().len(), 1);
    }

    #[test]
    fn test_pending_snapshot_precedes_signing() {
        let mut session = session_with_best(None);
        let shown = Cell::new(false);
        let pending = RefCell::new(Vec::new());
        let wallet = SigningWallet {
            inner: MemoryWallet::connected(8453, ONE_ETH),
            shown: &shown,
            shown_at_signing: Cell::new(None),
        };
        let clock = ManualClock::new(START);

        let on_pending = |snapshot: &HudSnapshot| {
            shown.set(snapshot.transaction_pending);
            pending.borrow_mut().push(snapshot.clone());
        };
        block_on(session.start_session(&wallet, &FixedPrice(2500.0), &clock, &clock, &on_pending)).unwrap();

        assert_eq!(wallet.shown_at_signing.get(), Some(true));
        let pending = pending.into_inner();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].transaction_pending);
        assert_eq!(pending[0].status, GameStatus::Menu);
        assert_eq!(pending[0].message.as_deref(), Some(SIGN_PROMPT));

        let after = session.snapshot();
        assert!(!after.transaction_pending);
        assert!(after.message.is_none());
        assert_eq!(after.status, GameStatus::Playing);
    }

    #[test]
    fn test_insufficient_funds_stays_on_menu() {
        let mut session = session_with_best(None);
        // $0.00005 at $2500/ETH
        let wallet = MemoryWallet::connected(8453, 20_000_000_000);
        let clock = ManualClock::new(START);

        let notified = Cell::new(false);
        let result = block_on(session.start_session(
            &wallet,
            &FixedPrice(2500.0),
            &clock,
            &clock,
            &|_| notified.set(true),
        ));
        assert!(!notified.get(), "no signing prompt before the balance check passes");

        let err = result.unwrap_err();
        assert!(matches!(err, GateError::InsufficientFunds { .. }));
        assert_eq!(session.status(), GameStatus::Menu);
        assert!(session.message().unwrap().starts_with("Insufficient funds"));
        assert!(wallet.payments().is_empty());
        assert!(!session.state().transaction_pending);
    }

    #[test]
    fn test_rejected_payment_clears_pending() {
        let mut session = session_with_best(None);
        let wallet = MemoryWallet::connected(8453, ONE_ETH);
        wallet.set_payment_outcome(Err(WalletError::Rejected("User rejected".into())));
        let clock = ManualClock::new(START);

        let err = start(&mut session, &wallet, &clock).unwrap_err();
        assert!(matches!(err, GateError::UserRejectedTransaction));
        assert_eq!(session.status(), GameStatus::Menu);
        assert!(!session.state().transaction_pending);
    }

    #[test]
    fn test_frames_ignored_on_menu() {
        let mut session = session_with_best(None);
        let outcome = session.frame(0.0, START + 10_000.0, &TickInput::default());
        assert_eq!(outcome, TickOutcome::Idle);
        assert_eq!(session.state().score, 0);
    }

    #[test]
    fn test_full_run_persists_high_score() {
        let mut session = session_with_best(Some("300"));
        let wallet = MemoryWallet::connected(8453, ONE_ETH);
        let clock = ManualClock::new(START);

        // First run ends with 500
        start(&mut session, &wallet, &clock).unwrap();
        let outcome = session.frame(16.0, START + 1_000.0, &TickInput::default());
        assert_eq!(outcome, TickOutcome::Continue);
        force_collision(&mut session);
        let outcome = session.frame(32.0, START + 50_000.0, &TickInput::default());
        assert_eq!(
            outcome,
            TickOutcome::Collided {
                final_score: 500,
                new_high_score: true
            }
        );
        assert_eq!(session.status(), GameStatus::GameOver);
        assert_eq!(HighScore::load(session.store()), 500);

        // Play again straight from game over; second run ends with 200
        clock.set(START + 100_000.0);
        start(&mut session, &wallet, &clock).unwrap();
        force_collision(&mut session);
        session.frame(48.0, START + 120_000.0, &TickInput::default());
        assert_eq!(session.status(), GameStatus::GameOver);
        assert_eq!(session.state().score, 200);
        assert_eq!(session.state().high_score, 500);
        assert_eq!(HighScore::load(session.store()), 500);

        session.back_to_menu();
        assert_eq!(session.status(), GameStatus::Menu);
    }

    #[test]
    fn test_snapshot() {
        let mut session = session_with_best(Some("12"));
        let wallet = MemoryWallet::connected(8453, ONE_ETH);
        let clock = ManualClock::new(START);
        start(&mut session, &wallet, &clock).unwrap();
        session.frame(0.0, START + 65_000.0, &TickInput::default());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.circles.len(), 2);
        assert_eq!(snapshot.elapsed, "1:05");
        assert_eq!(snapshot.level, 7);
        assert_eq!(snapshot.high_score, 12);
        assert_eq!(snapshot.circles[0].color, "#ef4444");

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"highScore\":12"));
    }
}
