//! Duet entry point
//!
//! On the web this wires the page (keys, touches, buttons, host bridge) to a
//! [`duet::Session`] and drives it from `requestAnimationFrame`. Natively it
//! plays a few headless sessions with an autopilot against an in-memory
//! wallet, which is handy for checking balance changes.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::prelude::*;
    use web_sys::{KeyboardEvent, TouchEvent};

    use duet::platform::storage::LocalStore;
    use duet::platform::web::{FetchPriceOracle, WebHost};
    use duet::platform::{HeldInput, Side, SystemClock, SystemTimer, announce_ready, auto_connect};
    use duet::sim::TickOutcome;
    use duet::session::HudSnapshot;
    use duet::{GateConfig, Session, Tuning};

    /// Game instance holding all state
    struct Game {
        session: Session,
        input: HeldInput,
    }

    type Shared = Rc<RefCell<Game>>;

    fn render_snapshot(snapshot: &HudSnapshot, host: &WebHost) {
        match serde_json::to_string(snapshot) {
            Ok(json) => host.render(&json),
            Err(e) => log::warn!("Snapshot encode failed: {}", e),
        }
    }

    fn render(game: &Game, host: &WebHost) {
        render_snapshot(&game.session.snapshot(), host);
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Duet starting...");

        let Some(host) = WebHost::from_window() else {
            log::error!("window.duetHost is missing; nothing to drive");
            return;
        };
        let host = Rc::new(host);

        announce_ready(host.as_ref(), &SystemTimer).await;
        auto_connect(host.as_ref(), host.as_ref(), &SystemTimer).await;

        let session = Session::new(Tuning::default(), GateConfig::default(), Box::new(LocalStore));
        let game = Rc::new(RefCell::new(Game {
            session,
            input: HeldInput::default(),
        }));

        setup_keyboard(game.clone());
        setup_touch(game.clone());
        setup_buttons(game.clone(), host.clone());

        render(&game.borrow(), &host);
        log::info!("Duet running!");
    }

    fn setup_keyboard(game: Shared) {
        let window = web_sys::window().unwrap();
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if let Ok(mut g) = game.try_borrow_mut() {
                    g.input.key_down(&event.key());
                }
            });
            let _ = window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if let Ok(mut g) = game.try_borrow_mut() {
                    g.input.key_up(&event.key());
                }
            });
            let _ = window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        // Drop holds when focus leaves, or keys stay stuck down
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if let Ok(mut g) = game.try_borrow_mut() {
                    g.input.release_all();
                }
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn touch_sides(event: &TouchEvent) -> Vec<Side> {
        let width = web_sys::window()
            .and_then(|w| w.inner_width().ok())
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0);
        let touches = event.changed_touches();
        (0..touches.length())
            .filter_map(|i| touches.get(i))
            .map(|t| Side::from_touch(t.client_x() as f64, width))
            .collect()
    }

    fn setup_touch(game: Shared) {
        let document = web_sys::window().unwrap().document().unwrap();
        for (name, held) in [("touchstart", true), ("touchend", false), ("touchcancel", false)] {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                if let Ok(mut g) = game.try_borrow_mut() {
                    for side in touch_sides(&event) {
                        g.input.set(side, held);
                    }
                }
            });
            let _ = document.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_buttons(game: Shared, host: Rc<WebHost>) {
        let document = web_sys::window().unwrap().document().unwrap();

        // Start / play again
        if let Some(btn) = document.get_element_by_id("start-btn") {
            let game = game.clone();
            let host = host.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                let game = game.clone();
                let host = host.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    start_session(game, host).await;
                });
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Back to menu
        if let Some(btn) = document.get_element_by_id("menu-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                if let Ok(mut g) = game.try_borrow_mut() {
                    g.session.back_to_menu();
                    render(&g, &host);
                }
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    async fn start_session(game: Shared, host: Rc<WebHost>) {
        let Ok(mut g) = game.try_borrow_mut() else {
            log::warn!("Start ignored: session busy");
            return;
        };
        let oracle = FetchPriceOracle {
            endpoint: g.session.gate_config().price_endpoint.clone(),
        };
        // The session stays borrowed until the wallet answers, so the
        // signing prompt is drawn from the snapshot handed to this callback
        let show_pending = |snapshot: &HudSnapshot| render_snapshot(snapshot, &host);
        let result = g
            .session
            .start_session(host.as_ref(), &oracle, &SystemTimer, &SystemClock, &show_pending)
            .await;
        g.input.release_all();
        render(&g, &host);
        drop(g);

        if result.is_ok() {
            request_animation_frame(game, host);
        }
    }

    fn request_animation_frame(game: Shared, host: Rc<WebHost>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::once(move |time: f64| {
            game_loop(game, host, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Shared, host: Rc<WebHost>, time: f64) {
        let playing = {
            let mut g = game.borrow_mut();
            let input = g.input.tick_input();
            let outcome = g.session.frame(time, js_sys::Date::now(), &input);
            if let TickOutcome::Collided { final_score, new_high_score } = outcome {
                log::info!("Game over: {} (new best: {})", final_score, new_high_score);
            }
            render(&g, &host);
            g.session.state().is_playing()
        };

        if playing {
            request_animation_frame(game, host);
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use async_trait::async_trait;

    use duet::gate::MemoryWallet;
    use duet::platform::host::HostError;
    use duet::platform::{
        Clock, HostBridge, HostEnvironment, ManualClock, MemoryStore, SystemClock, announce_ready,
    };
    use duet::price::{DEFAULT_ETH_PRICE, FixedPrice};
    use duet::session::HudSnapshot;
    use duet::sim::{GameState, TickInput, TickOutcome};
    use duet::{GateConfig, Session, Tuning, format_elapsed};

    /// Give up on a run after five simulated minutes
    const MAX_FRAMES: u32 = 60 * 60 * 5;
    /// Obstacles farther than this from a circle are ignored by the autopilot
    const DANGER_RADIUS: f32 = 90.0;

    struct HeadlessHost;

    #[async_trait(?Send)]
    impl HostBridge for HeadlessHost {
        fn environment(&self) -> HostEnvironment {
            HostEnvironment::Standalone
        }

        async fn signal_ready(&self) -> Result<(), HostError> {
            Ok(())
        }
    }

    /// Rotate so the circle nearest to danger moves horizontally away from it
    fn autopilot(state: &GameState, tuning: &Tuning) -> TickInput {
        let threat = state
            .circles
            .iter()
            .flat_map(|circle| {
                let pos = circle.position(tuning);
                state.obstacles.iter().map(move |o| {
                    let center = (o.min() + o.max()) * 0.5;
                    (circle.angle, pos, center, pos.distance(center))
                })
            })
            .filter(|(_, _, center, dist)| *dist < DANGER_RADIUS && center.y < tuning.center_y + tuning.orbit_radius)
            .min_by(|a, b| a.3.total_cmp(&b.3));

        match threat {
            Some((angle, pos, center, _)) => {
                let want_right = center.x < pos.x;
                let clockwise_moves_right = -angle.sin() > 0.0;
                let right = want_right == clockwise_moves_right;
                TickInput { left: !right, right }
            }
            None => TickInput::default(),
        }
    }

    pub async fn run(tuning: Tuning, runs: u32) {
        let clock = ManualClock::new(SystemClock.now_ms());
        announce_ready(&HeadlessHost, &clock).await;

        // 0.001 ETH on mainnet, so the first start has to switch chains
        let wallet = MemoryWallet::connected(1, 1_000_000_000_000_000);
        let oracle = FixedPrice(DEFAULT_ETH_PRICE);
        let frame_ms = tuning.frame_ms();
        let mut session = Session::new(tuning, GateConfig::default(), Box::new(MemoryStore::new()));

        for run in 1..=runs {
            let on_pending = |snapshot: &HudSnapshot| {
                log::info!("{}", snapshot.message.as_deref().unwrap_or("Waiting for payment"));
            };
            if let Err(e) = session
                .start_session(&wallet, &oracle, &clock, &clock, &on_pending)
                .await
            {
                log::error!("Run {} could not start: {}", run, e);
                println!("{}", e.user_message());
                return;
            }

            let mut timestamp = 0.0;
            let mut frames = 0;
            loop {
                clock.advance(frame_ms);
                timestamp += frame_ms;
                frames += 1;
                let input = autopilot(session.state(), session.tuning());
                if let TickOutcome::Collided { final_score, new_high_score } =
                    session.frame(timestamp, clock.now_ms(), &input)
                {
                    println!(
                        "Run {}: score {} in {}{}",
                        run,
                        final_score,
                        format_elapsed(session.state().elapsed_ms),
                        if new_high_score { " (new best)" } else { "" }
                    );
                    break;
                }
                if frames >= MAX_FRAMES {
                    println!("Run {}: survived {} frames, stopping", run, frames);
                    break;
                }
            }
            session.back_to_menu();
        }

        println!(
            "Best: {}  Paid: {} fee(s)",
            session.state().high_score,
            wallet.payments().len()
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Duet (native) starting headless runs...");

    let tuning = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|json| duet::Tuning::from_json(&json).map_err(|e| e.to_string()))
        {
            Ok(tuning) => tuning,
            Err(e) => {
                log::error!("Could not load tuning from {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => duet::Tuning::default(),
    };

    futures::executor::block_on(headless::run(tuning, 3));
}
