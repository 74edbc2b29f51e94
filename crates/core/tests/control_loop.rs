//! End-to-end checks over the spawned loops: a published frame with a low
//! HP bar leads to exactly one heal press per cooldown window, and the
//! dispatcher honors commands from another thread.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use autoplay_core::command::CommandSlot;
use autoplay_core::config::Config;
use autoplay_core::controller::KeyController;
use autoplay_core::frame::FrameExchange;
use autoplay_core::monitor::HealthMonitor;
use autoplay_core::platform::hotkey::HotkeySignals;
use autoplay_core::platform::stub::{AlwaysActive, StubBackend};
use autoplay_core::platform::InputBackend;
use autoplay_core::types::{BarRect, KeyEvent};

fn shared_stub() -> (Arc<Mutex<Box<dyn InputBackend>>>, Arc<Mutex<Vec<KeyEvent>>>) {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let backend: Arc<Mutex<Box<dyn InputBackend>>> = Arc::new(Mutex::new(Box::new(
        StubBackend::recording(Arc::clone(&sink)),
    )));
    (backend, sink)
}

/// 20x4 RGB frame: hp row (y=0) has `hp_empty` of 10 pixels gray, mp row
/// (y=1) fully colored.
fn frame(hp_empty: usize) -> Vec<u8> {
    let mut data = vec![0u8; 20 * 4 * 3];
    for x in 0..20 {
        for y in 0..4 {
            let px = (y * 20 + x) * 3;
            let colored = y == 1 || (y == 0 && x >= hp_empty);
            let (r, g, b) = if colored { (200, 30, 30) } else { (128, 128, 128) };
            data[px] = r;
            data[px + 1] = g;
            data[px + 2] = b;
        }
    }
    data
}

fn presses_of(events: &Arc<Mutex<Vec<KeyEvent>>>, key: &str) -> usize {
    events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.key == key && e.down)
        .count()
}

/// Poll until `cond` holds or the deadline passes.
fn wait_for(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn low_hp_frame_triggers_one_heal_per_cooldown() {
    let mut cfg = Config::default();
    cfg.heal_key = "1".into();
    cfg.heal_ratio = 0.3;
    cfg.heal_cooldown_ms = 60_000;
    cfg.add_mp_ratio = 0.3;
    cfg.key_press_duration_ms = 0;

    let exchange = Arc::new(FrameExchange::new(
        BarRect::new((0, 0), (9, 0)),
        BarRect::new((0, 1), (9, 1)),
        0,
    ));
    let (backend, sink) = shared_stub();
    let monitor = HealthMonitor::new(&cfg, Arc::clone(&exchange), backend);
    let controls = monitor.controls();
    let handle = monitor.spawn();

    // hp 0.10, well below the 0.3 threshold. Contended publishes are
    // dropped by design, so keep publishing until the monitor reacts.
    assert!(
        wait_for(Duration::from_secs(2), || {
            exchange.publish(&frame(9), 20, 4);
            presses_of(&sink, "1") == 1
        }),
        "expected one heal press"
    );

    // Even lower, but inside the cooldown window: no second press.
    assert!(
        wait_for(Duration::from_secs(1), || {
            exchange.publish(&frame(10), 20, 4);
            controls.ratios().0 == 0.0
        }),
        "expected the fully-empty bar to be observed"
    );
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(presses_of(&sink, "1"), 1);
    assert_eq!(presses_of(&sink, "2"), 0);
    assert_eq!(controls.ratios().1, 1.0);

    controls.stop();
    handle.join().unwrap();
}

#[test]
fn dispatcher_runs_commands_from_another_thread() {
    let mut cfg = Config::default();
    cfg.key_press_duration_ms = 0;
    cfg.character_turn_delay_ms = 0;
    cfg.fps_limit = 200;

    let (backend, sink) = shared_stub();
    let slot = Arc::new(CommandSlot::new());
    let signals = Arc::new(HotkeySignals::default());
    let controller = KeyController::new(
        &cfg,
        backend,
        Box::new(AlwaysActive),
        Arc::clone(&slot),
        Arc::clone(&signals),
    );
    let controls = controller.controls();
    let handle = controller.spawn();

    slot.set("walk left");
    assert!(
        wait_for(Duration::from_secs(2), || {
            sink.lock().unwrap().contains(&KeyEvent::down("left"))
        }),
        "expected the sustained walk to hold 'left'"
    );

    slot.set("stop");
    assert!(
        wait_for(Duration::from_secs(2), || slot.sustained().is_none()),
        "stop should clear the sustained slot"
    );
    assert!(
        wait_for(Duration::from_secs(2), || {
            sink.lock().unwrap().contains(&KeyEvent::up("left"))
        }),
        "stop should release 'left'"
    );

    controls.stop();
    handle.join().unwrap();

    // Shutdown leaves nothing held: the last transition of every key that
    // ever went down is an up.
    let events = sink.lock().unwrap();
    for key in ["left", "right", "up", "down"] {
        let last_down = events.iter().rposition(|e| e.key == key && e.down);
        let last_up = events.iter().rposition(|e| e.key == key && !e.down);
        if let Some(d) = last_down {
            assert!(last_up.map_or(false, |u| u > d), "'{key}' left held");
        }
    }
}
