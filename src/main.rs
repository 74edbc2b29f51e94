use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;

use autoplay_core::command::CommandSlot;
use autoplay_core::config::Config;
use autoplay_core::controller::KeyController;
use autoplay_core::frame::FrameExchange;
use autoplay_core::logger;
use autoplay_core::monitor::HealthMonitor;
use autoplay_core::platform::hotkey::{start_hotkey_listener, HotkeySignals};
use autoplay_core::platform::{create_backend, create_focus_probe, InputBackend};

fn main() -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let logs_dir = cwd.join("logs");
    let shots_dir = cwd.join("screenshots");
    let config_path = cwd.join("autoplay.json");

    logger::init(&logs_dir);

    let cfg = Config::load(&config_path);
    if !config_path.exists() {
        // First run: write the defaults out as an editable template.
        cfg.save(&config_path);
    }
    logger::info(&format!(
        "autoplay started (window '{}', backend {:?}, fps limit {})",
        cfg.game_window_title, cfg.backend, cfg.fps_limit
    ));

    let exchange = Arc::new(FrameExchange::new(cfg.hp_bar, cfg.mp_bar, cfg.border_correction));
    let backend: Arc<Mutex<Box<dyn InputBackend>>> =
        Arc::new(Mutex::new(create_backend(&cfg, force_stub)));
    let focus = create_focus_probe(&cfg, force_stub);
    let slot = Arc::new(CommandSlot::new());

    let signals = Arc::new(HotkeySignals::default());
    start_hotkey_listener(Arc::clone(&signals), cfg.debounce_interval());

    let monitor = HealthMonitor::new(&cfg, Arc::clone(&exchange), Arc::clone(&backend));
    let monitor_controls = monitor.controls();
    let monitor_handle = monitor.spawn();

    let controller = KeyController::new(
        &cfg,
        Arc::clone(&backend),
        focus,
        Arc::clone(&slot),
        Arc::clone(&signals),
    );
    let controller_controls = controller.controls();
    let controller_handle = controller.spawn();

    // Screenshot requests arrive via F2; serviced off the input loops so a
    // slow disk never stalls dispatch.
    let running = Arc::new(AtomicBool::new(true));
    let shot_handle = {
        let running = Arc::clone(&running);
        let signals = Arc::clone(&signals);
        let exchange = Arc::clone(&exchange);
        thread::Builder::new()
            .name("screenshot".into())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    if signals.screenshot.swap(false, Ordering::AcqRel) {
                        match exchange.save_debug(&shots_dir) {
                            Ok(()) => logger::info("bar regions saved for calibration"),
                            Err(e) => logger::warn(&format!("screenshot failed: {}", e)),
                        }
                    }
                    thread::sleep(Duration::from_millis(100));
                }
            })
            .expect("spawning screenshot thread")
    };

    println!("commands on stdin ('status', 'quit', or a control command like 'walk left')");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let cmd = line.trim();
        match cmd {
            "quit" | "exit" => break,
            "status" => {
                let (hp, mp) = monitor_controls.ratios();
                println!(
                    "HP {:.1}%  MP {:.1}%  dispatch {} fps",
                    hp * 100.0,
                    mp * 100.0,
                    controller_controls.measured_fps()
                );
                io::stdout().flush()?;
            }
            other => slot.set(other),
        }
    }

    logger::info("shutting down");
    monitor_controls.stop();
    controller_controls.stop();
    running.store(false, Ordering::Relaxed);
    let _ = monitor_handle.join();
    let _ = controller_handle.join();
    let _ = shot_handle.join();

    Ok(())
}
