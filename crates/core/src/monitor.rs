use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::frame::FrameExchange;
use crate::logger;
use crate::platform::InputBackend;
use crate::types::HealthState;

/// Sleep while disabled; frames are not consumed in that state.
const IDLE_SLEEP: Duration = Duration::from_millis(200);
/// Bounded wait for a fresh frame so the loop never stalls.
const FRAME_WAIT: Duration = Duration::from_millis(100);
/// Both ratios above this are comfortable and polling relaxes.
const COMFORT_RATIO: f64 = 0.8;
const RELAXED_SLEEP: Duration = Duration::from_millis(100);
const URGENT_SLEEP: Duration = Duration::from_millis(50);

/// Independent monitoring loop that heals and restores mana while other
/// actions are running, gated by per-action cooldowns.
pub struct HealthMonitor {
    heal_key: String,
    heal_ratio: f64,
    heal_cooldown: Duration,
    add_mp_key: String,
    add_mp_ratio: f64,
    mp_cooldown: Duration,
    press_hold: Duration,

    exchange: Arc<FrameExchange>,
    backend: Arc<Mutex<Box<dyn InputBackend>>>,
    state: Arc<Mutex<HealthState>>,
    enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,

    last_heal: Option<Instant>,
    last_mp: Option<Instant>,
}

/// External handle: enable/disable, stop, and the status read.
#[derive(Clone)]
pub struct MonitorControls {
    enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<HealthState>>,
}

impl MonitorControls {
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Eventually-consistent snapshot of the latest computed ratios.
    pub fn ratios(&self) -> (f64, f64) {
        match self.state.lock() {
            Ok(s) => (s.hp, s.mp),
            Err(_) => (1.0, 1.0),
        }
    }
}

impl HealthMonitor {
    pub fn new(
        cfg: &Config,
        exchange: Arc<FrameExchange>,
        backend: Arc<Mutex<Box<dyn InputBackend>>>,
    ) -> Self {
        Self {
            heal_key: cfg.heal_key.clone(),
            heal_ratio: cfg.heal_ratio,
            heal_cooldown: cfg.heal_cooldown(),
            add_mp_key: cfg.add_mp_key.clone(),
            add_mp_ratio: cfg.add_mp_ratio,
            mp_cooldown: cfg.mp_cooldown(),
            press_hold: cfg.press_hold(),
            exchange,
            backend,
            state: Arc::new(Mutex::new(HealthState::default())),
            enabled: Arc::new(AtomicBool::new(true)),
            running: Arc::new(AtomicBool::new(true)),
            last_heal: None,
            last_mp: None,
        }
    }

    pub fn controls(&self) -> MonitorControls {
        MonitorControls {
            enabled: Arc::clone(&self.enabled),
            running: Arc::clone(&self.running),
            state: Arc::clone(&self.state),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name("health-monitor".into())
            .spawn(move || self.run())
            .expect("spawning health monitor thread")
    }

    pub fn run(mut self) {
        logger::info("health monitor started");
        while self.running.load(Ordering::Relaxed) {
            self.poll();
        }
        logger::info("health monitor stopped");
    }

    /// One evaluation cycle. A bad frame or failed key press logs and
    /// leaves the loop running.
    fn poll(&mut self) {
        if !self.enabled.load(Ordering::Relaxed) {
            thread::sleep(IDLE_SLEEP);
            return;
        }
        if !self.exchange.wait_fresh(FRAME_WAIT) {
            // No new frame; do not re-evaluate stale data.
            return;
        }

        let (hp, mp) = self.exchange.ratios();
        if let Ok(mut state) = self.state.lock() {
            state.hp = hp;
            state.mp = mp;
        }

        let now = Instant::now();
        if hp <= self.heal_ratio
            && self.last_heal.map_or(true, |t| now.duration_since(t) > self.heal_cooldown)
        {
            let key = self.heal_key.clone();
            self.fire(&key);
            self.last_heal = Some(now);
            logger::info(&format!("auto heal triggered, HP: {:.1}%", hp * 100.0));
        }

        if mp <= self.add_mp_ratio
            && self.last_mp.map_or(true, |t| now.duration_since(t) > self.mp_cooldown)
        {
            let key = self.add_mp_key.clone();
            self.fire(&key);
            self.last_mp = Some(now);
            logger::info(&format!("auto MP triggered, MP: {:.1}%", mp * 100.0));
        }

        // Adaptive pacing: low latency exactly when a bar is low.
        if hp > COMFORT_RATIO && mp > COMFORT_RATIO {
            thread::sleep(RELAXED_SLEEP);
        } else {
            thread::sleep(URGENT_SLEEP);
        }
    }

    fn fire(&mut self, key: &str) {
        match self.backend.lock() {
            Ok(mut kb) => kb.press(key, self.press_hold),
            Err(_) => logger::error("input backend lock poisoned, recovery action skipped"),
        }
    }
}
