use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::command::{Command, CommandSlot};
use crate::config::Config;
use crate::logger;
use crate::platform::hotkey::HotkeySignals;
use crate::platform::{FocusProbe, InputBackend};

/// Fixed-rate dispatcher loop: drains the command mailbox into timed key
/// sequences, schedules buff casts, auto-releases drag keys, and paces
/// itself to the configured frame rate.
pub struct KeyController {
    jump_key: String,
    teleport_key: String,
    attack_key: String,
    heal_key: String,
    add_mp_key: String,

    press_hold: Duration,
    turn_delay: Duration,
    up_drag_duration: Duration,
    down_drag_duration: Duration,
    fps_limit: u32,

    buff_keys: Vec<String>,
    buff_cooldowns: Vec<Duration>,
    buff_active_duration: Duration,

    backend: Arc<Mutex<Box<dyn InputBackend>>>,
    focus: Box<dyn FocusProbe>,
    slot: Arc<CommandSlot>,
    signals: Arc<HotkeySignals>,

    enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    fps: Arc<AtomicU32>,

    t_last_run: Instant,
    t_last_up: Option<Instant>,
    t_last_down: Option<Instant>,
    t_last_buff: Vec<Option<Instant>>,
}

/// External handle: enable/disable, stop, and the measured rate.
#[derive(Clone)]
pub struct ControllerControls {
    enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    fps: Arc<AtomicU32>,
}

impl ControllerControls {
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn measured_fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }
}

impl KeyController {
    pub fn new(
        cfg: &Config,
        backend: Arc<Mutex<Box<dyn InputBackend>>>,
        focus: Box<dyn FocusProbe>,
        slot: Arc<CommandSlot>,
        signals: Arc<HotkeySignals>,
    ) -> Self {
        if cfg.buff_skill_keys.len() != cfg.buff_skill_cooldown_ms.len() {
            logger::warn(&format!(
                "{} buff keys but {} cooldowns configured; extras use no cooldown",
                cfg.buff_skill_keys.len(),
                cfg.buff_skill_cooldown_ms.len()
            ));
        }
        Self {
            jump_key: cfg.jump_key.clone(),
            teleport_key: cfg.teleport_key.clone(),
            attack_key: cfg.attack_key().to_string(),
            heal_key: cfg.heal_key.clone(),
            add_mp_key: cfg.add_mp_key.clone(),
            press_hold: cfg.press_hold(),
            turn_delay: cfg.turn_delay(),
            up_drag_duration: cfg.up_drag_duration(),
            down_drag_duration: cfg.down_drag_duration(),
            fps_limit: cfg.fps_limit.max(1),
            buff_keys: cfg.buff_skill_keys.clone(),
            buff_cooldowns: cfg
                .buff_skill_cooldown_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            buff_active_duration: cfg.buff_active_duration(),
            backend,
            focus,
            slot,
            signals,
            enabled: Arc::new(AtomicBool::new(true)),
            running: Arc::new(AtomicBool::new(true)),
            fps: Arc::new(AtomicU32::new(0)),
            t_last_run: Instant::now(),
            t_last_up: None,
            t_last_down: None,
            t_last_buff: vec![None; cfg.buff_skill_keys.len()],
        }
    }

    pub fn controls(&self) -> ControllerControls {
        ControllerControls {
            enabled: Arc::clone(&self.enabled),
            running: Arc::clone(&self.running),
            fps: Arc::clone(&self.fps),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name("key-controller".into())
            .spawn(move || self.run())
            .expect("spawning key controller thread")
    }

    pub fn run(mut self) {
        logger::info("key controller started");
        while self.running.load(Ordering::Relaxed) {
            self.tick();
            self.limit_fps();
        }
        // Leave no key logically held after shutdown.
        self.release_all();
        logger::info("key controller stopped");
    }

    /// One dispatcher iteration, pacing excluded.
    pub fn tick(&mut self) {
        if self.signals.toggle.swap(false, Ordering::AcqRel) {
            let enabled = !self.enabled.load(Ordering::Relaxed);
            self.enabled.store(enabled, Ordering::Relaxed);
            logger::info(&format!(
                "control {} by hotkey",
                if enabled { "enabled" } else { "disabled" }
            ));
            self.release_all();
        }

        // Gated iterations skip the body but still get paced by run().
        if !self.enabled.load(Ordering::Relaxed) || !self.focus.is_target_active() {
            return;
        }

        self.cast_due_buff();
        self.release_stale_drags();

        if let Some(cmd) = self.slot.take_one_shot() {
            self.run_one_shot(cmd);
        }
        if let Some(cmd) = self.slot.sustained() {
            self.run_sustained(cmd);
        }
    }

    fn run_one_shot(&mut self, cmd: Command) {
        match cmd {
            Command::Stop => {
                self.release_all();
                self.slot.clear_sustained();
            }
            Command::Heal => {
                let key = self.heal_key.clone();
                self.press(&key);
            }
            Command::AddMp => {
                let key = self.add_mp_key.clone();
                self.press(&key);
            }
            _ => {}
        }
    }

    fn run_sustained(&mut self, cmd: Command) {
        let jump = self.jump_key.clone();
        let teleport = self.teleport_key.clone();
        let attack = self.attack_key.clone();
        match cmd {
            Command::WalkLeft => {
                self.key_up("right");
                self.key_down("left");
            }
            Command::WalkRight => {
                self.key_up("left");
                self.key_down("right");
            }
            Command::JumpLeft => {
                self.key_up("right");
                self.key_down("left");
                self.press(&jump);
                self.key_up("left");
            }
            Command::JumpRight => {
                self.key_up("left");
                self.key_down("right");
                self.press(&jump);
                self.key_up("right");
            }
            Command::JumpDown => {
                self.key_up("right");
                self.key_up("left");
                self.key_down("down");
                self.press(&jump);
                self.key_up("down");
            }
            Command::Jump => {
                self.key_up("left");
                self.key_up("right");
                self.press(&jump);
            }
            Command::Up => {
                self.key_up("down");
                self.key_down("up");
                self.t_last_up = Some(Instant::now());
            }
            Command::Down => {
                self.key_up("up");
                self.key_down("down");
                self.t_last_down = Some(Instant::now());
            }
            Command::TeleportLeft => {
                self.key_up("right");
                self.key_down("left");
                self.press(&teleport);
            }
            Command::TeleportRight => {
                self.key_up("left");
                self.key_down("right");
                self.press(&teleport);
            }
            Command::TeleportUp => {
                self.key_down("up");
                self.press(&teleport);
                self.key_up("up");
            }
            Command::TeleportDown => {
                self.key_down("down");
                self.press(&teleport);
                self.key_up("down");
            }
            Command::Attack => {
                self.press(&attack);
            }
            Command::AttackLeft => {
                self.key_up("right");
                self.key_down("left");
                thread::sleep(self.turn_delay); // let the character turn first
                self.press(&attack);
                self.key_up("left");
            }
            Command::AttackRight => {
                self.key_up("left");
                self.key_down("right");
                thread::sleep(self.turn_delay);
                self.press(&attack);
                self.key_up("right");
            }
            // One-shots never reach the sustained slot.
            Command::Stop | Command::Heal | Command::AddMp => {}
        }
    }

    /// Fire the first buff whose cooldown elapsed, at most one per
    /// iteration, and none while any buff is still in its shared active
    /// window.
    fn cast_due_buff(&mut self) {
        let in_active_window = self
            .t_last_buff
            .iter()
            .flatten()
            .any(|t| t.elapsed() < self.buff_active_duration);
        if in_active_window {
            return;
        }
        for i in 0..self.buff_keys.len() {
            let cooldown = self.buff_cooldowns.get(i).copied().unwrap_or(Duration::ZERO);
            if self.t_last_buff[i].map_or(true, |t| t.elapsed() >= cooldown) {
                let key = self.buff_keys[i].clone();
                logger::info(&format!("cast buff '{}' (cooldown {:?})", key, cooldown));
                self.press(&key);
                self.t_last_buff[i] = Some(Instant::now());
                break;
            }
        }
    }

    /// Release directional keys held past their drag duration so a stale
    /// command can never leave movement stuck.
    fn release_stale_drags(&mut self) {
        if let Some(t) = self.t_last_up {
            if t.elapsed() > self.up_drag_duration {
                self.key_up("up");
                self.t_last_up = None;
            }
        }
        if let Some(t) = self.t_last_down {
            if t.elapsed() > self.down_drag_duration {
                self.key_up("down");
                self.t_last_down = None;
            }
        }
    }

    /// Release every tracked key, including any in-flight attack.
    fn release_all(&mut self) {
        for key in ["left", "right", "up", "down"] {
            self.key_up(key);
        }
        let attack = self.attack_key.clone();
        self.key_up(&attack);
        self.t_last_up = None;
        self.t_last_down = None;
    }

    /// Pad the iteration to the target rate and publish the measured one.
    fn limit_fps(&mut self) {
        let target = Duration::from_secs_f64(1.0 / self.fps_limit as f64);
        let elapsed = self.t_last_run.elapsed();
        if elapsed < target {
            thread::sleep(target - elapsed);
        }
        let frame = self.t_last_run.elapsed().as_secs_f64();
        if frame > 0.0 {
            self.fps.store((1.0 / frame).round() as u32, Ordering::Relaxed);
        }
        self.t_last_run = Instant::now();
    }

    fn key_down(&mut self, key: &str) {
        match self.backend.lock() {
            Ok(mut kb) => kb.key_down(key),
            Err(_) => logger::error("input backend lock poisoned, key down skipped"),
        }
    }

    fn key_up(&mut self, key: &str) {
        match self.backend.lock() {
            Ok(mut kb) => kb.key_up(key),
            Err(_) => logger::error("input backend lock poisoned, key up skipped"),
        }
    }

    fn press(&mut self, key: &str) {
        match self.backend.lock() {
            Ok(mut kb) => kb.press(key, self.press_hold),
            Err(_) => logger::error("input backend lock poisoned, press skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stub::{AlwaysActive, StubBackend};
    use crate::types::KeyEvent;

    struct Harness {
        controller: KeyController,
        slot: Arc<CommandSlot>,
        signals: Arc<HotkeySignals>,
        sink: Arc<Mutex<Vec<KeyEvent>>>,
    }

    fn harness(mutate: impl FnOnce(&mut Config)) -> Harness {
        let mut cfg = Config::default();
        cfg.key_press_duration_ms = 0;
        cfg.character_turn_delay_ms = 0;
        mutate(&mut cfg);

        let sink = Arc::new(Mutex::new(Vec::new()));
        let backend: Arc<Mutex<Box<dyn InputBackend>>> = Arc::new(Mutex::new(Box::new(
            StubBackend::recording(Arc::clone(&sink)),
        )));
        let slot = Arc::new(CommandSlot::new());
        let signals = Arc::new(HotkeySignals::default());
        let controller = KeyController::new(
            &cfg,
            backend,
            Box::new(AlwaysActive),
            Arc::clone(&slot),
            Arc::clone(&signals),
        );
        Harness { controller, slot, signals, sink }
    }

    fn events(h: &Harness) -> Vec<KeyEvent> {
        h.sink.lock().unwrap().clone()
    }

    fn clear_events(h: &Harness) {
        h.sink.lock().unwrap().clear();
    }

    #[test]
    fn walk_left_releases_opposite_then_holds() {
        let mut h = harness(|_| {});
        h.slot.set("walk left");
        h.controller.tick();
        assert_eq!(events(&h), vec![KeyEvent::up("right"), KeyEvent::down("left")]);
        // Sustained: an unchanged intent keeps being honored.
        h.controller.tick();
        assert_eq!(events(&h).len(), 4);
    }

    #[test]
    fn stop_releases_all_tracked_keys_and_clears_slot() {
        let mut h = harness(|_| {});
        h.slot.set("walk left");
        h.controller.tick();
        clear_events(&h);

        h.slot.set("stop");
        h.controller.tick();

        let evs = events(&h);
        for key in ["left", "right", "up", "down", "z"] {
            assert!(
                evs.contains(&KeyEvent::up(key)),
                "expected release of '{key}', got {evs:?}"
            );
        }
        assert_eq!(h.slot.sustained(), None);
        assert!(evs.iter().all(|e| !e.down));
    }

    #[test]
    fn heal_one_shot_does_not_cancel_sustained_walking() {
        let mut h = harness(|_| {});
        h.slot.set("walk right");
        h.slot.set("heal");
        h.controller.tick();

        let evs = events(&h);
        assert!(evs.contains(&KeyEvent::down("1")));
        assert!(evs.contains(&KeyEvent::down("right")));
        assert_eq!(h.slot.sustained(), Some(Command::WalkRight));
    }

    #[test]
    fn up_drag_key_is_auto_released_when_stale() {
        let mut h = harness(|cfg| cfg.up_drag_duration_ms = 0);
        h.slot.set("up");
        h.controller.tick();
        assert!(events(&h).contains(&KeyEvent::down("up")));

        h.slot.set(""); // no refreshing command
        clear_events(&h);
        h.controller.tick();
        assert_eq!(events(&h), vec![KeyEvent::up("up")]);

        // Released once; nothing further while idle.
        clear_events(&h);
        h.controller.tick();
        assert!(events(&h).is_empty());
    }

    #[test]
    fn jump_left_pulses_jump_while_holding_direction() {
        let mut h = harness(|_| {});
        h.slot.set("jump left");
        h.controller.tick();
        assert_eq!(
            events(&h),
            vec![
                KeyEvent::up("right"),
                KeyEvent::down("left"),
                KeyEvent::down("space"),
                KeyEvent::up("space"),
                KeyEvent::up("left"),
            ]
        );
    }

    #[test]
    fn attack_left_turns_then_attacks() {
        let mut h = harness(|_| {});
        h.slot.set("attack left");
        h.controller.tick();
        assert_eq!(
            events(&h),
            vec![
                KeyEvent::up("right"),
                KeyEvent::down("left"),
                KeyEvent::down("z"),
                KeyEvent::up("z"),
                KeyEvent::up("left"),
            ]
        );
    }

    #[test]
    fn magic_claw_mode_selects_other_attack_key() {
        let mut h = harness(|cfg| cfg.attack_mode = crate::config::AttackMode::MagicClaw);
        h.slot.set("attack");
        h.controller.tick();
        assert_eq!(events(&h), vec![KeyEvent::down("x"), KeyEvent::up("x")]);
    }

    #[test]
    fn at_most_one_buff_per_iteration_and_per_cooldown() {
        let mut h = harness(|cfg| {
            cfg.buff_skill_keys = vec!["f".into(), "g".into()];
            cfg.buff_skill_cooldown_ms = vec![60_000, 60_000];
            cfg.buff_skill_active_duration_ms = 0;
        });

        h.controller.tick();
        assert_eq!(events(&h), vec![KeyEvent::down("f"), KeyEvent::up("f")]);

        clear_events(&h);
        h.controller.tick();
        assert_eq!(events(&h), vec![KeyEvent::down("g"), KeyEvent::up("g")]);

        // Both on cooldown now.
        clear_events(&h);
        h.controller.tick();
        assert!(events(&h).is_empty());
    }

    #[test]
    fn no_buff_fires_inside_active_duration() {
        let mut h = harness(|cfg| {
            cfg.buff_skill_keys = vec!["f".into(), "g".into()];
            cfg.buff_skill_cooldown_ms = vec![0, 0];
            cfg.buff_skill_active_duration_ms = 60_000;
        });

        h.controller.tick();
        assert_eq!(events(&h), vec![KeyEvent::down("f"), KeyEvent::up("f")]);

        clear_events(&h);
        h.controller.tick();
        assert!(events(&h).is_empty());
    }

    #[test]
    fn hotkey_toggle_disables_and_force_releases() {
        let mut h = harness(|_| {});
        h.slot.set("walk left");
        h.controller.tick();
        clear_events(&h);

        h.signals.toggle.store(true, Ordering::Release);
        h.controller.tick();

        let evs = events(&h);
        assert!(evs.contains(&KeyEvent::up("left")));
        assert!(evs.iter().all(|e| !e.down), "disabled tick must not press keys");

        // Still disabled: sustained command is not acted on.
        clear_events(&h);
        h.controller.tick();
        assert!(events(&h).is_empty());

        // Second toggle re-enables.
        h.signals.toggle.store(true, Ordering::Release);
        h.controller.tick();
        assert!(events(&h).contains(&KeyEvent::down("left")));
    }

    #[test]
    fn disabled_controller_only_paces() {
        let mut h = harness(|_| {});
        h.controller.controls().disable();
        h.slot.set("attack");
        h.controller.tick();
        assert!(events(&h).is_empty());
    }
}
