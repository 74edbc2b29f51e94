use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logger;
use crate::types::BarRect;

/// Which mechanism delivers simulated key events. Chosen once at startup;
/// an unavailable choice degrades to `Simulated` with a logged warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Simulated,
    LowLevelDirect,
    KernelDriver,
    WindowMessage,
}

/// Which configured key the `attack` commands use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    AoeSkill,
    MagicClaw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub game_window_title: String,
    pub backend: BackendKind,
    /// Layered on `Simulated`: bring the game window foreground before
    /// each key down, ignoring focus failures.
    pub auto_focus_window: bool,

    pub hp_bar: BarRect,
    pub mp_bar: BarRect,
    /// Pixels of drawn bar border that must not count as emptiness.
    /// Calibrated against the default bar rendering; see frame::bar_ratio.
    pub border_correction: u32,

    pub heal_key: String,
    pub heal_ratio: f64,
    pub heal_cooldown_ms: u64,
    pub add_mp_key: String,
    pub add_mp_ratio: f64,
    pub mp_cooldown_ms: u64,

    pub buff_skill_keys: Vec<String>,
    pub buff_skill_cooldown_ms: Vec<u64>,
    pub buff_skill_active_duration_ms: u64,

    pub up_drag_duration_ms: u64,
    pub down_drag_duration_ms: u64,

    pub jump_key: String,
    pub teleport_key: String,
    pub attack_mode: AttackMode,
    pub aoe_skill_key: String,
    pub magic_claw_key: String,
    pub character_turn_delay_ms: u64,
    pub key_press_duration_ms: u64,

    pub fps_limit: u32,
    pub debounce_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game_window_title: "MapleStory".into(),
            backend: BackendKind::Simulated,
            auto_focus_window: false,
            hp_bar: BarRect::new((297, 196), (530, 204)),
            mp_bar: BarRect::new((297, 208), (530, 216)),
            border_correction: 6,
            heal_key: "1".into(),
            heal_ratio: 0.5,
            heal_cooldown_ms: 3000,
            add_mp_key: "2".into(),
            add_mp_ratio: 0.5,
            mp_cooldown_ms: 3000,
            buff_skill_keys: Vec::new(),
            buff_skill_cooldown_ms: Vec::new(),
            buff_skill_active_duration_ms: 1000,
            up_drag_duration_ms: 1500,
            down_drag_duration_ms: 1500,
            jump_key: "space".into(),
            teleport_key: "shift".into(),
            attack_mode: AttackMode::AoeSkill,
            aoe_skill_key: "z".into(),
            magic_claw_key: "x".into(),
            character_turn_delay_ms: 100,
            key_press_duration_ms: 50,
            fps_limit: 30,
            debounce_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load from a JSON file, falling back to defaults on a missing or
    /// unreadable file. Partial files fill the rest from defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str(&s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    logger::warn(&format!("bad config {}: {}, using defaults", path.display(), e));
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }

    pub fn attack_key(&self) -> &str {
        match self.attack_mode {
            AttackMode::AoeSkill => &self.aoe_skill_key,
            AttackMode::MagicClaw => &self.magic_claw_key,
        }
    }

    pub fn heal_cooldown(&self) -> Duration {
        Duration::from_millis(self.heal_cooldown_ms)
    }

    pub fn mp_cooldown(&self) -> Duration {
        Duration::from_millis(self.mp_cooldown_ms)
    }

    pub fn buff_active_duration(&self) -> Duration {
        Duration::from_millis(self.buff_skill_active_duration_ms)
    }

    pub fn up_drag_duration(&self) -> Duration {
        Duration::from_millis(self.up_drag_duration_ms)
    }

    pub fn down_drag_duration(&self) -> Duration {
        Duration::from_millis(self.down_drag_duration_ms)
    }

    pub fn turn_delay(&self) -> Duration {
        Duration::from_millis(self.character_turn_delay_ms)
    }

    pub fn press_hold(&self) -> Duration {
        Duration::from_millis(self.key_press_duration_ms)
    }

    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/autoplay.json"));
        assert_eq!(cfg.fps_limit, 30);
        assert_eq!(cfg.backend, BackendKind::Simulated);
        assert_eq!(cfg.attack_key(), "z");
    }

    #[test]
    fn partial_file_fills_from_defaults() {
        let dir = std::env::temp_dir().join("autoplay-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partial.json");
        std::fs::write(&path, r#"{ "fps_limit": 15, "backend": "window_message" }"#).unwrap();

        let cfg = Config::load(&path);
        assert_eq!(cfg.fps_limit, 15);
        assert_eq!(cfg.backend, BackendKind::WindowMessage);
        assert_eq!(cfg.heal_key, "1");
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = std::env::temp_dir().join("autoplay-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("roundtrip.json");

        let mut cfg = Config::default();
        cfg.attack_mode = AttackMode::MagicClaw;
        cfg.buff_skill_keys = vec!["f".into(), "g".into()];
        cfg.buff_skill_cooldown_ms = vec![60_000, 90_000];
        cfg.save(&path);

        let loaded = Config::load(&path);
        assert_eq!(loaded.attack_key(), "x");
        assert_eq!(loaded.buff_skill_keys, cfg.buff_skill_keys);
        assert_eq!(loaded.buff_skill_cooldown_ms, cfg.buff_skill_cooldown_ms);
    }
}
