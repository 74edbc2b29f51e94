pub mod hotkey;
pub mod keymap;
pub mod stub;

#[cfg(target_os = "windows")]
pub mod windows;

use std::time::Duration;

use crate::config::Config;
#[cfg(not(target_os = "windows"))]
use crate::config::BackendKind;
use crate::logger;

/// Uniform key-event capability over one of several delivery mechanisms.
/// Callers never learn which mechanism runs; failures are logged at the
/// point of firing and become no-ops, never errors.
pub trait InputBackend: Send {
    fn key_down(&mut self, key: &str);
    fn key_up(&mut self, key: &str);

    /// Down, hold, up.
    fn press(&mut self, key: &str, hold: Duration) {
        self.key_down(key);
        std::thread::sleep(hold);
        self.key_up(key);
    }
}

/// Answers "is the game window currently foreground" for the controller
/// gate.
pub trait FocusProbe: Send {
    fn is_target_active(&self) -> bool;
}

/// Build the configured input backend, degrading to the simulated default
/// (or the stub off-Windows) with a warning when the preferred mechanism
/// is unavailable. Never fails.
pub fn create_backend(cfg: &Config, force_stub: bool) -> Box<dyn InputBackend> {
    if force_stub {
        logger::info("using stub input backend");
        return Box::new(stub::StubBackend::new());
    }
    #[cfg(target_os = "windows")]
    {
        windows::create_backend(cfg)
    }
    #[cfg(not(target_os = "windows"))]
    {
        if cfg.backend != BackendKind::Simulated {
            logger::warn(&format!(
                "{:?} backend unavailable on this platform, using stub",
                cfg.backend
            ));
        } else {
            logger::info("using stub input backend");
        }
        Box::new(stub::StubBackend::new())
    }
}

/// Build the foreground-window probe for the configured game window.
pub fn create_focus_probe(cfg: &Config, force_stub: bool) -> Box<dyn FocusProbe> {
    if force_stub {
        return Box::new(stub::AlwaysActive);
    }
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::TitleFocusProbe::new(&cfg.game_window_title))
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = cfg;
        Box::new(stub::AlwaysActive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, Config};

    #[test]
    fn unavailable_backend_falls_back_without_panicking() {
        // Off-Windows every kind degrades to the stub; on Windows the
        // driver-backed kind degrades to simulated input when the driver
        // is missing. Either way construction succeeds and keys fire.
        let mut cfg = Config::default();
        cfg.backend = BackendKind::KernelDriver;
        let mut backend = create_backend(&cfg, false);
        backend.key_down("left");
        backend.key_up("left");
    }

    #[test]
    fn stub_probe_reports_active() {
        let cfg = Config::default();
        let probe = create_focus_probe(&cfg, true);
        assert!(probe.is_target_active());
    }
}
