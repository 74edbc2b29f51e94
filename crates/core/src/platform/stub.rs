use std::sync::{Arc, Mutex};

use crate::logger;
use crate::types::KeyEvent;

use super::{FocusProbe, InputBackend};

/// Logging backend for hosts without real key injection, doubling as the
/// recording test double.
pub struct StubBackend {
    sink: Option<Arc<Mutex<Vec<KeyEvent>>>>,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StubBackend {
    pub fn new() -> Self {
        Self { sink: None }
    }

    /// Record every key transition into `sink` instead of only logging.
    pub fn recording(sink: Arc<Mutex<Vec<KeyEvent>>>) -> Self {
        Self { sink: Some(sink) }
    }

    fn record(&self, event: KeyEvent) {
        if let Some(sink) = &self.sink {
            if let Ok(mut events) = sink.lock() {
                events.push(event);
            }
        }
    }
}

impl InputBackend for StubBackend {
    fn key_down(&mut self, key: &str) {
        logger::info_p("stub", &format!("key down '{}'", key));
        self.record(KeyEvent::down(key));
    }

    fn key_up(&mut self, key: &str) {
        logger::info_p("stub", &format!("key up '{}'", key));
        self.record(KeyEvent::up(key));
    }
}

/// Focus probe that always reports the target window active.
pub struct AlwaysActive;

impl FocusProbe for AlwaysActive {
    fn is_target_active(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn recording_stub_captures_press_order() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut backend = StubBackend::recording(Arc::clone(&sink));
        backend.press("z", Duration::ZERO);
        let events = sink.lock().unwrap();
        assert_eq!(*events, vec![KeyEvent::down("z"), KeyEvent::up("z")]);
    }
}
