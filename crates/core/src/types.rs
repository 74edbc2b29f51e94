use serde::{Deserialize, Serialize};

/// Inclusive-corner rectangle of an on-screen status bar, in frame pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BarRect {
    pub top_left: (u32, u32),
    pub bottom_right: (u32, u32),
}

impl BarRect {
    pub fn new(top_left: (u32, u32), bottom_right: (u32, u32)) -> Self {
        Self { top_left, bottom_right }
    }

    /// Width in pixels; corners are inclusive.
    pub fn width(&self) -> u32 {
        self.bottom_right.0 - self.top_left.0 + 1
    }

    pub fn height(&self) -> u32 {
        self.bottom_right.1 - self.top_left.1 + 1
    }

    pub fn area(&self) -> u32 {
        self.width() * self.height()
    }
}

/// Owned copy of one bar's pixels, RGB8 row-major (`data.len() == w * h * 3`).
#[derive(Debug, Clone)]
pub struct BarRegion {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Latest computed fill ratios, both in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct HealthState {
    pub hp: f64,
    pub mp: f64,
}

impl Default for HealthState {
    fn default() -> Self {
        // Neutral until the first frame has been evaluated.
        Self { hp: 1.0, mp: 1.0 }
    }
}

/// One key transition as seen by the recording stub backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub down: bool,
}

impl KeyEvent {
    pub fn down(key: &str) -> Self {
        Self { key: key.to_string(), down: true }
    }

    pub fn up(key: &str) -> Self {
        Self { key: key.to_string(), down: false }
    }
}
