use std::path::Path;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::logger;
use crate::types::{BarRect, BarRegion};

#[derive(Clone)]
struct Regions {
    hp: BarRegion,
    mp: BarRegion,
}

/// Lock-protected holder of the two bar regions cut out of the latest
/// captured frame, plus a "fresh frame" signal for the health monitor.
///
/// The capture side must never block: `publish` uses `try_lock` and drops
/// the frame when a reader holds the lock. Freshness over completeness.
pub struct FrameExchange {
    hp_rect: BarRect,
    mp_rect: BarRect,
    border_correction: u32,
    regions: Mutex<Option<Regions>>,
    updated: Mutex<bool>,
    cond: Condvar,
}

impl FrameExchange {
    pub fn new(hp_rect: BarRect, mp_rect: BarRect, border_correction: u32) -> Self {
        Self {
            hp_rect,
            mp_rect,
            border_correction,
            regions: Mutex::new(None),
            updated: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Store deep copies of the two bar regions from a full RGB8 frame.
    /// Skipped entirely (not queued) when a reader holds the lock, and
    /// when the configured rects fall outside the frame.
    pub fn publish(&self, data: &[u8], width: u32, height: u32) {
        let Ok(mut slot) = self.regions.try_lock() else {
            return;
        };
        let (Some(hp), Some(mp)) = (
            extract(data, width, height, self.hp_rect),
            extract(data, width, height, self.mp_rect),
        ) else {
            logger::warn_p("frame", "bar rect outside published frame, dropped");
            return;
        };
        *slot = Some(Regions { hp, mp });
        drop(slot);

        if let Ok(mut updated) = self.updated.lock() {
            *updated = true;
            self.cond.notify_one();
        }
    }

    /// Bounded wait for a fresh publish; clears the signal when observed.
    pub fn wait_fresh(&self, timeout: Duration) -> bool {
        let Ok(guard) = self.updated.lock() else {
            return false;
        };
        let Ok((mut updated, _)) = self.cond.wait_timeout_while(guard, timeout, |u| !*u) else {
            return false;
        };
        if *updated {
            *updated = false;
            true
        } else {
            false
        }
    }

    /// Current fill ratios, `(1.0, 1.0)` before the first publish.
    pub fn ratios(&self) -> (f64, f64) {
        let regions = match self.regions.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        match regions {
            Some(r) => (
                bar_ratio(&r.hp, self.border_correction),
                bar_ratio(&r.mp, self.border_correction),
            ),
            None => (1.0, 1.0),
        }
    }

    /// Dump the stored bar regions as PNGs for threshold calibration.
    /// Wired to the screenshot hotkey by the host binary.
    pub fn save_debug(&self, dir: &Path) -> Result<()> {
        let regions = self
            .regions
            .lock()
            .map_err(|_| anyhow!("frame lock poisoned"))?
            .clone()
            .ok_or_else(|| anyhow!("no frame published yet"))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        write_png(&regions.hp, &dir.join("hp_bar.png"))?;
        write_png(&regions.mp, &dir.join("mp_bar.png"))?;
        Ok(())
    }
}

fn write_png(region: &BarRegion, path: &Path) -> Result<()> {
    let img = image::RgbImage::from_raw(region.width, region.height, region.data.clone())
        .ok_or_else(|| anyhow!("bar region buffer has wrong length"))?;
    img.save(path)
        .with_context(|| format!("writing {}", path.display()))
}

fn extract(data: &[u8], width: u32, height: u32, rect: BarRect) -> Option<BarRegion> {
    let (x0, y0) = rect.top_left;
    let (x1, y1) = rect.bottom_right;
    if x1 < x0 || y1 < y0 || x1 >= width || y1 >= height {
        return None;
    }
    if data.len() < (width as usize) * (height as usize) * 3 {
        return None;
    }
    let w = rect.width();
    let h = rect.height();
    let mut out = Vec::with_capacity((w * h * 3) as usize);
    for y in y0..=y1 {
        let start = ((y as usize) * (width as usize) + x0 as usize) * 3;
        out.extend_from_slice(&data[start..start + (w as usize) * 3]);
    }
    Some(BarRegion { width: w, height: h, data: out })
}

/// Filled fraction of a bar region.
///
/// A pixel whose three channels are pairwise equal is background, not
/// colored fill. The drawn bar border contributes `border_correction`
/// such pixels and is subtracted from both the empty count and the total
/// before taking the fraction. Keep this arithmetic exact: an off-by-few
/// pixel error moves the heal trigger threshold.
pub fn bar_ratio(region: &BarRegion, border_correction: u32) -> f64 {
    let mut empty: i64 = 0;
    for px in region.data.chunks_exact(3) {
        if px[0] == px[1] && px[1] == px[2] {
            empty += 1;
        }
    }
    let empty = (empty - border_correction as i64).max(0);
    let total = (region.width as i64 * region.height as i64 - border_correction as i64).max(1);
    let ratio = 1.0 - empty as f64 / total as f64;
    ratio.clamp(0.0, 1.0)
}
