// SPDX-License-Identifier: GPL-3.0-only

//! Renderer and input poller for running without a terminal UI

use super::types::Frame;
use super::{InputPoller, Renderer};
use crate::constants::ESC_KEY;
use crate::errors::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Renderer that only logs what it would have shown
#[derive(Default)]
pub struct HeadlessRenderer {
    shown: HashMap<String, u64>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames shown per label
    pub fn shown(&self, label: &str) -> u64 {
        self.shown.get(label).copied().unwrap_or(0)
    }
}

impl Renderer for HeadlessRenderer {
    fn show(&mut self, label: &str, frame: &Frame) -> AppResult<()> {
        let count = self.shown.entry(label.to_string()).or_insert(0);
        *count += 1;
        debug!(
            pane = label,
            sequence = frame.sequence,
            latency_ms = frame.captured_at.elapsed().as_millis() as u64,
            shown = *count,
            "Frame ready"
        );
        Ok(())
    }

    fn set_status(&mut self, status: &str) {
        debug!(status, "Status");
    }
}

/// Poller that reports [`ESC_KEY`] once Ctrl+C has been pressed
pub struct CtrlcPoller {
    interrupted: Arc<AtomicBool>,
}

impl CtrlcPoller {
    /// Install the process-wide Ctrl+C handler
    pub fn install() -> AppResult<Self> {
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;

        info!("Press Ctrl+C to stop");
        Ok(Self { interrupted })
    }

    /// Build a poller around an existing flag (no signal handler)
    pub fn from_flag(interrupted: Arc<AtomicBool>) -> Self {
        Self { interrupted }
    }
}

impl InputPoller for CtrlcPoller {
    fn poll_key(&mut self, timeout: Duration) -> AppResult<Option<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                return Ok(Some(ESC_KEY));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(5)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_headless_counts_per_label() {
        let mut renderer = HeadlessRenderer::new();
        let frame = Frame::new(RgbImage::new(2, 2), 0);

        renderer.show("a", &frame).unwrap();
        renderer.show("a", &frame).unwrap();
        renderer.show("b", &frame).unwrap();

        assert_eq!(renderer.shown("a"), 2);
        assert_eq!(renderer.shown("b"), 1);
        assert_eq!(renderer.shown("c"), 0);
    }

    #[test]
    fn test_ctrlc_poller_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut poller = CtrlcPoller::from_flag(Arc::clone(&flag));

        assert_eq!(poller.poll_key(Duration::from_millis(10)).unwrap(), None);
        flag.store(true, Ordering::SeqCst);
        assert_eq!(
            poller.poll_key(Duration::from_millis(10)).unwrap(),
            Some(ESC_KEY)
        );
    }
}
