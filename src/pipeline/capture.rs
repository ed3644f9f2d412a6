// SPDX-License-Identifier: GPL-3.0-only

//! Capture loop thread
//!
//! The loop is gated by [`PipelineControl`]:
//!
//! ```text
//! loop {
//!     wait for wake signal
//!     if exiting { return }
//!     while capturing && !exiting {
//!         read frame -> try_put onto capture queue (drop if full)
//!     }
//! }
//! ```
//!
//! Clearing `capturing` suspends reading without tearing the thread down;
//! [`PipelineControl::start_capture`] resumes it.

use super::control::PipelineControl;
use super::queue::BoundedClosableQueue;
use super::stats::{StageStats, StatsSnapshot};
use crate::backends::{Frame, FrameSource};
use crate::constants::capture::FRAME_LOG_INTERVAL;
use crate::errors::{AppError, AppResult};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Handle to the capture thread
///
/// The thread owns the frame source. Dropping the handle detaches it.
pub struct CaptureLoop {
    thread_handle: JoinHandle<()>,
    stats: Arc<StageStats>,
    name: String,
}

impl CaptureLoop {
    /// Spawn the capture thread. It idles until the first
    /// [`PipelineControl::start_capture`].
    pub fn start<S>(
        name: &str,
        source: S,
        queue: BoundedClosableQueue<Frame>,
        control: Arc<PipelineControl>,
    ) -> AppResult<Self>
    where
        S: FrameSource + 'static,
    {
        let stats = Arc::new(StageStats::new());
        let stats_clone = Arc::clone(&stats);
        let name_clone = name.to_string();

        info!(name = %name, source = %source.describe(), "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(format!("capture-{}", name))
            .spawn(move || capture_main(&name_clone, source, &queue, &control, &stats_clone))
            .map_err(|e| AppError::Other(format!("failed to spawn capture thread: {}", e)))?;

        Ok(Self {
            thread_handle,
            stats,
            name: name.to_string(),
        })
    }

    /// Check if the capture thread is still alive
    pub fn is_running(&self) -> bool {
        !self.thread_handle.is_finished()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn stats_handle(&self) -> Arc<StageStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for the thread to return. It only returns after
    /// [`PipelineControl::request_exit`].
    pub fn join(self) {
        debug!(name = %self.name, "Waiting for capture thread to finish");
        if let Err(e) = self.thread_handle.join() {
            warn!(name = %self.name, "Capture thread panicked: {:?}", e);
        }
    }
}

fn capture_main<S: FrameSource>(
    name: &str,
    mut source: S,
    queue: &BoundedClosableQueue<Frame>,
    control: &PipelineControl,
    stats: &StageStats,
) {
    debug!(name, "Capture thread started");

    loop {
        control.wake_signal().wait();
        if control.is_exiting() {
            info!(name, "Exit signal received, capture thread exiting");
            return;
        }

        debug!(name, "Capturing");
        while control.is_capturing() && !control.is_exiting() {
            let started = Instant::now();
            let frame = match source.read() {
                Ok(frame) => frame,
                Err(e) => {
                    stats.record_failure();
                    warn!(name, error = %e, "Failed to grab frame");
                    continue;
                }
            };
            stats.record_success(started.elapsed());

            let sequence = frame.sequence;
            if queue.try_put(frame).is_err() {
                stats.record_drop();
                trace!(name, sequence, "Capture queue full, dropping frame");
            }

            if sequence > 0 && sequence % FRAME_LOG_INTERVAL == 0 {
                let snap = stats.snapshot();
                debug!(
                    name,
                    read = snap.processed,
                    failed = snap.failed,
                    dropped = snap.dropped,
                    "Capture progress"
                );
            }
        }
        debug!(name, "Capture suspended");
    }
}
