// SPDX-License-Identifier: GPL-3.0-only

//! Shared lifecycle flags and the capture wake signal
//!
//! One [`PipelineControl`] is created by the orchestrator and handed to every
//! thread by `Arc`. Only the orchestrator writes it; everything else reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use tracing::debug;

/// Manual-reset style event: `set` wakes waiters, `wait` consumes the flag
#[derive(Debug, Default)]
pub struct WakeSignal {
    set: Mutex<bool>,
    cond: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake the waiter
    pub fn set(&self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        *set = true;
        self.cond.notify_all();
    }

    /// Block until the signal is raised, then clear it
    pub fn wait(&self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        while !*set {
            set = self.cond.wait(set).unwrap_or_else(|e| e.into_inner());
        }
        *set = false;
    }
}

/// Cross-thread lifecycle state of a running pipeline
#[derive(Debug, Default)]
pub struct PipelineControl {
    capturing: AtomicBool,
    exiting: AtomicBool,
    wake: WakeSignal,
}

impl PipelineControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the capture loop should be reading frames
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Whether shutdown has been requested. Once true, stays true.
    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    /// Ask the capture loop to (re)start reading
    pub fn start_capture(&self) {
        if self.is_exiting() {
            return;
        }
        debug!("Capture start requested");
        self.capturing.store(true, Ordering::SeqCst);
        self.wake.set();
    }

    /// Ask the capture loop to stop reading without leaving its thread
    pub fn pause_capture(&self) {
        debug!("Capture pause requested");
        self.capturing.store(false, Ordering::SeqCst);
    }

    /// Terminal shutdown request. Wakes a waiting capture loop so that it
    /// observes the flag and returns.
    pub fn request_exit(&self) {
        debug!("Exit requested");
        self.exiting.store(true, Ordering::SeqCst);
        self.capturing.store(false, Ordering::SeqCst);
        self.wake.set();
    }

    /// The signal the capture loop waits on
    pub fn wake_signal(&self) -> &WakeSignal {
        &self.wake
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_consumes_signal() {
        let signal = Arc::new(WakeSignal::new());
        signal.set();
        // Already raised, returns at once
        signal.wait();

        // The first wait cleared it, so this one blocks until the next set
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        signal.set();
        waiter.join().unwrap();
    }

    #[test]
    fn test_exit_is_monotonic() {
        let control = PipelineControl::new();
        control.start_capture();
        assert!(control.is_capturing());

        control.request_exit();
        assert!(control.is_exiting());
        assert!(!control.is_capturing());

        // Restarting after exit has no effect
        control.start_capture();
        assert!(control.is_exiting());
        assert!(!control.is_capturing());
    }
}
