// SPDX-License-Identifier: GPL-3.0-only

//! Generic stage worker thread
//!
//! A [`StageWorker`] drains one input queue, applies a stage function to each
//! item and offers the result to an output queue. An unreliable stage must
//! not take the pipeline down, so:
//!
//! - a failing (or panicking) stage function drops that item and the worker
//!   moves on to the next one; the item is never redelivered
//! - a result that does not fit in the output queue is dropped
//! - the worker ends only when its input queue is closed
//!
//! Failures and drops are logged and counted in [`StageStats`].
//!
//! # Example
//!
//! ```ignore
//! let input = BoundedClosableQueue::bounded(1);
//! let output = BoundedClosableQueue::bounded(1);
//! let worker = StageWorker::spawn("double", input.clone(), output.clone(), |x: u32| Ok(x * 2))?;
//! input.put(21);
//! assert_eq!(output.get(), Some(42));
//! input.close();
//! worker.join();
//! ```

use super::queue::BoundedClosableQueue;
use super::stats::{StageStats, StatsSnapshot};
use crate::errors::{AppError, AppResult, StageError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Handle to a running stage thread
///
/// Dropping the handle detaches the thread; it keeps running until its input
/// queue closes or the process exits.
pub struct StageWorker {
    name: String,
    thread_handle: JoinHandle<()>,
    stats: Arc<StageStats>,
}

impl StageWorker {
    /// Start a worker thread running `stage` over `input`, feeding `output`
    pub fn spawn<In, Out, F>(
        name: &str,
        input: BoundedClosableQueue<In>,
        output: BoundedClosableQueue<Out>,
        stage: F,
    ) -> AppResult<Self>
    where
        In: Send + 'static,
        Out: Send + 'static,
        F: FnMut(In) -> Result<Out, StageError> + Send + 'static,
    {
        let stats = Arc::new(StageStats::new());
        let stats_clone = Arc::clone(&stats);
        let name_clone = name.to_string();

        info!(name = %name, "Starting stage worker");

        let thread_handle = thread::Builder::new()
            .name(format!("stage-{}", name))
            .spawn(move || run_stage(&name_clone, &input, &output, stage, &stats_clone))
            .map_err(|e| {
                AppError::Other(format!("failed to spawn stage worker {}: {}", name, e))
            })?;

        Ok(Self {
            name: name.to_string(),
            thread_handle,
            stats,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the worker thread is still running
    pub fn is_running(&self) -> bool {
        !self.thread_handle.is_finished()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared counters, readable after the handle is gone
    pub fn stats_handle(&self) -> Arc<StageStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for the worker to finish. Only returns once the input queue has
    /// been closed and drained up to the close marker.
    pub fn join(self) {
        debug!(name = %self.name, "Waiting for stage worker to finish");
        if let Err(e) = self.thread_handle.join() {
            warn!(name = %self.name, "Stage worker thread panicked: {:?}", e);
        }
    }
}

fn run_stage<In, Out, F>(
    name: &str,
    input: &BoundedClosableQueue<In>,
    output: &BoundedClosableQueue<Out>,
    mut stage: F,
    stats: &StageStats,
) where
    F: FnMut(In) -> Result<Out, StageError>,
{
    debug!(name, "Stage worker thread started");

    for item in input {
        let started = Instant::now();
        let result = match panic::catch_unwind(AssertUnwindSafe(|| stage(item))) {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                stats.record_failure();
                warn!(name, error = %e, "Stage failed, dropping item");
                continue;
            }
            Err(_) => {
                stats.record_failure();
                warn!(name, "Stage panicked, dropping item");
                continue;
            }
        };
        stats.record_success(started.elapsed());

        if output.try_put(result).is_err() {
            stats.record_drop();
            trace!(name, "Output queue full, dropping result");
        }
    }

    info!(name, "Input closed, stage worker exiting");
}
