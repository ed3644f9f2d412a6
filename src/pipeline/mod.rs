// SPDX-License-Identifier: GPL-3.0-only

//! Threaded capture -> track -> inpaint -> display pipeline
//!
//! ```text
//! CaptureLoop ─▶ [capture] ─▶ track worker ─▶ [track] ─▶ inpaint worker ─▶ [inpaint] ─┐
//!                                  │                                                    │
//!                                  └──────────────▶ [display] ─────────────▶ display loop
//! ```
//!
//! Every arrow into a bounded queue is a `try_put`: when downstream is busy
//! the newest item is dropped, so the pipeline never builds up latency.
//!
//! # Modules
//!
//! - [`queue`]: the closable queue connecting the stages
//! - [`control`]: capture/exit flags and the wake signal
//! - [`worker`]: generic stage worker thread
//! - [`capture`]: the capture loop thread
//! - [`input`]: key listener thread
//! - [`stats`]: per-stage counters
//! - [`orchestrator`]: setup, display loop and shutdown

pub mod capture;
pub mod control;
pub mod input;
pub mod orchestrator;
pub mod queue;
pub mod stats;
pub mod worker;

pub use capture::CaptureLoop;
pub use control::{PipelineControl, WakeSignal};
pub use input::KeyListener;
pub use orchestrator::{
    Orchestrator, PipelineHandles, PipelineQueues, RunSettings, SystemState, save_frame,
};
pub use queue::{BoundedClosableQueue, QueueIter, Slot, TryGetError};
pub use stats::{StageStats, StatsSnapshot};
pub use worker::StageWorker;
