// SPDX-License-Identifier: GPL-3.0-only

//! Trackfill - real-time object tracking and removal
//!
//! Frames from a camera are tracked, the tracked object is masked out and an
//! external inpainting tool fills the hole. The live tracked view and the
//! latest inpainted frame are shown side by side.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`pipeline`]: queues, worker threads, capture loop and orchestration
//! - [`stages`]: the tracking and inpainting stage functions
//! - [`backends`]: frame sources, renderers, input and region selection
//! - [`terminal`]: terminal UI renderer, selector and key input
//! - [`config`]: user configuration handling
//!
//! # Example
//!
//! ```ignore
//! // Typically run via:
//! // trackfill run --source synthetic
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipeline;
pub mod stages;
pub mod terminal;

// Re-export commonly used types
pub use backends::{Frame, InpaintResult, Region};
pub use config::{Config, QueueCapacity, QueueSettings, SourceKind};
pub use errors::{AppError, AppResult, CameraError, StageError};
pub use pipeline::{BoundedClosableQueue, Orchestrator, PipelineControl, StageWorker, SystemState};
