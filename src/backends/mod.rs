// SPDX-License-Identifier: GPL-3.0-only

//! Collaborators consumed by the pipeline core
//!
//! The pipeline only talks to these traits. Concrete implementations live in
//! the submodules (and in [`crate::terminal`] for the interactive ones):
//!
//! ```text
//! ┌──────────────┐  read()   ┌─────────────┐  update()  ┌─────────┐
//! │ FrameSource  │ ────────▶ │ CaptureLoop │ ─ ─ ─ ─ ─▶ │ Tracker │
//! │ v4l2/synth   │           └─────────────┘            └─────────┘
//! └──────────────┘
//! ┌──────────────┐  show()   ┌──────────────┐ poll_key() ┌─────────────┐
//! │  Renderer    │ ◀──────── │ Orchestrator │ ─────────▶ │ InputPoller │
//! │ tui/headless │           └──────────────┘            └─────────────┘
//! └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`]: frames, regions and stage results
//! - [`v4l2`]: V4L2 camera source
//! - [`synthetic`]: generated test pattern source
//! - [`headless`]: log-only renderer and Ctrl+C poller
//! - [`selector`]: non-interactive region selection

pub mod headless;
pub mod selector;
pub mod synthetic;
pub mod types;
pub mod v4l2;

pub use types::{Frame, InpaintResult, Region};

use crate::errors::{AppResult, CameraError, StageError};
use std::time::Duration;

/// A source of frames (camera, file, generator)
///
/// Opening happens in the implementor's constructor; a source that exists is
/// open. Owned exclusively by the capture thread once the pipeline runs.
pub trait FrameSource: Send {
    /// Read the next frame, blocking until one is available
    fn read(&mut self) -> Result<Frame, CameraError>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Object tracking algorithm
pub trait Tracker: Send {
    /// Initialize with the first frame and the region to follow
    fn init(&mut self, frame: &Frame, region: Region) -> Result<(), StageError>;

    /// Locate the object in a new frame, `None` when it is lost
    fn update(&mut self, frame: &Frame) -> Option<Region>;
}

/// Blocking selection of the initial region of interest
pub trait RegionSelector {
    fn select(&mut self, frame: &Frame) -> AppResult<Region>;
}

/// Displays frames in labelled panes/windows
pub trait Renderer {
    fn show(&mut self, label: &str, frame: &Frame) -> AppResult<()>;

    /// Update a one-line status text, if the renderer has somewhere to put it
    fn set_status(&mut self, _status: &str) {}
}

/// Polls for key presses
///
/// Returned codes are ASCII-like bytes; [`crate::constants::ESC_KEY`] is the
/// cancellation code.
pub trait InputPoller: Send {
    fn poll_key(&mut self, timeout: Duration) -> AppResult<Option<u8>>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read(&mut self) -> Result<Frame, CameraError> {
        (**self).read()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    fn init(&mut self, frame: &Frame, region: Region) -> Result<(), StageError> {
        (**self).init(frame, region)
    }

    fn update(&mut self, frame: &Frame) -> Option<Region> {
        (**self).update(frame)
    }
}
