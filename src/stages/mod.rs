// SPDX-License-Identifier: GPL-3.0-only

//! Stage functions run inside [`crate::pipeline::StageWorker`]s
//!
//! - [`tracking`]: follows the selected object and masks it
//! - [`inpaint`]: fills the masked region with an external tool

pub mod inpaint;
pub mod tracking;

pub use inpaint::{CommandTemplate, InpaintTool};
pub use tracking::{FixedTracker, TemplateTracker, TrackStage, TrackerKind};
