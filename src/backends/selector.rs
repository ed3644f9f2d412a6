// SPDX-License-Identifier: GPL-3.0-only

//! Non-interactive region selection

use super::types::{Frame, Region};
use super::RegionSelector;
use crate::errors::{AppError, AppResult};
use tracing::info;

/// Uses a preconfigured region, clamped to the first frame
pub struct FixedSelector {
    region: Region,
}

impl FixedSelector {
    pub fn new(region: Region) -> Self {
        Self { region }
    }
}

impl RegionSelector for FixedSelector {
    fn select(&mut self, frame: &Frame) -> AppResult<Region> {
        let region = self.region.clamp_to(frame.width(), frame.height());
        if region.is_empty() {
            return Err(AppError::Config(format!(
                "region {} lies outside the {}x{} frame",
                self.region,
                frame.width(),
                frame.height()
            )));
        }
        info!(region = %region, "Using configured region");
        Ok(region)
    }
}
