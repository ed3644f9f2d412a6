// SPDX-License-Identifier: GPL-3.0-only

//! Tracking stage and the built-in trackers
//!
//! The stage paints the tracked region with [`MASK_COLOR`] so that the
//! inpainting tool downstream fills the object in, and tees a copy of every
//! frame to the display queue.

use crate::backends::{Frame, Region, Tracker};
use crate::constants::MASK_COLOR;
use crate::constants::tracking::COARSE_STEP;
use crate::errors::StageError;
use crate::pipeline::BoundedClosableQueue;
use image::{GrayImage, imageops};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, trace};

/// Which tracker implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    /// Grayscale template matching around the previous position
    #[default]
    Template,
    /// Always reports the initial region
    Fixed,
}

impl TrackerKind {
    pub fn build(&self, search_radius: u32, max_mean_diff: f32) -> Box<dyn Tracker> {
        match self {
            TrackerKind::Template => Box::new(TemplateTracker::new(search_radius, max_mean_diff)),
            TrackerKind::Fixed => Box::new(FixedTracker::default()),
        }
    }
}

/// Tracker that never moves the region. Useful for masking a static object.
#[derive(Debug, Default)]
pub struct FixedTracker {
    region: Option<Region>,
}

impl Tracker for FixedTracker {
    fn init(&mut self, frame: &Frame, region: Region) -> Result<(), StageError> {
        let region = region.clamp_to(frame.width(), frame.height());
        if region.is_empty() {
            return Err(StageError::Tracking("empty region".into()));
        }
        self.region = Some(region);
        Ok(())
    }

    fn update(&mut self, frame: &Frame) -> Option<Region> {
        self.region
            .map(|r| r.clamp_to(frame.width(), frame.height()))
            .filter(|r| !r.is_empty())
    }
}

/// Sum-of-absolute-differences template matcher
///
/// Searches a window of `search_radius` pixels around the last known
/// position, coarse first and then pixel-exact around the best candidate. The
/// object is reported lost when the best mean difference exceeds
/// `max_mean_diff`.
#[derive(Debug)]
pub struct TemplateTracker {
    search_radius: u32,
    max_mean_diff: f32,
    template: Option<GrayImage>,
    region: Region,
}

impl TemplateTracker {
    pub fn new(search_radius: u32, max_mean_diff: f32) -> Self {
        Self {
            search_radius,
            max_mean_diff,
            template: None,
            region: Region::new(0, 0, 0, 0),
        }
    }

    /// Mean absolute difference between the template and `gray` at (x, y),
    /// sampling every `stride`th pixel in both directions
    fn score(template: &GrayImage, gray: &GrayImage, x: u32, y: u32, stride: u32) -> f32 {
        let mut total: u64 = 0;
        let mut count: u64 = 0;
        for ty in (0..template.height()).step_by(stride as usize) {
            for tx in (0..template.width()).step_by(stride as usize) {
                let a = template.get_pixel(tx, ty).0[0];
                let b = gray.get_pixel(x + tx, y + ty).0[0];
                total += a.abs_diff(b) as u64;
                count += 1;
            }
        }
        if count == 0 {
            f32::MAX
        } else {
            total as f32 / count as f32
        }
    }

    /// Best (score, x, y) over a square window centred on (cx, cy)
    fn search(
        template: &GrayImage,
        gray: &GrayImage,
        cx: u32,
        cy: u32,
        radius: u32,
        step: u32,
        stride: u32,
    ) -> (f32, u32, u32) {
        let max_x = gray.width() - template.width();
        let max_y = gray.height() - template.height();
        let x0 = cx.saturating_sub(radius);
        let y0 = cy.saturating_sub(radius);
        let x1 = cx.saturating_add(radius).min(max_x);
        let y1 = cy.saturating_add(radius).min(max_y);

        let mut best = (f32::MAX, cx.min(max_x), cy.min(max_y));
        for y in (y0..=y1).step_by(step as usize) {
            for x in (x0..=x1).step_by(step as usize) {
                let s = Self::score(template, gray, x, y, stride);
                if s < best.0 {
                    best = (s, x, y);
                }
            }
        }
        best
    }
}

impl Tracker for TemplateTracker {
    fn init(&mut self, frame: &Frame, region: Region) -> Result<(), StageError> {
        let region = region.clamp_to(frame.width(), frame.height());
        if region.is_empty() {
            return Err(StageError::Tracking("empty region".into()));
        }

        let gray = imageops::grayscale(&frame.image);
        let template =
            imageops::crop_imm(&gray, region.x, region.y, region.width, region.height).to_image();

        debug!(region = %region, "Template tracker initialized");
        self.template = Some(template);
        self.region = region;
        Ok(())
    }

    fn update(&mut self, frame: &Frame) -> Option<Region> {
        let template = self.template.as_ref()?;
        if template.width() > frame.width() || template.height() > frame.height() {
            return None;
        }

        let gray = imageops::grayscale(&frame.image);
        let step = COARSE_STEP.max(1);
        let (_, cx, cy) = Self::search(
            template,
            &gray,
            self.region.x,
            self.region.y,
            self.search_radius,
            step,
            2,
        );
        let (score, x, y) = Self::search(template, &gray, cx, cy, step, 1, 1);

        trace!(score, x, y, "Template match");
        if score > self.max_mean_diff {
            return None;
        }

        self.region.x = x;
        self.region.y = y;
        Some(self.region)
    }
}

/// Stage function state: the tracker plus the display tee
pub struct TrackStage {
    tracker: Box<dyn Tracker>,
    display: BoundedClosableQueue<Frame>,
}

impl TrackStage {
    /// `tracker` must already be initialized
    pub fn new(tracker: Box<dyn Tracker>, display: BoundedClosableQueue<Frame>) -> Self {
        Self { tracker, display }
    }

    /// Track one frame.
    ///
    /// On success the region is masked, a copy goes to the display queue and
    /// the masked frame is returned for inpainting. When the object is lost
    /// the unmasked frame is still displayed but the item is dropped.
    pub fn process(&mut self, mut frame: Frame) -> Result<Frame, StageError> {
        let started = Instant::now();
        let tracked = self.tracker.update(&frame);
        let elapsed = started.elapsed();

        trace!(
            sequence = frame.sequence,
            fps = 1.0 / elapsed.as_secs_f64().max(1e-6),
            "Tracker updated"
        );

        match tracked {
            Some(region) => {
                frame.fill_region(region, MASK_COLOR);
                if self.display.try_put(frame.clone()).is_err() {
                    trace!("Display queue full, dropping tracked frame");
                }
                Ok(frame)
            }
            None => {
                let sequence = frame.sequence;
                let _ = self.display.try_put(frame);
                Err(StageError::Tracking(format!(
                    "tracking failure detected on frame {}",
                    sequence
                )))
            }
        }
    }
}
