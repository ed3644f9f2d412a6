// SPDX-License-Identifier: GPL-3.0-only

//! Generated test pattern source
//!
//! Renders a bright square bouncing over a dark gradient. Useful without a
//! camera and as a deterministic source for tests.

use super::types::{Frame, Region};
use super::FrameSource;
use crate::errors::CameraError;
use image::{Rgb, RgbImage};
use std::time::{Duration, Instant};

/// Side length of the moving square
const SQUARE_SIZE: u32 = 48;

/// Pixels moved per frame along each axis
const SPEED: i64 = 3;

pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_interval: Option<Duration>,
    last_read: Option<Instant>,
    sequence: u64,
    fail_every: Option<u64>,
    attempts: u64,
    square: Region,
    velocity: (i64, i64),
}

impl SyntheticSource {
    /// Create a source producing `width`x`height` frames.
    ///
    /// `fps == 0` disables pacing; frames are produced as fast as they are read.
    pub fn new(width: u32, height: u32, fps: u32) -> Result<Self, CameraError> {
        if width < SQUARE_SIZE || height < SQUARE_SIZE {
            return Err(CameraError::OpenFailed(format!(
                "synthetic frame {}x{} is smaller than {}px",
                width, height, SQUARE_SIZE
            )));
        }

        let frame_interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));

        Ok(Self {
            width,
            height,
            frame_interval,
            last_read: None,
            sequence: 0,
            fail_every: None,
            attempts: 0,
            square: Region::new(
                (width - SQUARE_SIZE) / 2,
                (height - SQUARE_SIZE) / 2,
                SQUARE_SIZE,
                SQUARE_SIZE,
            ),
            velocity: (SPEED, SPEED),
        })
    }

    /// Make every `n`th read fail, to exercise transient capture errors
    pub fn with_failure_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// Where the square will be drawn in the next frame
    pub fn square(&self) -> Region {
        self.square
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_read) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
    }

    fn advance(&mut self) {
        let max_x = (self.width - self.square.width) as i64;
        let max_y = (self.height - self.square.height) as i64;

        let mut x = self.square.x as i64 + self.velocity.0;
        let mut y = self.square.y as i64 + self.velocity.1;
        if x <= 0 || x >= max_x {
            self.velocity.0 = -self.velocity.0;
            x = x.clamp(0, max_x);
        }
        if y <= 0 || y >= max_y {
            self.velocity.1 = -self.velocity.1;
            y = y.clamp(0, max_y);
        }

        self.square.x = x as u32;
        self.square.y = y as u32;
    }

    fn render(&self) -> RgbImage {
        let square = self.square;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            if x >= square.x && x < square.right() && y >= square.y && y < square.bottom() {
                Rgb([240, 220, 40])
            } else {
                let shade = (x * 96 / self.width + y * 64 / self.height) as u8;
                Rgb([shade / 2, shade, 96u8.saturating_add(shade / 2)])
            }
        })
    }
}

impl FrameSource for SyntheticSource {
    fn read(&mut self) -> Result<Frame, CameraError> {
        self.pace();
        self.attempts += 1;

        if let Some(n) = self.fail_every
            && self.attempts % n == 0
        {
            return Err(CameraError::ReadFailed(format!(
                "injected failure on read {}",
                self.attempts
            )));
        }

        let frame = Frame::new(self.render(), self.sequence);
        self.sequence += 1;
        self.advance();
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }
}
