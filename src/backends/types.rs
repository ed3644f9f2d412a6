// SPDX-License-Identifier: GPL-3.0-only

//! Shared types flowing through the pipeline

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

/// A single captured frame
///
/// Frames are moved through the pipeline by value. Once a frame is pushed
/// onto a queue the producer no longer owns it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// RGB8 pixel data
    pub image: RgbImage,
    /// When the frame left the source
    pub captured_at: Instant,
    /// Per-source sequence number, starting at 0
    pub sequence: u64,
}

impl Frame {
    /// Wrap an image captured now
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
            sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Paint a solid rectangle, clipped to the frame
    pub fn fill_region(&mut self, region: Region, color: [u8; 3]) {
        let region = region.clamp_to(self.width(), self.height());
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                self.image.put_pixel(x, y, Rgb(color));
            }
        }
    }

    /// Paint a one-pixel rectangle outline, clipped to the frame
    pub fn outline_region(&mut self, region: Region, color: [u8; 3]) {
        let region = region.clamp_to(self.width(), self.height());
        if region.is_empty() {
            return;
        }
        let (right, bottom) = (region.right() - 1, region.bottom() - 1);
        for x in region.x..region.right() {
            self.image.put_pixel(x, region.y, Rgb(color));
            self.image.put_pixel(x, bottom, Rgb(color));
        }
        for y in region.y..region.bottom() {
            self.image.put_pixel(region.x, y, Rgb(color));
            self.image.put_pixel(right, y, Rgb(color));
        }
    }
}

/// Region of interest in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Shrink the region so that it lies entirely inside a `width`x`height` frame
    pub fn clamp_to(&self, width: u32, height: u32) -> Region {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Region {
            x,
            y,
            width: self.right().min(width) - x,
            height: self.bottom().min(height) - y,
        }
    }

    /// Move the region by a signed offset, keeping it inside the frame
    pub fn offset_within(&self, dx: i64, dy: i64, width: u32, height: u32) -> Region {
        let max_x = width.saturating_sub(self.width) as i64;
        let max_y = height.saturating_sub(self.height) as i64;
        Region {
            x: (self.x as i64 + dx).clamp(0, max_x) as u32,
            y: (self.y as i64 + dy).clamp(0, max_y) as u32,
            ..*self
        }
    }

    /// Grow (positive) or shrink (negative) symmetrically, keeping at least 1x1
    pub fn resize_within(&self, delta: i64, width: u32, height: u32) -> Region {
        let new_w = (self.width as i64 + 2 * delta).max(1) as u32;
        let new_h = (self.height as i64 + 2 * delta).max(1) as u32;
        let x = (self.x as i64 - delta).max(0) as u32;
        let y = (self.y as i64 - delta).max(0) as u32;
        Region::new(x, y, new_w, new_h).clamp_to(width, height)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    /// Parse `x,y,width,height`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid region '{}': {}", s, e))?;

        match parts.as_slice() {
            [x, y, w, h] if *w > 0 && *h > 0 => Ok(Region::new(*x, *y, *w, *h)),
            [_, _, _, _] => Err(format!("region '{}' must have a non-zero size", s)),
            _ => Err(format!("region '{}' must be x,y,width,height", s)),
        }
    }
}

/// Output of the inpainting stage: a file ready to be displayed
///
/// The result owns its file. Dropping it, whether after display or because
/// a full queue turned it away, removes the file.
#[derive(Debug, PartialEq, Eq)]
pub struct InpaintResult {
    pub path: PathBuf,
}

impl Drop for InpaintResult {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(path = %self.path.display(), error = %e, "Failed to remove inpaint output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parse() {
        assert_eq!(
            "287, 23,86,320".parse::<Region>(),
            Ok(Region::new(287, 23, 86, 320))
        );
        assert!("1,2,3".parse::<Region>().is_err());
        assert!("1,2,0,4".parse::<Region>().is_err());
        assert!("a,b,c,d".parse::<Region>().is_err());
    }

    #[test]
    fn test_region_clamp() {
        let r = Region::new(600, 400, 100, 100).clamp_to(640, 480);
        assert_eq!(r, Region::new(600, 400, 40, 80));

        let outside = Region::new(700, 500, 10, 10).clamp_to(640, 480);
        assert!(outside.is_empty());
    }

    #[test]
    fn test_region_offset_stays_inside() {
        let r = Region::new(10, 10, 20, 20);
        assert_eq!(r.offset_within(-50, 0, 100, 100), Region::new(0, 10, 20, 20));
        assert_eq!(r.offset_within(500, 500, 100, 100), Region::new(80, 80, 20, 20));
    }

    #[test]
    fn test_region_resize() {
        let r = Region::new(10, 10, 20, 20);
        assert_eq!(r.resize_within(2, 100, 100), Region::new(8, 8, 24, 24));
        assert_eq!(r.resize_within(-20, 100, 100), Region::new(30, 30, 1, 1));
    }

    #[test]
    fn test_fill_region_is_clipped() {
        let mut frame = Frame::new(RgbImage::new(4, 4), 0);
        frame.fill_region(Region::new(2, 2, 10, 10), [255, 0, 0]);

        assert_eq!(frame.image.get_pixel(3, 3), &Rgb([255, 0, 0]));
        assert_eq!(frame.image.get_pixel(1, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_inpaint_result_removes_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        std::fs::write(&path, b"png").unwrap();

        let result = InpaintResult { path: path.clone() };
        assert!(path.exists());
        drop(result);
        assert!(!path.exists());

        // Already gone is fine
        drop(InpaintResult { path });
    }
}
