// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera source
//!
//! Captures through a memory-mapped V4L2 stream using the `v4l` crate and
//! converts each buffer to RGB8. YUYV is converted with BT.601 coefficients,
//! MJPG buffers are decoded with the `image` crate.

use super::types::Frame;
use super::FrameSource;
use crate::constants::capture::V4L2_BUFFER_COUNT;
use crate::errors::CameraError;
use image::RgbImage;
use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Pixel formats we know how to convert, in order of preference
const PREFERRED_FOURCCS: [&[u8; 4]; 3] = [b"YUYV", b"MJPG", b"RGB3"];

/// A V4L2 device listed by [`list_devices`]
#[derive(Debug, Clone)]
pub struct V4l2DeviceInfo {
    pub path: String,
    pub name: String,
}

/// Enumerate V4L2 video nodes
pub fn list_devices() -> Vec<V4l2DeviceInfo> {
    let mut devices: Vec<V4l2DeviceInfo> = v4l::context::enum_devices()
        .into_iter()
        .map(|node| V4l2DeviceInfo {
            path: node.path().to_string_lossy().to_string(),
            name: node.name().unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect();
    devices.sort_by(|a, b| a.path.cmp(&b.path));
    devices
}

pub struct V4l2Source {
    path: String,
    card: String,
    width: u32,
    height: u32,
    fourcc: FourCC,
    stream: Stream<'static>,
    sequence: u64,
}

impl V4l2Source {
    /// Open `path` and negotiate the closest supported format to `width`x`height`
    pub fn open(path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        if !std::path::Path::new(path).exists() {
            return Err(CameraError::NoCameraFound);
        }
        let dev = Device::with_path(path)
            .map_err(|e| CameraError::OpenFailed(format!("{}: {}", path, e)))?;

        let card = dev
            .query_caps()
            .map(|caps| caps.card)
            .unwrap_or_else(|_| path.to_string());

        let format = negotiate_format(&dev, width, height)?;

        info!(
            path,
            card = %card,
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "V4L2 format configured"
        );

        let stream = Stream::with_buffers(&dev, Type::VideoCapture, V4L2_BUFFER_COUNT)
            .map_err(|e| CameraError::OpenFailed(format!("Failed to create stream: {}", e)))?;

        Ok(Self {
            path: path.to_string(),
            card,
            width: format.width,
            height: format.height,
            fourcc: format.fourcc,
            stream,
            sequence: 0,
        })
    }
}

fn negotiate_format(dev: &Device, width: u32, height: u32) -> Result<Format, CameraError> {
    for fourcc in PREFERRED_FOURCCS {
        let requested = Format::new(width, height, FourCC::new(fourcc));
        match dev.set_format(&requested) {
            Ok(actual) if actual.fourcc == requested.fourcc => return Ok(actual),
            Ok(actual) => {
                debug!(requested = %requested.fourcc, actual = %actual.fourcc, "Driver substituted format");
            }
            Err(e) => {
                debug!(fourcc = %requested.fourcc, error = %e, "Format rejected");
            }
        }
    }

    let current = dev
        .format()
        .map_err(|e| CameraError::OpenFailed(format!("Failed to query format: {}", e)))?;
    Err(CameraError::UnsupportedFormat(current.fourcc.to_string()))
}

impl FrameSource for V4l2Source {
    fn read(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::ReadFailed(e.to_string()))?;

        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        let data = &buf[..used];

        let image = if self.fourcc == FourCC::new(b"YUYV") {
            yuyv_to_rgb(data, self.width, self.height)?
        } else if self.fourcc == FourCC::new(b"MJPG") {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
                .map_err(|e| CameraError::ReadFailed(format!("MJPG decode: {}", e)))?
                .to_rgb8()
        } else {
            RgbImage::from_raw(self.width, self.height, data.to_vec()).ok_or_else(|| {
                CameraError::ReadFailed(format!("short RGB3 buffer ({} bytes)", data.len()))
            })?
        };

        let frame = Frame::new(image, self.sequence);
        self.sequence += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!(
            "{} ({}) {}x{} {}",
            self.card, self.path, self.width, self.height, self.fourcc
        )
    }
}

/// Convert packed YUYV 4:2:2 to RGB8
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage, CameraError> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return Err(CameraError::ReadFailed(format!(
            "short YUYV buffer: {} < {} bytes",
            data.len(),
            expected
        )));
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    // Y0 U Y1 V: two pixels share chroma
    for chunk in data[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        let (r, g, b) = yuv_to_rgb(y0, u, v);
        rgb.extend_from_slice(&[r, g, b]);
        let (r, g, b) = yuv_to_rgb(y1, u, v);
        rgb.extend_from_slice(&[r, g, b]);
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| CameraError::ReadFailed("YUYV conversion size mismatch".into()))
}

/// Convert YUV (BT.601) to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}
