// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the tracking and inpainting pipeline

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Frame source errors
    Camera(CameraError),
    /// Stage (tracking/inpainting) errors
    Stage(StageError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Terminal setup or drawing errors
    Terminal(String),
    /// Setup was cancelled by the user (e.g. Esc during region selection)
    Cancelled,
    /// Invalid lifecycle transition
    InvalidTransition(String),
    /// Generic error with message
    Other(String),
}

/// Frame source errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Device could not be opened or configured
    OpenFailed(String),
    /// A single frame could not be read
    ReadFailed(String),
    /// Device produced a pixel format we cannot convert
    UnsupportedFormat(String),
}

/// Per-item stage failures
///
/// These never leave a stage worker; they are logged and counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Tracker initialization or update failed
    Tracking(String),
    /// The external inpainting tool failed or produced no output
    Inpaint(String),
    /// Temporary file I/O failed
    Io(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Stage(e) => write!(f, "Stage error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Terminal(msg) => write!(f, "Terminal error: {}", msg),
            AppError::Cancelled => write!(f, "Cancelled by user"),
            AppError::InvalidTransition(msg) => write!(f, "Invalid state transition: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::OpenFailed(msg) => write!(f, "Could not open video source: {}", msg),
            CameraError::ReadFailed(msg) => write!(f, "Failed to grab frame: {}", msg),
            CameraError::UnsupportedFormat(msg) => write!(f, "Unsupported pixel format: {}", msg),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Tracking(msg) => write!(f, "Tracking failed: {}", msg),
            StageError::Inpaint(msg) => write!(f, "Inpainting failed: {}", msg),
            StageError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for StageError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<StageError> for AppError {
    fn from(err: StageError) -> Self {
        AppError::Stage(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        StageError::Io(err.to_string())
    }
}

impl From<image::ImageError> for StageError {
    fn from(err: image::ImageError) -> Self {
        StageError::Io(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
