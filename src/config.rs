// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `<config dir>/trackfill/config.json`. Every field has a
//! default, so a config file only needs the values it changes. Command line
//! flags are applied on top of the loaded file.

use crate::backends::Region;
use crate::constants::{app_info::APP_NAME, capture, inpaint, queues, timing, tracking};
use crate::errors::{AppError, AppResult};
use crate::stages::{CommandTemplate, TrackerKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Capacity policy of one queue
///
/// Serialized as `{"bounded": 1}` or `"unbounded"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueCapacity {
    /// Holds at most `n` entries; `try_put` beyond that is rejected
    Bounded(usize),
    /// Never rejects
    Unbounded,
}

impl std::fmt::Display for QueueCapacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueCapacity::Bounded(n) => write!(f, "bounded({})", n),
            QueueCapacity::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Capacity of each pipeline queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Capture loop -> tracking
    pub capture: QueueCapacity,
    /// Tracking -> inpainting
    pub track: QueueCapacity,
    /// Inpainting -> display loop
    pub inpaint: QueueCapacity,
    /// Tracking tee -> display loop
    pub display: QueueCapacity,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capture: QueueCapacity::Bounded(queues::PIPELINE_CAPACITY),
            track: QueueCapacity::Bounded(queues::PIPELINE_CAPACITY),
            inpaint: QueueCapacity::Bounded(queues::PIPELINE_CAPACITY),
            display: QueueCapacity::Unbounded,
        }
    }
}

impl QueueSettings {
    fn iter(&self) -> [(&'static str, QueueCapacity); 4] {
        [
            ("capture", self.capture),
            ("track", self.track),
            ("inpaint", self.inpaint),
            ("display", self.display),
        ]
    }
}

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// V4L2 camera device
    #[default]
    V4l2,
    /// Generated test pattern
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame source
    pub source: SourceKind,
    /// V4L2 device path
    pub device: String,
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Frame rate of the synthetic source (0 = unpaced)
    pub fps: u32,
    /// Tracking algorithm
    pub tracker: TrackerKind,
    /// Template tracker search radius in pixels
    pub search_radius: u32,
    /// Template tracker loss threshold (mean absolute difference)
    pub max_mean_diff: f32,
    /// Initial region; `None` selects interactively (or uses the default in headless mode)
    pub region: Option<Region>,
    /// Queue capacities
    pub queues: QueueSettings,
    /// Inpainting command template with `{input}` and `{output}` placeholders
    pub inpaint_command: String,
    /// Directory for the inpainting temp files
    pub work_dir: PathBuf,
    /// Directory for snapshots; `None` uses the pictures directory
    pub snapshot_dir: Option<PathBuf>,
    /// Upper bound of one display loop wait, in milliseconds
    pub display_poll_ms: u64,
    /// Key poll timeout, in milliseconds
    pub key_poll_ms: u64,
    /// Run without the terminal UI
    pub headless: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            device: capture::DEFAULT_DEVICE.to_string(),
            width: capture::DEFAULT_WIDTH,
            height: capture::DEFAULT_HEIGHT,
            fps: capture::DEFAULT_FPS,
            tracker: TrackerKind::default(),
            search_radius: tracking::DEFAULT_SEARCH_RADIUS,
            max_mean_diff: tracking::DEFAULT_MAX_MEAN_DIFF,
            region: None,
            queues: QueueSettings::default(),
            inpaint_command: inpaint::DEFAULT_COMMAND.to_string(),
            work_dir: std::env::temp_dir().join(APP_NAME),
            snapshot_dir: None,
            display_poll_ms: timing::DISPLAY_POLL.as_millis() as u64,
            key_poll_ms: timing::KEY_POLL.as_millis() as u64,
            headless: false,
        }
    }
}

impl Config {
    /// `<config dir>/trackfill/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.json"))
    }

    /// Load from `path`, or from [`Config::default_path`] if it exists, or
    /// fall back to defaults. An explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => p,
                None => {
                    debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_json(text: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        for (name, capacity) in self.queues.iter() {
            if capacity == QueueCapacity::Bounded(0) {
                return Err(AppError::Config(format!(
                    "{} queue capacity must be at least 1",
                    name
                )));
            }
        }
        if self.width == 0 || self.height == 0 {
            return Err(AppError::Config("capture size must be non-zero".into()));
        }
        if self.display_poll_ms == 0 {
            return Err(AppError::Config("display_poll_ms must be non-zero".into()));
        }
        if self.key_poll_ms == 0 {
            return Err(AppError::Config("key_poll_ms must be non-zero".into()));
        }
        if let Some(region) = self.region
            && region.is_empty()
        {
            return Err(AppError::Config("region must have a non-zero size".into()));
        }
        self.command_template()?;
        Ok(())
    }

    pub fn command_template(&self) -> AppResult<CommandTemplate> {
        CommandTemplate::parse(&self.inpaint_command).map_err(AppError::Config)
    }

    /// Region used when no interactive selection happens
    pub fn region_or_default(&self) -> Region {
        self.region.unwrap_or_else(|| {
            let (x, y, w, h) = tracking::DEFAULT_REGION;
            Region::new(x, y, w, h)
        })
    }

    pub fn display_poll(&self) -> Duration {
        Duration::from_millis(self.display_poll_ms)
    }

    pub fn key_poll(&self) -> Duration {
        Duration::from_millis(self.key_poll_ms)
    }

    /// Snapshot directory, falling back to the user's pictures directory
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        })
    }
}
