// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Key code that cancels the pipeline (ESC)
pub const ESC_KEY: u8 = 27;

/// Key code that saves a snapshot of the last tracked frame
pub const SNAPSHOT_KEY: u8 = b'p';

/// Color painted over the tracked region; the inpainting tool fills it back in
pub const MASK_COLOR: [u8; 3] = [255, 0, 0];

/// Pane labels used by the display loop
pub mod panes {
    /// Tracked frames teed off by the tracking stage
    pub const TRACKED: &str = "Tracked";

    /// Frames returned by the inpainting tool
    pub const INPAINT: &str = "Inpaint";
}

/// Queue defaults
pub mod queues {
    /// Capacity of the pipeline-internal queues (capture, track, inpaint)
    pub const PIPELINE_CAPACITY: usize = 1;
}

/// Inpainting tool defaults
pub mod inpaint {
    /// Default G'MIC invocation; the mask color matches [`super::MASK_COLOR`]
    pub const DEFAULT_COMMAND: &str =
        "gmic {input} v 0 fx_inpaint_patchmatch 0,9,10,5,1,255,0,0,255,0,0 -o {output}";

    /// Placeholder replaced with the input image path
    pub const INPUT_PLACEHOLDER: &str = "{input}";

    /// Placeholder replaced with the output image path
    pub const OUTPUT_PLACEHOLDER: &str = "{output}";

    /// Image format extension for the temp file pair
    pub const FILE_EXTENSION: &str = "png";
}

/// Tracking defaults
pub mod tracking {
    /// Initial region when no interactive selection is made (x, y, width, height)
    pub const DEFAULT_REGION: (u32, u32, u32, u32) = (287, 23, 86, 320);

    /// Search radius in pixels around the previous region
    pub const DEFAULT_SEARCH_RADIUS: u32 = 24;

    /// Mean absolute grayscale difference above which tracking is lost
    pub const DEFAULT_MAX_MEAN_DIFF: f32 = 40.0;

    /// Step used when scanning candidate positions before refinement
    pub const COARSE_STEP: u32 = 4;
}

/// Capture defaults
pub mod capture {
    /// Default capture width
    pub const DEFAULT_WIDTH: u32 = 640;

    /// Default capture height
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Default frame rate for the synthetic source
    pub const DEFAULT_FPS: u32 = 30;

    /// Default V4L2 device
    pub const DEFAULT_DEVICE: &str = "/dev/video0";

    /// Number of memory-mapped buffers for V4L2 streaming
    pub const V4L2_BUFFER_COUNT: u32 = 4;

    /// Capture statistics are logged every this many frames
    pub const FRAME_LOG_INTERVAL: u64 = 300;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Upper bound of one display loop wait
    pub const DISPLAY_POLL: Duration = Duration::from_millis(30);

    /// Timeout for a single key poll
    pub const KEY_POLL: Duration = Duration::from_millis(10);

    /// Region selector movement per arrow key press
    pub const SELECTOR_STEP: u32 = 8;
}

/// Application information utilities
pub mod app_info {
    /// Application name used for directories and logs
    pub const APP_NAME: &str = "trackfill";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
