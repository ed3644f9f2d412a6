// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Running the tracking pipeline (terminal UI or headless)
//! - Listing available cameras
//! - Inpainting a single image
//! - Printing the effective configuration

use crate::RunArgs;
use std::path::{Path, PathBuf};
use tracing::info;
use trackfill::backends::headless::{CtrlcPoller, HeadlessRenderer};
use trackfill::backends::selector::FixedSelector;
use trackfill::backends::synthetic::SyntheticSource;
use trackfill::backends::v4l2::{V4l2Source, list_devices};
use trackfill::backends::{FrameSource, InputPoller, RegionSelector, Renderer};
use trackfill::config::{Config, SourceKind};
use trackfill::constants::app_info::APP_NAME;
use trackfill::errors::{AppError, AppResult, CameraError};
use trackfill::pipeline::{Orchestrator, RunSettings};
use trackfill::stages::InpaintTool;
use trackfill::terminal::{TerminalPoller, TerminalRenderer, TerminalSelector, TerminalSession};

/// Where the terminal UI writes its log
pub fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
        .join(format!("{}.log", APP_NAME))
}

/// Load the config file and apply command line overrides on top
fn load_config(args: RunArgs) -> AppResult<Config> {
    let mut config = Config::load(args.config.as_deref())?;

    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(tracker) = args.tracker {
        config.tracker = tracker;
    }
    if args.region.is_some() {
        config.region = args.region;
    }
    if args.headless {
        config.headless = true;
    }
    if let Some(command) = args.inpaint_command {
        config.inpaint_command = command;
    }
    if let Some(dir) = args.work_dir {
        config.work_dir = dir;
    }
    if args.snapshot_dir.is_some() {
        config.snapshot_dir = args.snapshot_dir;
    }

    config.validate()?;
    Ok(config)
}

/// Run the pipeline until Esc (or Ctrl+C in headless mode)
pub fn run_pipeline(args: RunArgs) -> AppResult<()> {
    let config = load_config(args)?;
    std::fs::create_dir_all(&config.work_dir).map_err(|e| {
        AppError::Storage(format!(
            "cannot create work dir {}: {}",
            config.work_dir.display(),
            e
        ))
    })?;

    info!(
        source = ?config.source,
        tracker = ?config.tracker,
        work_dir = %config.work_dir.display(),
        "Starting trackfill"
    );

    let snapshots = if config.headless {
        let mut selector = FixedSelector::new(config.region_or_default());
        let poller = CtrlcPoller::install()?;
        let renderer = HeadlessRenderer::new();
        execute(&config, renderer, &mut selector, Box::new(poller))?
    } else {
        let session = TerminalSession::enter()?;
        let snapshots = TerminalRenderer::new().and_then(|renderer| {
            let mut selector: Box<dyn RegionSelector> = match config.region {
                Some(region) => Box::new(FixedSelector::new(region)),
                None => Box::new(TerminalSelector::new(config.region_or_default())),
            };
            execute(
                &config,
                renderer,
                selector.as_mut(),
                Box::new(TerminalPoller),
            )
        });
        // Back on the main screen before anything is printed
        drop(session);
        snapshots?
    };

    for path in &snapshots {
        println!("Snapshot: {}", path.display());
    }
    Ok(())
}

/// Run one pipeline and return the snapshots saved during it
fn execute<R: Renderer>(
    config: &Config,
    renderer: R,
    selector: &mut dyn RegionSelector,
    poller: Box<dyn InputPoller>,
) -> AppResult<Vec<PathBuf>> {
    let settings = RunSettings {
        queues: config.queues,
        display_poll: config.display_poll(),
        key_poll: config.key_poll(),
        snapshot_dir: config.snapshot_dir(),
    };
    let tracker = config.tracker.build(config.search_radius, config.max_mean_diff);
    let tool = InpaintTool::new(config.command_template()?, config.work_dir.clone());

    let source_config = config.clone();
    let opener = move || open_source(&source_config);

    let mut orchestrator = Orchestrator::new(settings, renderer);
    let handles = orchestrator.run(
        opener,
        selector,
        tracker,
        move |frame| tool.process(frame),
        poller,
    )?;

    info!(
        capture = %handles.capture.stats().summary(),
        track = %handles.track.stats().summary(),
        inpaint = %handles.inpaint.stats().summary(),
        "Pipeline stopped"
    );

    // Workers are left running; the process exits right after this
    drop(handles);
    orchestrator.finish()?;
    Ok(orchestrator.snapshots().to_vec())
}

fn open_source(config: &Config) -> Result<Box<dyn FrameSource>, CameraError> {
    let source: Box<dyn FrameSource> = match config.source {
        SourceKind::V4l2 => Box::new(V4l2Source::open(
            &config.device,
            config.width,
            config.height,
        )?),
        SourceKind::Synthetic => {
            Box::new(SyntheticSource::new(config.width, config.height, config.fps)?)
        }
    };
    Ok(source)
}

/// List all available V4L2 cameras
pub fn list_cameras() -> AppResult<()> {
    let devices = list_devices();

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for device in &devices {
        println!("  {}  {}", device.path, device.name);
    }
    println!();

    Ok(())
}

/// Run the configured inpainting tool on one image
pub fn inpaint_file(input: &Path, output: Option<PathBuf>, config: Option<&Path>) -> AppResult<()> {
    let config = Config::load(config)?;
    if !input.exists() {
        return Err(AppError::Storage(format!("{} does not exist", input.display())));
    }

    let output = output.unwrap_or_else(|| default_inpaint_output(input));
    let tool = InpaintTool::new(config.command_template()?, config.work_dir.clone());

    println!("Inpainting {} ...", input.display());
    tool.run(input, &output)?;
    println!("Saved: {}", output.display());
    Ok(())
}

/// `photo.jpg` -> `photo_inpainted.png` in the same directory
fn default_inpaint_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_inpainted.png", stem))
}

/// Print the effective configuration as JSON
pub fn print_config(path: Option<&Path>) -> AppResult<()> {
    let config = Config::load(path)?;
    println!("{}", config.to_json_pretty()?);
    if let Some(default) = Config::default_path() {
        println!();
        println!("Default config path: {}", default.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use trackfill::constants::{ESC_KEY, SNAPSHOT_KEY};
    use trackfill::stages::TrackerKind;

    #[test]
    fn test_default_inpaint_output() {
        assert_eq!(
            default_inpaint_output(Path::new("/tmp/photo.jpg")),
            PathBuf::from("/tmp/photo_inpainted.png")
        );
    }

    #[test]
    fn test_overrides_apply_on_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"fps": 5, "headless": false}"#).unwrap();

        let config = load_config(RunArgs {
            config: Some(path),
            source: Some(SourceKind::Synthetic),
            headless: true,
            region: Some(trackfill::Region::new(1, 2, 3, 4)),
            ..RunArgs::default()
        })
        .unwrap();

        assert_eq!(config.fps, 5);
        assert_eq!(config.source, SourceKind::Synthetic);
        assert!(config.headless);
        assert_eq!(config.region, Some(trackfill::Region::new(1, 2, 3, 4)));
    }

    /// Presses `p` for a while once frames flow, then Esc
    struct SnapshotThenEscape(std::time::Instant);

    impl InputPoller for SnapshotThenEscape {
        fn poll_key(&mut self, timeout: Duration) -> AppResult<Option<u8>> {
            let elapsed = self.0.elapsed();
            if elapsed > Duration::from_millis(600) {
                return Ok(Some(ESC_KEY));
            }
            std::thread::sleep(timeout);
            if elapsed > Duration::from_millis(300) {
                return Ok(Some(SNAPSHOT_KEY));
            }
            Ok(None)
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_returns_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            source: SourceKind::Synthetic,
            width: 160,
            height: 120,
            fps: 100,
            tracker: TrackerKind::Fixed,
            region: Some(trackfill::Region::new(10, 10, 20, 20)),
            inpaint_command: "cp {input} {output}".into(),
            work_dir: dir.path().join("work"),
            snapshot_dir: Some(dir.path().join("shots")),
            headless: true,
            ..Config::default()
        };
        config.validate().unwrap();
        std::fs::create_dir_all(&config.work_dir).unwrap();

        let mut selector = FixedSelector::new(config.region_or_default());
        let snapshots = execute(
            &config,
            HeadlessRenderer::new(),
            &mut selector,
            Box::new(SnapshotThenEscape(std::time::Instant::now())),
        )
        .unwrap();

        assert!(!snapshots.is_empty());
        assert!(snapshots.iter().all(|path| path.exists()));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let result = load_config(RunArgs {
            config: Some(path),
            inpaint_command: Some("gmic".into()),
            ..RunArgs::default()
        });
        assert!(result.is_err());
    }
}
