// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline orchestration
//!
//! Sets the pipeline up, runs the display loop on the calling thread and
//! tears down on Esc:
//!
//! ```text
//! Init ──▶ SelectRegion ──▶ Running ──▶ Exiting ──▶ Terminated
//!   │            │
//!   └────────────┴──▶ Terminated (fatal setup error)
//! ```
//!
//! Setup failures (no source, no first frame, cancelled selection, tracker
//! init) abort before any thread is started. A pipeline thread that fails to
//! spawn is fatal too; the run moves to Exiting and returns the error. Once
//! running, nothing short of Esc stops the pipeline; stage and render errors
//! only drop items.

use super::capture::CaptureLoop;
use super::control::PipelineControl;
use super::input::KeyListener;
use super::queue::{BoundedClosableQueue, TryGetError};
use super::stats::StageStats;
use super::worker::StageWorker;
use crate::backends::{
    Frame, FrameSource, InpaintResult, InputPoller, RegionSelector, Renderer, Tracker,
};
use crate::config::QueueSettings;
use crate::constants::{ESC_KEY, SNAPSHOT_KEY, panes};
use crate::errors::{AppError, AppResult, CameraError, StageError};
use crate::stages::TrackStage;
use crossbeam_channel::Select;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lifecycle of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Init,
    SelectRegion,
    Running,
    Exiting,
    Terminated,
}

impl SystemState {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: SystemState) -> bool {
        use SystemState::*;
        matches!(
            (self, next),
            (Init, SelectRegion)
                | (SelectRegion, Running)
                | (Running, Exiting)
                | (Exiting, Terminated)
                | (Init, Terminated)
                | (SelectRegion, Terminated)
        )
    }

    pub fn transition(self, next: SystemState) -> AppResult<SystemState> {
        if self.can_transition_to(next) {
            debug!(from = ?self, to = ?next, "State transition");
            Ok(next)
        } else {
            Err(AppError::InvalidTransition(format!(
                "{:?} -> {:?}",
                self, next
            )))
        }
    }
}

impl std::fmt::Display for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SystemState::Init => "init",
            SystemState::SelectRegion => "select-region",
            SystemState::Running => "running",
            SystemState::Exiting => "exiting",
            SystemState::Terminated => "terminated",
        };
        write!(f, "{}", name)
    }
}

/// Display-side settings of a run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub queues: QueueSettings,
    /// Upper bound of one multiplexed wait in the display loop
    pub display_poll: Duration,
    /// Timeout handed to [`InputPoller::poll_key`]
    pub key_poll: Duration,
    /// Where `p` saves the last tracked frame
    pub snapshot_dir: PathBuf,
}

/// The four pipeline queues
#[derive(Clone)]
pub struct PipelineQueues {
    pub capture: BoundedClosableQueue<Frame>,
    pub track: BoundedClosableQueue<Frame>,
    pub inpaint: BoundedClosableQueue<InpaintResult>,
    pub display: BoundedClosableQueue<Frame>,
}

impl PipelineQueues {
    pub fn new(settings: &QueueSettings) -> Self {
        debug!(
            capture = %settings.capture,
            track = %settings.track,
            inpaint = %settings.inpaint,
            display = %settings.display,
            "Creating pipeline queues"
        );
        Self {
            capture: BoundedClosableQueue::new(settings.capture),
            track: BoundedClosableQueue::new(settings.track),
            inpaint: BoundedClosableQueue::new(settings.inpaint),
            display: BoundedClosableQueue::new(settings.display),
        }
    }
}

/// Threads left behind by [`Orchestrator::run`]
///
/// Shutdown does not wait for in-flight work. Dropping this detaches every
/// thread; the capture loop and key listener have already been told to exit,
/// the stage workers die with the process.
pub struct PipelineHandles {
    pub capture: CaptureLoop,
    pub track: StageWorker,
    pub inpaint: StageWorker,
    pub keys: KeyListener,
    pub queues: PipelineQueues,
}

/// Owns the renderer and the shared control block for one run
pub struct Orchestrator<R: Renderer> {
    settings: RunSettings,
    renderer: R,
    control: Arc<PipelineControl>,
    state: SystemState,
    last_tracked: Option<Frame>,
    snapshots: Vec<PathBuf>,
}

impl<R: Renderer> Orchestrator<R> {
    pub fn new(settings: RunSettings, renderer: R) -> Self {
        Self {
            settings,
            renderer,
            control: Arc::new(PipelineControl::new()),
            state: SystemState::Init,
            last_tracked: None,
            snapshots: Vec::new(),
        }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn control(&self) -> Arc<PipelineControl> {
        Arc::clone(&self.control)
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Snapshots saved during the run, oldest first
    pub fn snapshots(&self) -> &[PathBuf] {
        &self.snapshots
    }

    fn set_state(&mut self, next: SystemState) -> AppResult<()> {
        self.state = self.state.transition(next)?;
        Ok(())
    }

    /// Run the pipeline until Esc.
    ///
    /// `inpaint` is the stage function of the inpaint worker. Returns the
    /// detached thread handles once the display loop has exited.
    pub fn run<S, O, I>(
        &mut self,
        open_source: O,
        selector: &mut dyn RegionSelector,
        tracker: Box<dyn Tracker>,
        inpaint: I,
        poller: Box<dyn InputPoller>,
    ) -> AppResult<PipelineHandles>
    where
        S: FrameSource + 'static,
        O: FnOnce() -> Result<S, CameraError>,
        I: FnMut(Frame) -> Result<InpaintResult, StageError> + Send + 'static,
    {
        if self.state != SystemState::Init {
            return Err(AppError::InvalidTransition(format!(
                "run called in state {}",
                self.state
            )));
        }

        let (source, tracker) = match self.setup(open_source, selector, tracker) {
            Ok(ready) => ready,
            Err(e) => {
                error!(error = %e, state = %self.state, "Pipeline setup failed");
                self.set_state(SystemState::Terminated)?;
                return Err(e);
            }
        };
        self.set_state(SystemState::Running)?;

        let queues = PipelineQueues::new(&self.settings.queues);
        let keys = BoundedClosableQueue::unbounded();

        let handles = match self.start_threads(source, tracker, inpaint, poller, &queues, &keys) {
            Ok(handles) => handles,
            Err(e) => {
                // Unwind whatever did start: the capture loop and key listener
                // watch the exit flag, the workers end on close
                error!(error = %e, "Failed to start pipeline threads");
                self.control.request_exit();
                queues.capture.close();
                queues.track.close();
                self.set_state(SystemState::Exiting)?;
                return Err(e);
            }
        };

        self.control.start_capture();
        info!("Pipeline running, press Esc to quit");

        let status = [
            ("capture", handles.capture.stats_handle()),
            ("track", handles.track.stats_handle()),
            ("inpaint", handles.inpaint.stats_handle()),
        ];
        self.display_loop(&queues, &keys, &status);

        self.set_state(SystemState::Exiting)?;
        self.control.request_exit();
        info!("Exit requested, leaving worker threads behind");

        Ok(handles)
    }

    /// Spawn both stage workers, the capture loop and the key listener.
    /// Capture stays idle until [`PipelineControl::start_capture`].
    fn start_threads<S, I>(
        &self,
        source: S,
        tracker: Box<dyn Tracker>,
        inpaint: I,
        poller: Box<dyn InputPoller>,
        queues: &PipelineQueues,
        keys: &BoundedClosableQueue<u8>,
    ) -> AppResult<PipelineHandles>
    where
        S: FrameSource + 'static,
        I: FnMut(Frame) -> Result<InpaintResult, StageError> + Send + 'static,
    {
        let mut track_stage = TrackStage::new(tracker, queues.display.clone());
        let track = StageWorker::spawn(
            "track",
            queues.capture.clone(),
            queues.track.clone(),
            move |frame| track_stage.process(frame),
        )?;
        let inpaint = StageWorker::spawn(
            "inpaint",
            queues.track.clone(),
            queues.inpaint.clone(),
            inpaint,
        )?;
        let capture = CaptureLoop::start(
            "camera",
            source,
            queues.capture.clone(),
            Arc::clone(&self.control),
        )?;
        let keys = KeyListener::start(
            poller,
            keys.clone(),
            Arc::clone(&self.control),
            self.settings.key_poll,
        )?;

        Ok(PipelineHandles {
            capture,
            track,
            inpaint,
            keys,
            queues: queues.clone(),
        })
    }

    /// Mark the run as over; called right before the process exits
    pub fn finish(&mut self) -> AppResult<()> {
        self.set_state(SystemState::Terminated)?;
        info!("Terminated");
        Ok(())
    }

    /// Open the source, read the first frame, select the region and
    /// initialize the tracker
    fn setup<S, O>(
        &mut self,
        open_source: O,
        selector: &mut dyn RegionSelector,
        mut tracker: Box<dyn Tracker>,
    ) -> AppResult<(S, Box<dyn Tracker>)>
    where
        S: FrameSource,
        O: FnOnce() -> Result<S, CameraError>,
    {
        let mut source = open_source()?;
        info!(source = %source.describe(), "Frame source opened");

        let first = source.read()?;
        debug!(
            width = first.width(),
            height = first.height(),
            "First frame read"
        );

        self.set_state(SystemState::SelectRegion)?;
        let region = selector.select(&first)?;
        info!(region = %region, "Region selected");

        tracker.init(&first, region)?;
        Ok((source, tracker))
    }

    /// Multiplexed wait on display frames, inpaint results and keys.
    /// Returns when Esc is drawn.
    ///
    /// A failed draw on either pane is logged and skipped. The tracked frame
    /// is kept for snapshots even when it could not be shown.
    fn display_loop(
        &mut self,
        queues: &PipelineQueues,
        keys: &BoundedClosableQueue<u8>,
        stats: &[(&str, Arc<StageStats>)],
    ) {
        let mut last_status = String::new();

        loop {
            {
                let mut select = Select::new();
                select.recv(queues.display.receiver());
                select.recv(queues.inpaint.receiver());
                select.recv(keys.receiver());
                // Readiness only; every queue is checked below either way
                let _ = select.ready_timeout(self.settings.display_poll);
            }

            if let Ok(frame) = queues.display.try_get() {
                if let Err(e) = self.renderer.show(panes::TRACKED, &frame) {
                    debug!(sequence = frame.sequence, error = %e, "Failed to show tracked frame");
                }
                self.last_tracked = Some(frame);
            }

            if let Ok(result) = queues.inpaint.try_get() {
                self.show_inpainted(result);
            }

            let status = status_line(stats);
            if status != last_status {
                self.renderer.set_status(&status);
                last_status = status;
            }

            match keys.try_get() {
                Ok(ESC_KEY) | Err(TryGetError::Closed) => {
                    info!("Escape pressed");
                    return;
                }
                Ok(SNAPSHOT_KEY) => self.save_snapshot(),
                Ok(key) => debug!(key, "Ignoring key"),
                Err(_) => {}
            }
        }
    }

    /// Load and show an inpainted frame. Failures only skip this result;
    /// the file goes away with `result` either way.
    fn show_inpainted(&mut self, result: InpaintResult) {
        match load_result(&result.path) {
            Ok(frame) => {
                if let Err(e) = self.renderer.show(panes::INPAINT, &frame) {
                    debug!(error = %e, "Failed to show inpainted frame");
                }
            }
            Err(e) => debug!(path = %result.path.display(), error = %e, "Skipping inpaint result"),
        }
    }

    fn save_snapshot(&mut self) {
        let Some(frame) = self.last_tracked.as_ref() else {
            self.renderer.set_status("No frame to save yet");
            return;
        };

        match save_frame(frame, &self.settings.snapshot_dir) {
            Ok(path) => {
                info!(path = %path.display(), "Snapshot saved");
                self.renderer
                    .set_status(&format!("Saved {}", path.display()));
                self.snapshots.push(path);
            }
            Err(e) => {
                warn!(error = %e, "Failed to save snapshot");
                self.renderer.set_status(&format!("Snapshot failed: {}", e));
            }
        }
    }
}

fn status_line(stats: &[(&str, Arc<StageStats>)]) -> String {
    let mut parts: Vec<String> = stats
        .iter()
        .map(|(name, s)| format!("{} {}", name, s.snapshot().summary()))
        .collect();
    parts.push("Esc quit, p snapshot".to_string());
    parts.join(" | ")
}

fn load_result(path: &Path) -> AppResult<Frame> {
    let image = image::open(path)?.to_rgb8();
    Ok(Frame::new(image, 0))
}

/// Save `frame` as `trackfill_<timestamp>.png` in `dir`
pub fn save_frame(frame: &Frame, dir: &Path) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::Storage(format!("cannot create {}: {}", dir.display(), e)))?;

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    let path = dir.join(format!(
        "{}_{}.png",
        crate::constants::app_info::APP_NAME,
        stamp
    ));
    frame
        .image
        .save(&path)
        .map_err(|e| AppError::Storage(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(path)
}
