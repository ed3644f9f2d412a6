// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end pipeline tests with a synthetic source and scripted input

use image::Rgb;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use trackfill::backends::selector::FixedSelector;
use trackfill::backends::synthetic::SyntheticSource;
use trackfill::backends::{Frame, InpaintResult, InputPoller, RegionSelector, Renderer};
use trackfill::config::QueueSettings;
use trackfill::constants::{ESC_KEY, MASK_COLOR, SNAPSHOT_KEY, panes};
use trackfill::errors::{AppError, AppResult, CameraError, StageError};
use trackfill::pipeline::{
    BoundedClosableQueue, Orchestrator, PipelineHandles, RunSettings, StageWorker, SystemState,
};
use trackfill::stages::TrackerKind;
use trackfill::Region;

const DEADLINE: Duration = Duration::from_secs(10);

#[derive(Clone, Default)]
struct Shown {
    tracked: Arc<AtomicU64>,
    inpainted: Arc<AtomicU64>,
}

struct CountingRenderer(Shown);

impl Renderer for CountingRenderer {
    fn show(&mut self, label: &str, _frame: &Frame) -> AppResult<()> {
        match label {
            panes::TRACKED => self.0.tracked.fetch_add(1, Ordering::SeqCst),
            panes::INPAINT => self.0.inpainted.fetch_add(1, Ordering::SeqCst),
            other => panic!("unexpected pane {}", other),
        };
        Ok(())
    }
}

enum Step {
    WaitTracked(u64),
    WaitInpainted(u64),
    Until(Box<dyn Fn() -> bool + Send>),
    Key(u8),
}

/// Emits keys once the renderer has shown enough frames
struct ScriptedPoller {
    steps: VecDeque<Step>,
    shown: Shown,
    started: Instant,
}

impl ScriptedPoller {
    fn new(steps: Vec<Step>, shown: Shown) -> Self {
        Self {
            steps: steps.into(),
            shown,
            started: Instant::now(),
        }
    }
}

impl InputPoller for ScriptedPoller {
    fn poll_key(&mut self, timeout: Duration) -> AppResult<Option<u8>> {
        if self.started.elapsed() > DEADLINE {
            return Ok(Some(ESC_KEY));
        }
        let ready = match self.steps.front() {
            None => false,
            Some(Step::Key(key)) => {
                let key = *key;
                self.steps.pop_front();
                return Ok(Some(key));
            }
            Some(Step::WaitTracked(n)) => self.shown.tracked.load(Ordering::SeqCst) >= *n,
            Some(Step::WaitInpainted(n)) => self.shown.inpainted.load(Ordering::SeqCst) >= *n,
            Some(Step::Until(cond)) => cond(),
        };
        if ready {
            self.steps.pop_front();
        } else {
            thread::sleep(timeout);
        }
        Ok(None)
    }
}

fn settings(snapshot_dir: &std::path::Path) -> RunSettings {
    RunSettings {
        queues: QueueSettings::default(),
        display_poll: Duration::from_millis(5),
        key_poll: Duration::from_millis(2),
        snapshot_dir: snapshot_dir.to_path_buf(),
    }
}

fn synthetic() -> Result<SyntheticSource, CameraError> {
    SyntheticSource::new(160, 120, 100)
}

#[test]
fn test_escape_stops_running_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("inpaint");
    std::fs::create_dir_all(&out_dir).unwrap();

    let shown = Shown::default();
    let poller = ScriptedPoller::new(
        vec![
            Step::WaitTracked(3),
            Step::Key(SNAPSHOT_KEY),
            Step::WaitInpainted(2),
            Step::Key(b'x'),
            Step::Key(ESC_KEY),
        ],
        shown.clone(),
    );

    let masked = Arc::new(AtomicBool::new(false));
    let masked_clone = Arc::clone(&masked);
    let inpaint = move |frame: Frame| -> Result<InpaintResult, StageError> {
        if frame.image.get_pixel(15, 15) == &Rgb(MASK_COLOR) {
            masked_clone.store(true, Ordering::SeqCst);
        }
        let path = out_dir.join(format!("{}.png", frame.sequence));
        frame.image.save(&path)?;
        Ok(InpaintResult { path })
    };

    let mut orchestrator = Orchestrator::new(settings(dir.path()), CountingRenderer(shown.clone()));
    let control = orchestrator.control();
    let mut selector = FixedSelector::new(Region::new(10, 10, 20, 20));

    let handles = orchestrator
        .run(
            synthetic,
            &mut selector,
            TrackerKind::Fixed.build(0, 0.0),
            inpaint,
            Box::new(poller),
        )
        .unwrap();

    assert_eq!(orchestrator.state(), SystemState::Exiting);
    assert!(control.is_exiting());
    assert!(!control.is_capturing());
    assert!(shown.tracked.load(Ordering::SeqCst) >= 3);
    assert!(shown.inpainted.load(Ordering::SeqCst) >= 2);
    assert!(masked.load(Ordering::SeqCst), "inpaint input must carry the mask");
    assert_eq!(orchestrator.snapshots().len(), 1);
    assert!(orchestrator.snapshots()[0].exists());

    // The capture loop and key listener return after the exit request
    let reads = handles.capture.stats_handle();
    handles.capture.join();
    handles.keys.join();
    let after_join = reads.snapshot().processed;
    thread::sleep(Duration::from_millis(30));
    assert_eq!(reads.snapshot().processed, after_join);

    orchestrator.finish().unwrap();
    assert_eq!(orchestrator.state(), SystemState::Terminated);
}

/// Fails every draw of the tracked pane
struct BrokenTrackedPane(Shown);

impl Renderer for BrokenTrackedPane {
    fn show(&mut self, label: &str, _frame: &Frame) -> AppResult<()> {
        if label == panes::TRACKED {
            self.0.tracked.fetch_add(1, Ordering::SeqCst);
            return Err(AppError::Terminal("write failed".into()));
        }
        self.0.inpainted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_render_failure_does_not_stop_display_loop() {
    let dir = tempfile::tempdir().unwrap();
    let shown = Shown::default();
    let poller = ScriptedPoller::new(
        vec![
            Step::WaitTracked(5),
            Step::Key(SNAPSHOT_KEY),
            Step::Key(ESC_KEY),
        ],
        shown.clone(),
    );

    let mut orchestrator = Orchestrator::new(settings(dir.path()), BrokenTrackedPane(shown.clone()));
    let mut selector = FixedSelector::new(Region::new(10, 10, 20, 20));
    let result = orchestrator.run(
        synthetic,
        &mut selector,
        TrackerKind::Fixed.build(0, 0.0),
        |_frame: Frame| -> Result<InpaintResult, StageError> {
            Err(StageError::Inpaint("unused".into()))
        },
        Box::new(poller),
    );

    assert!(result.is_ok());
    assert_eq!(orchestrator.state(), SystemState::Exiting);
    assert!(shown.tracked.load(Ordering::SeqCst) >= 5);
    // Frames that could not be drawn can still be saved
    assert_eq!(orchestrator.snapshots().len(), 1);
}

#[test]
fn test_unreadable_inpaint_results_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();

    let shown = Shown::default();
    let calls = Arc::new(AtomicU64::new(0));
    let tracked_at_third = Arc::new(AtomicU64::new(u64::MAX));

    // Alternate between a file that is not an image and no file at all
    let inpaint = {
        let work = work.clone();
        let calls = Arc::clone(&calls);
        let tracked_at_third = Arc::clone(&tracked_at_third);
        let tracked = Arc::clone(&shown.tracked);
        move |_frame: Frame| -> Result<InpaintResult, StageError> {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            let path = work.join(format!("{}_out.png", n));
            if n % 2 == 1 {
                std::fs::write(&path, b"not an image")?;
            }
            if n == 3 {
                tracked_at_third.store(tracked.load(Ordering::SeqCst), Ordering::SeqCst);
            }
            Ok(InpaintResult { path })
        }
    };

    // Tracked frames must keep coming after several bad results
    let keeps_tracking = {
        let tracked = Arc::clone(&shown.tracked);
        let tracked_at_third = Arc::clone(&tracked_at_third);
        move || {
            let mark = tracked_at_third.load(Ordering::SeqCst);
            mark != u64::MAX && tracked.load(Ordering::SeqCst) >= mark + 5
        }
    };
    let poller = ScriptedPoller::new(
        vec![Step::Until(Box::new(keeps_tracking)), Step::Key(ESC_KEY)],
        shown.clone(),
    );

    let mut orchestrator = Orchestrator::new(settings(dir.path()), CountingRenderer(shown.clone()));
    let mut selector = FixedSelector::new(Region::new(10, 10, 20, 20));
    let handles = orchestrator
        .run(
            synthetic,
            &mut selector,
            TrackerKind::Fixed.build(0, 0.0),
            inpaint,
            Box::new(poller),
        )
        .unwrap();

    assert_eq!(orchestrator.state(), SystemState::Exiting);
    assert!(calls.load(Ordering::SeqCst) >= 3);
    let mark = tracked_at_third.load(Ordering::SeqCst);
    assert_ne!(mark, u64::MAX);
    assert!(shown.tracked.load(Ordering::SeqCst) >= mark + 5);
    assert_eq!(shown.inpainted.load(Ordering::SeqCst), 0);

    // Stop the inpaint worker, then let every outstanding result go
    let PipelineHandles { inpaint, queues, .. } = handles;
    queues.track.close();
    inpaint.join();
    drop(queues);
    assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
}

#[test]
fn test_source_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let shown = Shown::default();
    let mut orchestrator = Orchestrator::new(settings(dir.path()), CountingRenderer(shown.clone()));
    let mut selector = FixedSelector::new(Region::new(0, 0, 4, 4));

    let result = orchestrator.run(
        || -> Result<SyntheticSource, CameraError> {
            Err(CameraError::OpenFailed("no such device".into()))
        },
        &mut selector,
        TrackerKind::Fixed.build(0, 0.0),
        |_frame: Frame| -> Result<InpaintResult, StageError> {
            Err(StageError::Inpaint("unused".into()))
        },
        Box::new(ScriptedPoller::new(vec![], shown)),
    );

    assert!(matches!(result, Err(AppError::Camera(CameraError::OpenFailed(_)))));
    assert_eq!(orchestrator.state(), SystemState::Terminated);
    assert!(!orchestrator.control().is_capturing());
}

struct CancellingSelector;

impl RegionSelector for CancellingSelector {
    fn select(&mut self, _frame: &Frame) -> AppResult<Region> {
        Err(AppError::Cancelled)
    }
}

#[test]
fn test_cancelled_selection_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let shown = Shown::default();
    let mut orchestrator = Orchestrator::new(settings(dir.path()), CountingRenderer(shown.clone()));

    let result = orchestrator.run(
        synthetic,
        &mut CancellingSelector,
        TrackerKind::Template.build(8, 20.0),
        |_frame: Frame| -> Result<InpaintResult, StageError> {
            Err(StageError::Inpaint("unused".into()))
        },
        Box::new(ScriptedPoller::new(vec![], shown)),
    );

    assert!(matches!(result, Err(AppError::Cancelled)));
    assert_eq!(orchestrator.state(), SystemState::Terminated);
}

#[test]
fn test_tracker_init_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let shown = Shown::default();
    let mut orchestrator = Orchestrator::new(settings(dir.path()), CountingRenderer(shown.clone()));
    // Outside the 160x120 frame; the fixed selector does not clamp it away
    let mut selector = Unclamped(Region::new(500, 500, 10, 10));

    let result = orchestrator.run(
        synthetic,
        &mut selector,
        TrackerKind::Template.build(8, 20.0),
        |_frame: Frame| -> Result<InpaintResult, StageError> {
            Err(StageError::Inpaint("unused".into()))
        },
        Box::new(ScriptedPoller::new(vec![], shown)),
    );

    assert!(matches!(result, Err(AppError::Stage(StageError::Tracking(_)))));
}

struct Unclamped(Region);

impl RegionSelector for Unclamped {
    fn select(&mut self, _frame: &Frame) -> AppResult<Region> {
        Ok(self.0)
    }
}

#[test]
fn test_identity_worker_relays_then_ends() {
    let input = BoundedClosableQueue::unbounded();
    let output = BoundedClosableQueue::unbounded();
    let worker = StageWorker::spawn("identity", input.clone(), output.clone(), |s: &str| Ok(s))
        .unwrap();

    for s in ["A", "B", "C"] {
        input.put(s);
    }
    input.close();
    worker.join();

    output.close();
    assert_eq!(output.iter().collect::<Vec<_>>(), vec!["A", "B", "C"]);
}

#[test]
fn test_always_failing_worker_waits_for_close() {
    let input = BoundedClosableQueue::unbounded();
    let output: BoundedClosableQueue<u32> = BoundedClosableQueue::unbounded();
    let worker = StageWorker::spawn("broken", input.clone(), output.clone(), |x: u32| {
        Err(StageError::Tracking(format!("lost {}", x)))
    })
    .unwrap();

    for x in 0..4 {
        input.put(x);
    }
    let stats = worker.stats_handle();
    let deadline = Instant::now() + DEADLINE;
    while stats.snapshot().failed < 4 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(2));
    }

    assert!(worker.is_running(), "worker must outlive failures");
    assert!(output.is_empty());

    input.close();
    worker.join();
    assert!(output.is_empty());
}

#[test]
fn test_failing_items_do_not_stop_worker() {
    let input = BoundedClosableQueue::unbounded();
    let output = BoundedClosableQueue::unbounded();
    let worker = StageWorker::spawn("flaky", input.clone(), output.clone(), |x: u32| {
        if x % 3 == 0 {
            Err(StageError::Inpaint(format!("item {}", x)))
        } else {
            Ok(x * 10)
        }
    })
    .unwrap();

    for x in 1..=7 {
        input.put(x);
    }
    input.close();
    let stats = worker.stats_handle();
    worker.join();
    output.close();

    assert_eq!(output.iter().collect::<Vec<_>>(), vec![10, 20, 40, 50, 70]);
    assert_eq!(stats.snapshot().failed, 2);
}

#[test]
fn test_full_downstream_drops_results() {
    let input = BoundedClosableQueue::bounded(1);
    let output = BoundedClosableQueue::bounded(1);
    let worker = StageWorker::spawn("relay", input.clone(), output.clone(), |x: u32| Ok(x))
        .unwrap();

    for x in 0..5 {
        input.put(x);
    }
    input.close();
    let stats = worker.stats_handle();
    worker.join();

    // Nobody consumed, so only the first result fit
    assert_eq!(output.len(), 1);
    assert_eq!(output.try_get(), Ok(0));
    let snap = stats.snapshot();
    assert_eq!((snap.processed, snap.dropped), (5, 4));
}
