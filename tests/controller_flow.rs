use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use smartcam::detect::StubDetector;
use smartcam::{
    AppController, Detector, DetectorLoader, DetectorProfile, Frame, FrameReader, FrameRenderer,
    ModelLoadError, ModelLoader, Notifier, ProfileCatalog, SessionError, Source,
};

#[derive(Clone, Default)]
struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<(&'static str, String)>>>,
}

impl RecordingNotifier {
    fn alerts(&self) -> Vec<(&'static str, String)> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn warning(&self, title: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push(("warning", format!("{}: {}", title, message)));
    }

    fn error(&self, title: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push(("error", format!("{}: {}", title, message)));
    }
}

/// Fails the first `failures` loads, then hands out stub detectors.
struct FlakyLoader {
    failures: usize,
    calls: Arc<AtomicUsize>,
}

impl DetectorLoader for FlakyLoader {
    fn load(&self, profile: &DetectorProfile) -> Result<Box<dyn Detector>, ModelLoadError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ModelLoadError {
                label: profile.label.clone(),
                resource: profile.resource.clone(),
                error: anyhow!("weights not trained yet"),
            });
        }
        Ok(Box::new(StubDetector::default()))
    }
}

#[derive(Default)]
struct CountingRenderer {
    frames: usize,
}

impl FrameRenderer for CountingRenderer {
    fn render(&mut self, _frame: &Frame) {
        self.frames += 1;
    }
}

struct EndlessReader;

impl FrameReader for EndlessReader {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        std::thread::sleep(Duration::from_millis(5));
        Frame::solid(32, 24, [220, 220, 220]).map(Some)
    }
}

fn catalog() -> ProfileCatalog {
    ProfileCatalog::from_profiles([
        DetectorProfile::new("Card suits", "stub://suits"),
        DetectorProfile::new("Playing cards", "runs/train/model_52_cards/weights/best.onnx"),
    ])
    .expect("catalog")
}

fn controller_with(loader: Box<dyn DetectorLoader>) -> (AppController, RecordingNotifier) {
    let notifier = RecordingNotifier::default();
    let controller =
        AppController::new(catalog(), loader, Box::new(notifier.clone())).expect("controller");
    (controller, notifier)
}

fn pump_until(
    controller: &mut AppController,
    renderer: &mut CountingRenderer,
    done: impl Fn(&AppController, &CountingRenderer) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(&*controller, &*renderer) {
        assert!(Instant::now() < deadline, "condition not reached in time");
        controller.pump_events(Duration::from_millis(20), renderer);
    }
}

#[test]
fn start_without_source_warns_and_spawns_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (mut controller, notifier) = controller_with(Box::new(FlakyLoader {
        failures: 0,
        calls: Arc::clone(&calls),
    }));

    let result = controller.start_session();
    assert!(matches!(result, Err(SessionError::NoSourceSelected)));
    assert_eq!(controller.status().state, "No source selected");
    assert!(!controller.is_running());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, "warning");
}

#[test]
fn stop_when_idle_is_a_no_op() {
    let (mut controller, notifier) = controller_with(Box::new(ModelLoader::default()));
    let before = controller.status().clone();
    controller.stop_session();
    controller.stop_session();
    assert_eq!(controller.status(), &before);
    assert!(notifier.alerts().is_empty());
}

#[test]
fn model_load_failure_stays_idle_then_retry_succeeds() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (mut controller, notifier) = controller_with(Box::new(FlakyLoader {
        failures: 1,
        calls: Arc::clone(&calls),
    }));
    controller.select_source(Source::parse("stub://table?frames=3&width=32&height=24"));

    let result = controller.start_session();
    assert!(matches!(result, Err(SessionError::ModelLoad(_))));
    assert_eq!(controller.status().state, "Model load failed");
    assert!(!controller.is_running());
    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, "error");
    assert!(alerts[0].1.contains("stub://suits"));

    let mut renderer = CountingRenderer::default();
    controller.start_session().expect("retry starts");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(controller.status().state, "Running...");

    pump_until(&mut controller, &mut renderer, |c, _| c.live_session().is_none());
    assert_eq!(renderer.frames, 3);
    assert_eq!(controller.status().state, "End of stream");
    assert_eq!(controller.status().detections, "Detections: 1");
    assert!(controller.status().fps.starts_with("FPS: "));
}

#[test]
fn missing_model_file_is_reported() {
    let (mut controller, notifier) = controller_with(Box::new(ModelLoader::default()));
    controller
        .select_detector_profile("Playing cards")
        .expect("profile exists");
    controller.use_webcam(0);

    let result = controller.start_session();
    match result {
        Err(SessionError::ModelLoad(err)) => assert_eq!(err.label, "Playing cards"),
        other => panic!("expected model load error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(controller.status().state, "Model load failed");
    assert_eq!(notifier.alerts().len(), 1);
}

#[test]
fn stop_resets_stats_and_drops_stale_events() {
    let (controller, _notifier) = controller_with(Box::new(ModelLoader::default()));
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opened);
    let mut controller = controller.with_opener(Arc::new(
        move |_source: &Source| -> Result<Box<dyn FrameReader>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EndlessReader))
        },
    ));
    controller.use_stream("http://192.168.137.111:4747/video");

    let first = controller.start_session().expect("first session");
    let mut renderer = CountingRenderer::default();
    pump_until(&mut controller, &mut renderer, |c, r| {
        r.frames >= 2 && c.status().fps != "FPS: --"
    });

    // Restarting replaces the live session; anything the first one queued
    // must not reach the display.
    let second = controller.start_session().expect("second session");
    assert!(second > first);
    assert_eq!(opened.load(Ordering::SeqCst), 2);
    assert_eq!(controller.status().fps, "FPS: --");
    assert_eq!(controller.live_session(), Some(second));

    controller.stop_session();
    assert_eq!(controller.status().state, "Stopped");
    assert_eq!(controller.status().fps, "FPS: --");
    assert_eq!(controller.status().infer, "Infer: -- ms");
    assert_eq!(controller.status().detections, "Detections: --");

    let frames_before = renderer.frames;
    let applied = controller.pump_events(Duration::from_millis(50), &mut renderer);
    assert_eq!(applied, 0);
    assert_eq!(renderer.frames, frames_before);
    assert_eq!(controller.status().fps, "FPS: --");
}

#[test]
fn toggle_starts_and_stops() {
    let (controller, _notifier) = controller_with(Box::new(ModelLoader::default()));
    let mut controller = controller.with_opener(Arc::new(
        |_source: &Source| -> Result<Box<dyn FrameReader>> { Ok(Box::new(EndlessReader)) },
    ));
    controller.use_webcam(0);

    controller.toggle_session().expect("toggle starts");
    assert!(controller.is_running());
    controller.toggle_session().expect("toggle stops");
    assert!(!controller.is_running());
    assert_eq!(controller.status().state, "Stopped");
}

#[test]
fn selecting_a_source_stops_the_live_session() {
    let released = Arc::new(AtomicBool::new(false));

    struct TrackedReader(Arc<AtomicBool>);
    impl FrameReader for TrackedReader {
        fn read_frame(&mut self) -> Result<Option<Frame>> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(None)
        }
    }
    impl Drop for TrackedReader {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let (controller, _notifier) = controller_with(Box::new(ModelLoader::default()));
    let flag = Arc::clone(&released);
    let mut controller = controller.with_opener(Arc::new(
        move |_source: &Source| -> Result<Box<dyn FrameReader>> {
            Ok(Box::new(TrackedReader(Arc::clone(&flag))))
        },
    ));
    controller.use_webcam(0);
    controller.start_session().expect("session starts");
    assert!(controller.is_running());

    controller.open_file("clips/hand.jpg");
    assert!(!controller.is_running());
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(controller.source().map(Source::is_still), Some(true));
    assert_eq!(controller.status().state, "Stopped");
}

#[test]
fn source_open_failure_is_reported() {
    let (controller, notifier) = controller_with(Box::new(ModelLoader::default()));
    let mut controller = controller.with_opener(Arc::new(
        |_source: &Source| -> Result<Box<dyn FrameReader>> { Err(anyhow!("device busy")) },
    ));
    controller.use_webcam(0);

    let result = controller.start_session();
    assert!(matches!(result, Err(SessionError::SourceOpen(_))));
    assert!(!controller.is_running());
    assert_eq!(controller.status().state, "Source unavailable");
    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].1.contains("device busy"));
}

#[test]
fn still_image_session_finishes_on_its_own() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cards.jpg");
    image::RgbImage::from_pixel(40, 30, image::Rgb([30, 30, 30])).save(&path)?;

    let (mut controller, _notifier) = controller_with(Box::new(ModelLoader::default()));
    controller.open_file(&path);
    controller.start_session()?;

    let mut renderer = CountingRenderer::default();
    pump_until(&mut controller, &mut renderer, |c, _| c.live_session().is_none());
    assert_eq!(renderer.frames, 1);
    assert_eq!(controller.status().state, "Done");
    assert_eq!(controller.status().detections, "Detections: --");
    assert_eq!(controller.status().fps, "FPS: --");
    Ok(())
}

#[test]
fn capture_failure_mid_session_alerts_once() {
    struct BreakingReader {
        frames_left: usize,
    }
    impl FrameReader for BreakingReader {
        fn read_frame(&mut self) -> Result<Option<Frame>> {
            if self.frames_left == 0 {
                return Err(anyhow!("disk gone"));
            }
            self.frames_left -= 1;
            Frame::solid(32, 24, [90, 90, 90]).map(Some)
        }
    }

    let (controller, notifier) = controller_with(Box::new(ModelLoader::default()));
    let mut controller = controller.with_opener(Arc::new(
        |_source: &Source| -> Result<Box<dyn FrameReader>> {
            Ok(Box::new(BreakingReader { frames_left: 1 }))
        },
    ));
    controller.select_source(Source::Video("table.mp4".into()));
    controller.start_session().expect("session starts");

    let mut renderer = CountingRenderer::default();
    pump_until(&mut controller, &mut renderer, |c, _| c.live_session().is_none());
    assert_eq!(renderer.frames, 1);
    assert!(!controller.is_running());
    assert_eq!(controller.status().state, "Source unavailable");

    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, "error");
    assert!(alerts[0].1.starts_with("Capture failed"));
    assert!(alerts[0].1.contains("disk gone"));
}
