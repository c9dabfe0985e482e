//! UI-thread side of the capture protocol.
//!
//! `AppController` owns every selection the user makes (source, detector
//! profile, confidence), starts and stops the capture worker, and applies the
//! worker's events to the status display. It is driven from a single thread;
//! only the confidence value is shared with the worker.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::config::AppConfig;
use crate::detect::{DetectorLoader, DetectorProfile, ProfileCatalog};
use crate::error::SessionError;
use crate::frame::Frame;
use crate::ingest::{self, FrameReader, Source};
use crate::session::{DetectionConfig, SessionId};
use crate::stats::StatusDisplay;
use crate::worker::{CaptureWorker, EventSink, FinishReason, WorkerEvent};

pub const NO_SOURCE_STATE: &str = "No source selected";
pub const MODEL_FAILED_STATE: &str = "Model load failed";
pub const SOURCE_FAILED_STATE: &str = "Source unavailable";
pub const RUNNING_STATE: &str = "Running...";
pub const STOPPING_STATE: &str = "Stopping...";
pub const STOPPED_STATE: &str = "Stopped";

/// Opens capture handles for the worker. Called on the worker thread.
pub type SourceOpener = Arc<dyn Fn(&Source) -> Result<Box<dyn FrameReader>> + Send + Sync>;

/// User-facing alerts. A GUI shows these as message boxes.
pub trait Notifier {
    fn warning(&self, title: &str, message: &str);
    fn error(&self, title: &str, message: &str);
}

/// Notifier that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warning(&self, title: &str, message: &str) {
        log::warn!("{}: {}", title, message);
    }

    fn error(&self, title: &str, message: &str) {
        log::error!("{}: {}", title, message);
    }
}

/// Receives annotated frames for display.
pub trait FrameRenderer {
    fn render(&mut self, frame: &Frame);
}

pub struct AppController {
    catalog: ProfileCatalog,
    profile: usize,
    source: Option<Source>,
    config: DetectionConfig,
    loader: Box<dyn DetectorLoader>,
    notifier: Box<dyn Notifier>,
    opener: SourceOpener,
    worker: Option<CaptureWorker>,
    sink: EventSink,
    events: Receiver<WorkerEvent>,
    next_session: u64,
    status: StatusDisplay,
}

impl AppController {
    pub fn new(
        catalog: ProfileCatalog,
        loader: Box<dyn DetectorLoader>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self> {
        if catalog.is_empty() {
            return Err(anyhow!("controller needs at least one detector profile"));
        }
        let (sink, events) = EventSink::channel();
        Ok(Self {
            catalog,
            profile: 0,
            source: None,
            config: DetectionConfig::default(),
            loader,
            notifier,
            opener: Arc::new(ingest::open),
            worker: None,
            sink,
            events,
            next_session: 1,
            status: StatusDisplay::default(),
        })
    }

    pub fn from_config(
        config: &AppConfig,
        loader: Box<dyn DetectorLoader>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self> {
        let controller = Self::new(config.catalog()?, loader, notifier)?;
        controller.config.set_position(config.confidence);
        Ok(controller)
    }

    /// Replace the capture backend used by subsequent sessions.
    pub fn with_opener(mut self, opener: SourceOpener) -> Self {
        self.opener = opener;
        self
    }

    // --- selection ---

    /// Select what to capture from. Stops any active session first.
    pub fn select_source(&mut self, source: Source) {
        self.stop_session();
        log::info!("source selected: {}", source);
        self.source = Some(source);
    }

    /// Select a local image or video file.
    pub fn open_file(&mut self, path: impl Into<std::path::PathBuf>) {
        self.select_source(Source::from_path(path));
    }

    pub fn use_webcam(&mut self, index: u32) {
        self.select_source(Source::Device(index));
    }

    pub fn use_stream(&mut self, url: impl Into<String>) {
        self.select_source(Source::Stream(url.into()));
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Status bar source label, `Source: <label>`.
    pub fn source_label(&self) -> String {
        format!("Source: {}", self.source_text())
    }

    /// Choose the detector profile for the next start. Does not load it.
    pub fn select_detector_profile(&mut self, label: &str) -> Result<(), SessionError> {
        let index = self
            .catalog
            .position(label)
            .ok_or_else(|| SessionError::UnknownProfile(label.to_string()))?;
        self.profile = index;
        log::info!("detector profile selected: {}", label);
        Ok(())
    }

    pub fn selected_profile(&self) -> Option<&DetectorProfile> {
        self.catalog.at(self.profile)
    }

    pub fn profile_labels(&self) -> Vec<&str> {
        self.catalog.labels()
    }

    /// Move the confidence slider. Takes effect on the next processed frame
    /// of a running session. Returns the clamped position.
    pub fn set_confidence(&mut self, position: u32) -> u32 {
        let stored = self.config.set_position(position);
        log::debug!("confidence set to {}", self.config.label());
        stored
    }

    pub fn confidence_label(&self) -> String {
        self.config.label()
    }

    pub fn detection_config(&self) -> &DetectionConfig {
        &self.config
    }

    // --- session lifecycle ---

    /// Load the selected detector and start capturing from the selected
    /// source, replacing any live session.
    ///
    /// Every failure is also reported through the notifier and reflected in
    /// the state label.
    pub fn start_session(&mut self) -> Result<SessionId, SessionError> {
        let Some(source) = self.source.clone() else {
            self.notifier.warning(
                NO_SOURCE_STATE,
                "Select a webcam, a network stream or a media file first.",
            );
            self.status.set_state(NO_SOURCE_STATE);
            return Err(SessionError::NoSourceSelected);
        };

        self.stop_session();

        let profile = self
            .catalog
            .at(self.profile)
            .cloned()
            .ok_or_else(|| SessionError::UnknownProfile(format!("#{}", self.profile)))?;

        self.status.set_state(format!("Loading: {}...", profile.label));
        let detector = match self.loader.load(&profile) {
            Ok(detector) => detector,
            Err(err) => {
                self.notifier.error(
                    "Model load failed",
                    &format!(
                        "Could not load model.\n\nPath: {}\nError: {:#}",
                        err.resource, err.error
                    ),
                );
                self.status.set_state(MODEL_FAILED_STATE);
                return Err(err.into());
            }
        };

        let session = SessionId(self.next_session);
        self.next_session += 1;

        let opener = Arc::clone(&self.opener);
        let target = source.clone();
        let started = CaptureWorker::start_with(
            session,
            &source,
            move || opener(&target),
            detector,
            self.config.clone(),
            self.sink.clone(),
        );
        let worker = match started {
            Ok(worker) => worker,
            Err(err) => {
                self.notifier.error("Cannot open source", &err.to_string());
                self.status.set_state(SOURCE_FAILED_STATE);
                return Err(err);
            }
        };

        log::info!(
            "{} started: {} with '{}'",
            session,
            source.label(),
            profile.label
        );
        self.worker = Some(worker);
        self.status.reset_stats();
        self.status.set_state(RUNNING_STATE);
        Ok(session)
    }

    /// Stop the live session and reset the stats to their idle labels.
    /// No-op when nothing is running.
    pub fn stop_session(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        self.status.set_state(STOPPING_STATE);
        worker.stop();
        log::info!("{} stopped", worker.session());
        self.status.reset_stats();
        self.status.set_state(STOPPED_STATE);
    }

    /// Stop when running, start otherwise.
    pub fn toggle_session(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            self.stop_session();
            Ok(())
        } else {
            self.start_session().map(|_| ())
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(CaptureWorker::is_running)
    }

    pub fn live_session(&self) -> Option<SessionId> {
        self.worker.as_ref().map(CaptureWorker::session)
    }

    // --- event handoff ---

    /// Apply queued worker events, waiting up to `timeout` for the first.
    ///
    /// Events from any session other than the live one are discarded.
    /// Returns the number of events applied.
    pub fn pump_events(&mut self, timeout: Duration, renderer: &mut dyn FrameRenderer) -> usize {
        let mut applied = 0;
        let mut next = match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        };
        while let Some(event) = next {
            if self.apply(event, renderer) {
                applied += 1;
            }
            next = match self.events.try_recv() {
                Ok(event) => Some(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
            };
        }
        applied
    }

    fn apply(&mut self, event: WorkerEvent, renderer: &mut dyn FrameRenderer) -> bool {
        if self.live_session() != Some(event.session()) {
            log::trace!("dropping event from stale {}", event.session());
            return false;
        }
        match event {
            WorkerEvent::Frame { frame, .. } => renderer.render(&frame),
            WorkerEvent::Stats { stats, .. } => self.status.apply(&stats),
            WorkerEvent::Finished { reason, .. } => self.finish(reason),
        }
        true
    }

    fn finish(&mut self, reason: FinishReason) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        match reason {
            FinishReason::StillImageDone => self.status.set_state("Done"),
            FinishReason::EndOfStream => self.status.set_state("End of stream"),
            FinishReason::SourceFailed(message) => {
                self.notifier.error("Capture failed", &message);
                self.status.set_state(SOURCE_FAILED_STATE);
            }
        }
    }

    // --- display ---

    pub fn status(&self) -> &StatusDisplay {
        &self.status
    }

    /// Placeholder shown in the preview area while nothing is running.
    pub fn preview_text(&self) -> String {
        format!(
            "SMARTCAM - live object detection\n\n\
             Source: {}\n\
             State: STOPPED\n\
             Confidence: {}\n\n\
             (Select a source and a model, then press Start)",
            self.source_text(),
            self.confidence_label()
        )
    }

    fn source_text(&self) -> String {
        self.source
            .as_ref()
            .map(Source::label)
            .unwrap_or_else(|| "(none)".to_string())
    }
}

impl Drop for AppController {
    fn drop(&mut self) {
        self.stop_session();
    }
}
