//! Capture worker: one background thread per session.
//!
//! The worker thread opens the capture handle, reads frames at the source's
//! own pace, runs the detector with the confidence value current at that
//! iteration, and publishes results through an `EventSink`. The handle and
//! the detector live on the worker thread only.
//!
//! Stop is cooperative. `CaptureWorker::stop` raises a flag that the loop
//! checks once per iteration and before every emission, then joins the thread,
//! so the capture handle has been dropped by the time `stop` returns.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::anyhow;

use crate::detect::Detector;
use crate::error::{SessionError, SourceOpenError};
use crate::frame::Frame;
use crate::ingest::{self, FrameReader, Source, SourceKind};
use crate::session::{DetectionConfig, SessionId};
use crate::stats::StatsUpdate;

const BACKOFF_START: Duration = Duration::from_millis(5);
const BACKOFF_CAP: Duration = Duration::from_millis(200);

/// Why a session ended without `stop()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinishReason {
    /// The single frame of a still image was processed.
    StillImageDone,
    /// A file-backed source ran out of frames.
    EndOfStream,
    /// The source failed hard, or the worker panicked.
    SourceFailed(String),
}

/// Events from the worker to the UI thread, in production order.
#[derive(Debug)]
pub enum WorkerEvent {
    Frame {
        session: SessionId,
        frame: Frame,
    },
    Stats {
        session: SessionId,
        stats: StatsUpdate,
    },
    Finished {
        session: SessionId,
        reason: FinishReason,
    },
}

impl WorkerEvent {
    pub fn session(&self) -> SessionId {
        match self {
            WorkerEvent::Frame { session, .. }
            | WorkerEvent::Stats { session, .. }
            | WorkerEvent::Finished { session, .. } => *session,
        }
    }
}

/// Ordered delivery channel from worker to UI.
///
/// Unbounded on purpose: a worker blocked on a full queue could never observe
/// a stop request while the UI thread is joining it.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: Sender<WorkerEvent>,
}

impl EventSink {
    pub fn channel() -> (EventSink, Receiver<WorkerEvent>) {
        let (tx, rx) = mpsc::channel();
        (EventSink { tx }, rx)
    }

    /// False when the receiving side is gone.
    pub fn send(&self, event: WorkerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Handle to a running (or finished) capture worker thread.
pub struct CaptureWorker {
    session: SessionId,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Start a session on `source` using the built-in capture backends.
    pub fn start(
        session: SessionId,
        source: &Source,
        detector: Box<dyn Detector>,
        config: DetectionConfig,
        sink: EventSink,
    ) -> Result<Self, SessionError> {
        let target = source.clone();
        Self::start_with(
            session,
            source,
            move || ingest::open(&target),
            detector,
            config,
            sink,
        )
    }

    /// Start a session whose capture handle is produced by `opener`.
    ///
    /// `opener` runs on the worker thread. Its result is reported back before
    /// this returns, so an unopenable source fails here and no session starts.
    pub fn start_with<F>(
        session: SessionId,
        source: &Source,
        opener: F,
        detector: Box<dyn Detector>,
        config: DetectionConfig,
        sink: EventSink,
    ) -> Result<Self, SessionError>
    where
        F: FnOnce() -> anyhow::Result<Box<dyn FrameReader>> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<anyhow::Result<()>>(1);

        let kind = source.kind();
        let label = source.label();
        let thread = {
            let stop = Arc::clone(&stop);
            let running = Arc::clone(&running);
            let label = label.clone();
            thread::Builder::new()
                .name(format!("capture-{}", session.0))
                .spawn(move || {
                    let reader = match opener() {
                        Ok(reader) => {
                            let _ = ready_tx.send(Ok(()));
                            reader
                        }
                        Err(err) => {
                            running.store(false, Ordering::SeqCst);
                            let _ = ready_tx.send(Err(err));
                            return;
                        }
                    };
                    log::info!("{}: capture started on {}", session, label);

                    let capture = CaptureLoop {
                        session,
                        kind,
                        reader,
                        detector,
                        config,
                        sink: sink.clone(),
                        stop: Arc::clone(&stop),
                    };
                    // `run` consumes the loop, so the reader is dropped before
                    // `running` clears.
                    let outcome = panic::catch_unwind(AssertUnwindSafe(move || capture.run()));
                    let reason = match outcome {
                        Ok(reason) => reason,
                        Err(_) => {
                            log::error!("{}: capture worker panicked", session);
                            Some(FinishReason::SourceFailed(
                                "capture worker panicked".to_string(),
                            ))
                        }
                    };
                    running.store(false, Ordering::SeqCst);

                    match reason {
                        Some(reason) if !stop.load(Ordering::SeqCst) => {
                            log::info!("{}: capture finished ({:?})", session, reason);
                            sink.send(WorkerEvent::Finished { session, reason });
                        }
                        _ => log::info!("{}: capture stopped", session),
                    }
                })
                .map_err(SessionError::WorkerSpawn)?
        };

        let opened = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(anyhow!("capture worker exited before opening the source")));
        if let Err(error) = opened {
            let _ = thread.join();
            return Err(SourceOpenError {
                source_label: label,
                error,
            }
            .into());
        }

        Ok(Self {
            session,
            stop,
            running,
            thread: Some(thread),
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// True until the worker loop has ended and released its capture handle.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request termination and wait for the worker thread to exit.
    ///
    /// May take up to one read+infer cycle. Calling it again is a no-op.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("{}: capture thread panicked during shutdown", self.session);
            }
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Step {
    Emitted,
    Skipped,
    Halted,
}

struct CaptureLoop {
    session: SessionId,
    kind: SourceKind,
    reader: Box<dyn FrameReader>,
    detector: Box<dyn Detector>,
    config: DetectionConfig,
    sink: EventSink,
    stop: Arc<AtomicBool>,
}

impl CaptureLoop {
    /// `None` when stopped, otherwise why the session ended on its own.
    fn run(mut self) -> Option<FinishReason> {
        match self.kind {
            SourceKind::Still => self.run_still(),
            SourceKind::File | SourceKind::Live => self.run_stream(),
        }
    }

    fn run_still(&mut self) -> Option<FinishReason> {
        match self.reader.read_frame() {
            Ok(Some(frame)) => match self.process(frame, false) {
                Step::Halted => None,
                Step::Emitted | Step::Skipped => Some(FinishReason::StillImageDone),
            },
            Ok(None) => Some(FinishReason::SourceFailed(
                "image source produced no frame".to_string(),
            )),
            Err(err) => Some(FinishReason::SourceFailed(format!("{:#}", err))),
        }
    }

    fn run_stream(&mut self) -> Option<FinishReason> {
        let live = self.kind == SourceKind::Live;
        let mut backoff = Backoff::new();

        while !self.stopped() {
            let started = Instant::now();
            let frame = match self.reader.read_frame() {
                Ok(Some(frame)) => {
                    backoff.reset();
                    frame
                }
                Ok(None) if live => {
                    log::trace!("{}: no frame available, retrying", self.session);
                    backoff.wait();
                    continue;
                }
                Ok(None) => return Some(FinishReason::EndOfStream),
                Err(err) if live => {
                    log::debug!("{}: transient read failure: {:#}", self.session, err);
                    backoff.wait();
                    continue;
                }
                Err(err) => return Some(FinishReason::SourceFailed(format!("{:#}", err))),
            };

            match self.process(frame, true) {
                Step::Emitted => {}
                Step::Skipped => continue,
                Step::Halted => return None,
            }

            if !self.emit(WorkerEvent::Stats {
                session: self.session,
                stats: StatsUpdate::timing(started.elapsed()),
            }) {
                return None;
            }
        }
        None
    }

    /// Detect on one frame and emit its results.
    fn process(&mut self, frame: Frame, report_count: bool) -> Step {
        let confidence = self.config.confidence();
        let inference = match self.detector.infer(&frame, confidence) {
            Ok(inference) => inference,
            Err(err) => {
                log::warn!("{}: inference failed, dropping frame: {:#}", self.session, err);
                return Step::Skipped;
            }
        };

        let count = inference.detections.len();
        if !self.emit(WorkerEvent::Frame {
            session: self.session,
            frame: inference.annotated,
        }) {
            return Step::Halted;
        }
        if report_count
            && !self.emit(WorkerEvent::Stats {
                session: self.session,
                stats: StatsUpdate::detections(count),
            })
        {
            return Step::Halted;
        }
        Step::Emitted
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Send unless a stop was requested; false means the loop must end.
    fn emit(&self, event: WorkerEvent) -> bool {
        !self.stopped() && self.sink.send(event)
    }
}

/// Exponential sleep between empty reads on a live source, capped so a stop
/// request is still seen promptly.
struct Backoff {
    next: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            next: BACKOFF_START,
        }
    }

    fn wait(&mut self) {
        thread::sleep(self.next);
        self.advance();
    }

    fn advance(&mut self) {
        self.next = (self.next * 2).min(BACKOFF_CAP);
    }

    fn reset(&mut self) {
        self.next = BACKOFF_START;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new();
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(backoff.next);
            backoff.advance();
        }
        assert_eq!(seen[0], Duration::from_millis(5));
        assert_eq!(seen[1], Duration::from_millis(10));
        assert_eq!(*seen.last().unwrap(), BACKOFF_CAP);
        backoff.reset();
        assert_eq!(backoff.next, BACKOFF_START);
    }

    #[test]
    fn event_session_accessor() {
        let event = WorkerEvent::Finished {
            session: SessionId(7),
            reason: FinishReason::EndOfStream,
        };
        assert_eq!(event.session(), SessionId(7));
    }
}
