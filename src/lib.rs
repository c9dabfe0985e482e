//! smartcam: live object detection over files, webcams and camera streams.
//!
//! # Architecture
//!
//! One UI thread and one capture worker thread per session:
//!
//! 1. **Selection**: the UI picks a `Source`, a detector profile and a
//!    confidence threshold through `AppController`.
//! 2. **Capture**: `CaptureWorker` opens the source on its own thread, reads
//!    frames, runs the detector and emits annotated frames plus stats.
//! 3. **Handoff**: events travel over an ordered channel tagged with their
//!    `SessionId`; the controller applies those from the live session only.
//!
//! Once `stop` returns, the capture handle is released and no event of the
//! stopped session reaches the display.
//!
//! # Module Structure
//!
//! - `frame`: pixel buffers
//! - `ingest`: sources and capture backends (image, file, V4L2, network)
//! - `detect`: detector trait, profiles, backends, box annotation
//! - `worker`: the capture loop and its event protocol
//! - `controller`: session lifecycle and status display
//! - `config`, `shell`: configuration and the terminal command layer

pub mod config;
pub mod controller;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod session;
pub mod shell;
pub mod stats;
pub mod worker;

pub use config::AppConfig;
pub use controller::{AppController, FrameRenderer, LogNotifier, Notifier, SourceOpener};
pub use detect::{
    Detection, Detector, DetectorLoader, DetectorProfile, Inference, ModelLoader, ProfileCatalog,
};
pub use error::{ModelLoadError, SessionError, SourceOpenError};
pub use frame::{ChannelOrder, Frame};
pub use ingest::{FrameReader, Source, SourceKind};
pub use session::{DetectionConfig, SessionId};
pub use stats::{StatsUpdate, StatusDisplay};
pub use worker::{CaptureWorker, EventSink, FinishReason, WorkerEvent};
