use anyhow::Result;

use crate::detect::result::Inference;
use crate::frame::Frame;

/// Loaded object detector.
///
/// A detector is created on the UI thread by a `DetectorLoader` and then
/// moved into the capture worker, which is its only user for the rest of the
/// session. `infer` may block for as long as the model needs.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &str;

    /// Run detection on a frame, keeping detections scoring at least
    /// `confidence`, and render them onto a copy of the frame.
    ///
    /// An error applies to this frame only; the worker logs it and moves on.
    fn infer(&mut self, frame: &Frame, confidence: f32) -> Result<Inference>;

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
