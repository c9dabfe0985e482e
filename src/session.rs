//! Session identity and the live detection config.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Lowest confidence slider position (0.05).
pub const MIN_CONFIDENCE_POSITION: u32 = 5;
/// Highest confidence slider position (0.90).
pub const MAX_CONFIDENCE_POSITION: u32 = 90;
pub const DEFAULT_CONFIDENCE_POSITION: u32 = 25;

/// Identifies one capture session. Ids increase monotonically per controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Confidence threshold shared between the UI and the capture worker.
///
/// Stored as the integer slider position so `p / 100` is exact for display.
/// The UI writes, the worker reads once per iteration; a single atomic is all
/// the synchronisation this needs.
#[derive(Clone, Debug)]
pub struct DetectionConfig {
    position: Arc<AtomicU32>,
}

impl DetectionConfig {
    pub fn new(position: u32) -> Self {
        Self {
            position: Arc::new(AtomicU32::new(clamp_position(position))),
        }
    }

    /// Set the slider position, clamped to 5..=90. Returns the stored position.
    pub fn set_position(&self, position: u32) -> u32 {
        let clamped = clamp_position(position);
        self.position.store(clamped, Ordering::Relaxed);
        clamped
    }

    pub fn position(&self) -> u32 {
        self.position.load(Ordering::Relaxed)
    }

    /// Threshold in 0.05..=0.90.
    pub fn confidence(&self) -> f32 {
        self.position() as f32 / 100.0
    }

    /// Display label, two decimals.
    pub fn label(&self) -> String {
        let position = self.position();
        format!("{}.{:02}", position / 100, position % 100)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_POSITION)
    }
}

fn clamp_position(position: u32) -> u32 {
    position.clamp(MIN_CONFIDENCE_POSITION, MAX_CONFIDENCE_POSITION)
}
