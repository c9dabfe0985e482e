//! Status display fields and the stats updates the worker emits.

use std::time::Duration;

pub const IDLE_FPS_LABEL: &str = "FPS: --";
pub const IDLE_INFER_LABEL: &str = "Infer: -- ms";
pub const IDLE_DETECTIONS_LABEL: &str = "Detections: --";
pub const READY_STATE_LABEL: &str = "Ready";

/// Partial update of the status fields. `None` leaves a field as it is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsUpdate {
    pub fps: Option<String>,
    pub infer: Option<String>,
    pub detections: Option<String>,
}

impl StatsUpdate {
    /// FPS and latency labels for one read+infer cycle.
    pub fn timing(elapsed: Duration) -> Self {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        Self {
            fps: Some(format!("FPS: {:.1}", fps_from_elapsed_ms(elapsed_ms))),
            infer: Some(format!("Infer: {:.1} ms", elapsed_ms)),
            detections: None,
        }
    }

    pub fn detections(count: usize) -> Self {
        Self {
            detections: Some(format!("Detections: {}", count)),
            ..Self::default()
        }
    }
}

/// Frames per second implied by one cycle, `1000 / max(ms, 1)`.
pub fn fps_from_elapsed_ms(elapsed_ms: f64) -> f64 {
    1000.0 / elapsed_ms.max(1.0)
}

/// What the status bar shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusDisplay {
    pub state: String,
    pub fps: String,
    pub infer: String,
    pub detections: String,
}

impl Default for StatusDisplay {
    fn default() -> Self {
        Self {
            state: READY_STATE_LABEL.to_string(),
            fps: IDLE_FPS_LABEL.to_string(),
            infer: IDLE_INFER_LABEL.to_string(),
            detections: IDLE_DETECTIONS_LABEL.to_string(),
        }
    }
}

impl StatusDisplay {
    pub fn apply(&mut self, update: &StatsUpdate) {
        if let Some(fps) = &update.fps {
            self.fps.clone_from(fps);
        }
        if let Some(infer) = &update.infer {
            self.infer.clone_from(infer);
        }
        if let Some(detections) = &update.detections {
            self.detections.clone_from(detections);
        }
    }

    pub fn set_state(&mut self, state: impl Into<String>) {
        self.state = state.into();
    }

    /// Back to the idle `--` placeholders; the state label is kept.
    pub fn reset_stats(&mut self) {
        self.fps = IDLE_FPS_LABEL.to_string();
        self.infer = IDLE_INFER_LABEL.to_string();
        self.detections = IDLE_DETECTIONS_LABEL.to_string();
    }

    /// One-line rendering for terminals and logs.
    pub fn line(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.state, self.fps, self.infer, self.detections
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_is_guarded_against_tiny_intervals() {
        assert_eq!(fps_from_elapsed_ms(0.0), 1000.0);
        assert_eq!(fps_from_elapsed_ms(0.4), 1000.0);
        assert_eq!(fps_from_elapsed_ms(40.0), 25.0);
    }

    #[test]
    fn timing_labels() {
        let update = StatsUpdate::timing(Duration::from_millis(50));
        assert_eq!(update.fps.as_deref(), Some("FPS: 20.0"));
        assert_eq!(update.infer.as_deref(), Some("Infer: 50.0 ms"));
        assert_eq!(update.detections, None);
    }

    #[test]
    fn partial_updates_keep_other_fields() {
        let mut display = StatusDisplay::default();
        display.apply(&StatsUpdate::timing(Duration::from_millis(100)));
        display.apply(&StatsUpdate::detections(3));
        assert_eq!(display.fps, "FPS: 10.0");
        assert_eq!(display.detections, "Detections: 3");

        display.apply(&StatsUpdate::detections(0));
        assert_eq!(display.fps, "FPS: 10.0");
        assert_eq!(display.detections, "Detections: 0");

        display.reset_stats();
        assert_eq!(display, StatusDisplay::default());
    }
}
