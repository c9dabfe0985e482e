use anyhow::Result;

use crate::detect::annotate::annotate;
use crate::detect::backend::Detector;
use crate::detect::result::{Detection, Inference};
use crate::frame::Frame;

/// Stub detector for testing and demos.
///
/// Scores one centred candidate box from the frame's mean brightness
/// (0.30 for black up to 0.90 for white) and reports it when the score meets
/// the threshold. Deterministic for a given frame.
pub struct StubDetector {
    name: String,
    classes: Vec<String>,
    frames_seen: u64,
}

impl StubDetector {
    pub fn new(name: &str, classes: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            classes,
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Score assigned to a frame, in 0.30..=0.90.
    pub fn score(frame: &Frame) -> f32 {
        0.30 + 0.60 * (frame.mean_luma() / 255.0)
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new("stub", Vec::new())
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&mut self, frame: &Frame, confidence: f32) -> Result<Inference> {
        self.frames_seen += 1;

        let score = Self::score(frame);
        let mut detections = Vec::new();
        if score >= confidence {
            let class_id = (self.frames_seen as usize) % self.classes.len().max(1);
            let label = self
                .classes
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| format!("class {}", class_id));
            detections.push(Detection {
                bbox: [0.25, 0.25, 0.75, 0.75],
                confidence: score,
                class_id,
                label,
            });
        }

        let annotated = annotate(frame, &detections)?;
        Ok(Inference {
            annotated,
            detections,
        })
    }
}
