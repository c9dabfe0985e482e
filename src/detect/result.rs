use crate::frame::Frame;

/// Output of one `Detector::infer` call.
#[derive(Clone, Debug)]
pub struct Inference {
    /// Frame with detections drawn on it.
    pub annotated: Frame,
    pub detections: Vec<Detection>,
}

/// One detected object. Box corners are normalized to 0..1.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// `[x0, y0, x1, y1]`
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: usize,
    pub label: String,
}

impl Detection {
    pub fn area(&self) -> f32 {
        let [x0, y0, x1, y1] = self.bbox;
        (x1 - x0).max(0.0) * (y1 - y0).max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let ix0 = self.bbox[0].max(other.bbox[0]);
        let iy0 = self.bbox[1].max(other.bbox[1]);
        let ix1 = self.bbox[2].min(other.bbox[2]);
        let iy1 = self.bbox[3].min(other.bbox[3]);
        let inter = (ix1 - ix0).max(0.0) * (iy1 - iy0).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Greedy class-wise non-maximum suppression.
///
/// Keeps the highest scoring box of every overlapping same-class cluster
/// (IoU above `iou_threshold`), sorted by descending confidence, at most
/// `max_detections` long.
pub fn non_max_suppression(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
