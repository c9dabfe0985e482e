#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::annotate::annotate;
use crate::detect::backend::Detector;
use crate::detect::result::{non_max_suppression, Detection, Inference};
use crate::frame::Frame;

const IOU_THRESHOLD: f32 = 0.45;
const MAX_DETECTIONS: usize = 100;

/// Tract-based backend for ONNX YOLO exports.
///
/// Expects a single `[1, 3, S, S]` float input (RGB, 0..1) and a
/// `[1, 4 + classes, anchors]` output whose first four rows are
/// `cx, cy, w, h` in input pixels. Frames of any size are resized to the
/// input square.
pub struct TractDetector {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    classes: Vec<String>,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, classes: Vec<String>) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            classes,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let rgb = frame.to_rgb_image()?;
        let resized =
            image::imageops::resize(&rgb, self.input_size, self.input_size, FilterType::Triangle);

        let side = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
        });

        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, confidence: f32) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [1, 4 + classes, anchors]")?;

        let (_, rows, anchors) = view.dim();
        if rows <= 4 {
            return Err(anyhow!("model output has {} rows, expected > 4", rows));
        }

        let scale = self.input_size as f32;
        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let (class_id, score) = (4..rows)
                .map(|row| (row - 4, view[[0, row, anchor]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !score.is_finite() || score < confidence {
                continue;
            }

            let cx = view[[0, 0, anchor]];
            let cy = view[[0, 1, anchor]];
            let w = view[[0, 2, anchor]];
            let h = view[[0, 3, anchor]];
            candidates.push(Detection {
                bbox: [
                    ((cx - w / 2.0) / scale).clamp(0.0, 1.0),
                    ((cy - h / 2.0) / scale).clamp(0.0, 1.0),
                    ((cx + w / 2.0) / scale).clamp(0.0, 1.0),
                    ((cy + h / 2.0) / scale).clamp(0.0, 1.0),
                ],
                confidence: score,
                class_id,
                label: self.label_for(class_id),
            });
        }

        Ok(non_max_suppression(candidates, IOU_THRESHOLD, MAX_DETECTIONS))
    }

    fn label_for(&self, class_id: usize) -> String {
        self.classes
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class_id))
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame, confidence: f32) -> Result<Inference> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let detections = self.decode(outputs, confidence)?;
        let annotated = annotate(frame, &detections)?;
        Ok(Inference {
            annotated,
            detections,
        })
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::solid(self.input_size, self.input_size, [114, 114, 114])?;
        self.infer(&blank, 1.0).map(|_| ())
    }
}
