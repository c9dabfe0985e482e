use anyhow::Result;
use image::{Rgb, RgbImage};

use crate::detect::result::Detection;
use crate::frame::Frame;

const BOX_THICKNESS: u32 = 2;

const PALETTE: [[u8; 3]; 6] = [
    [255, 56, 56],
    [56, 255, 56],
    [56, 56, 255],
    [255, 157, 56],
    [255, 56, 255],
    [56, 255, 255],
];

/// Draw detection boxes onto an RGB copy of `frame`.
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Result<Frame> {
    let mut img = frame.to_rgb_image()?;
    let dims = img.dimensions();
    for detection in detections {
        if let Some(bbox_px) = normalize_box(detection.bbox, dims) {
            let color = Rgb(PALETTE[detection.class_id % PALETTE.len()]);
            draw_rect(&mut img, bbox_px, color, BOX_THICKNESS);
        }
    }
    Ok(Frame::from_rgb_image(img))
}

/// Normalize a box from 0..1 space into pixel coordinates, clamped to image bounds.
pub fn normalize_box(bbox_norm: [f32; 4], dims: (u32, u32)) -> Option<[u32; 4]> {
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return None;
    }
    let clamp = |v: f32, max: u32| -> u32 { v.max(0.0).min((max - 1) as f32) as u32 };
    let x0 = clamp(bbox_norm[0] * w as f32, w);
    let y0 = clamp(bbox_norm[1] * h as f32, h);
    let x1 = clamp(bbox_norm[2] * w as f32, w);
    let y1 = clamp(bbox_norm[3] * h as f32, h);
    if x0 > x1 || y0 > y1 {
        return None;
    }
    Some([x0, y0, x1, y1])
}

/// Draw a rectangle border with given thickness.
fn draw_rect(img: &mut RgbImage, bbox_px: [u32; 4], color: Rgb<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    let [x0, y0, x1, y1] = bbox_px;
    for t in 0..thickness {
        let xx0 = x0.saturating_add(t);
        let yy0 = y0.saturating_add(t);
        let xx1 = x1.saturating_sub(t);
        let yy1 = y1.saturating_sub(t);
        if xx0 >= w || yy0 >= h || xx1 >= w || yy1 >= h || xx0 > xx1 || yy0 > yy1 {
            continue;
        }
        for x in xx0..=xx1 {
            img.put_pixel(x, yy0, color);
            img.put_pixel(x, yy1, color);
        }
        for y in yy0..=yy1 {
            img.put_pixel(xx0, y, color);
            img.put_pixel(xx1, y, color);
        }
    }
}
