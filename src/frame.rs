//! Frame container shared by ingest, detection and rendering.
//!
//! - `Frame`: packed 8-bit, 3-channel pixel buffer tagged with its dimensions
//!   and channel order.
//! - `ChannelOrder`: RGB or BGR. Capture backends produce whichever their
//!   decoder emits; renderers and detectors convert with `to_rgb`.
//!
//! Frames are transient. The worker produces one per iteration, hands it to the
//! detector, emits the annotated copy to the UI, then drops it.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use crate::ingest::normalize::{normalize_to_rgb, PixelFormat};

/// Channel order of a packed 3-byte pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Raw pixel buffer. `data.len()` is always `width * height * 3`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
}

impl Frame {
    /// Create a frame, validating the buffer length against the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, order: ChannelOrder) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            order,
        })
    }

    /// Uniformly filled RGB frame.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let pixels = expected_len(width, height)? / 3;
        let data = rgb.iter().copied().cycle().take(pixels * 3).collect();
        Self::new(data, width, height, ChannelOrder::Rgb)
    }

    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            order: ChannelOrder::Rgb,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Return an RGB-ordered copy (no-op clone for RGB frames).
    pub fn to_rgb(&self) -> Result<Frame> {
        match self.order {
            ChannelOrder::Rgb => Ok(self.clone()),
            ChannelOrder::Bgr => {
                let data =
                    normalize_to_rgb(&self.data, self.width, self.height, PixelFormat::Bgr24)?;
                Frame::new(data, self.width, self.height, ChannelOrder::Rgb)
            }
        }
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let rgb = self.to_rgb()?;
        RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
            .context("frame buffer does not fit its dimensions")
    }

    /// Mean Rec. 601 luma over the whole frame, in 0..=255.
    pub fn mean_luma(&self) -> f32 {
        let pixel_count = self.data.len() / 3;
        if pixel_count == 0 {
            return 0.0;
        }
        let (r_idx, b_idx) = match self.order {
            ChannelOrder::Rgb => (0, 2),
            ChannelOrder::Bgr => (2, 0),
        };
        let sum: f64 = self
            .data
            .chunks_exact(3)
            .map(|px| {
                0.299 * px[r_idx] as f64 + 0.587 * px[1] as f64 + 0.114 * px[b_idx] as f64
            })
            .sum();
        (sum / pixel_count as f64) as f32
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0u8; 10], 2, 2, ChannelOrder::Rgb).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2, ChannelOrder::Rgb).is_ok());
    }

    #[test]
    fn bgr_frames_convert_to_rgb() -> Result<()> {
        let frame = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1, ChannelOrder::Bgr)?;
        let rgb = frame.to_rgb()?;
        assert_eq!(rgb.order, ChannelOrder::Rgb);
        assert_eq!(rgb.pixels(), &[3, 2, 1, 6, 5, 4]);
        Ok(())
    }

    #[test]
    fn mean_luma_of_white_is_full_scale() -> Result<()> {
        let frame = Frame::solid(4, 4, [255, 255, 255])?;
        assert!((frame.mean_luma() - 255.0).abs() < 0.01);
        let black = Frame::solid(4, 4, [0, 0, 0])?;
        assert_eq!(black.mean_luma(), 0.0);
        Ok(())
    }

    #[test]
    fn rgb_image_round_trip_keeps_dimensions() -> Result<()> {
        let frame = Frame::solid(3, 2, [10, 20, 30])?;
        let img = frame.to_rgb_image()?;
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(Frame::from_rgb_image(img), frame);
        Ok(())
    }
}
