//! Still image source.
//!
//! Decodes the whole image when opened, so a missing or corrupt file fails
//! the open instead of the first read. Produces the frame exactly once.

use std::path::Path;

use anyhow::{Context, Result};

use super::FrameReader;
use crate::frame::Frame;

pub struct ImageSource {
    frame: Option<Frame>,
}

impl ImageSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?;
        let frame = Frame::from_rgb_image(decoded.to_rgb8());
        log::info!(
            "ImageSource: loaded {} ({}x{})",
            path.display(),
            frame.width,
            frame.height
        );
        Ok(Self { frame: Some(frame) })
    }
}

impl FrameReader for ImageSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frame.take())
    }
}
