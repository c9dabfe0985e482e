//! Synthetic `stub://` frame generator.
//!
//! URL form: `stub://<name>?frames=N&width=W&height=H&fps=F`. All parameters
//! are optional. `frames` bounds the clip (file sources default to 30 frames,
//! live streams are unbounded unless given). `fps` paces live streams so the
//! worker sees a realistic frame interval.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::frame::{ChannelOrder, Frame};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Clone, Debug)]
pub struct SyntheticClip {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// `None` for an endless stream.
    pub frame_limit: Option<u64>,
    /// Pacing for live streams; zero means no pacing.
    pub fps: u32,
    frame_count: u64,
    scene_state: u8,
    last_frame_at: Option<Instant>,
}

impl SyntheticClip {
    /// Parse a `stub://` URL. `default_limit` applies when `frames` is absent.
    pub fn parse(url: &str, default_limit: Option<u64>) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic sources must use the stub:// scheme"))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut clip = Self {
            name: name.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame_limit: default_limit,
            fps: 0,
            frame_count: 0,
            scene_state: 0,
            last_frame_at: None,
        };

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            let parsed: u64 = value
                .parse()
                .map_err(|_| anyhow!("stub parameter '{}' must be an integer", key))?;
            match key {
                "frames" => clip.frame_limit = Some(parsed),
                "width" => clip.width = to_dimension(key, parsed)?,
                "height" => clip.height = to_dimension(key, parsed)?,
                "fps" => clip.fps = u32::try_from(parsed).unwrap_or(u32::MAX),
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }

        Ok(clip)
    }

    pub fn frames_generated(&self) -> u64 {
        self.frame_count
    }

    /// Next synthetic frame, or `None` once the clip is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }
        self.pace();
        self.frame_count += 1;

        let pixels = self.generate_synthetic_pixels();
        Frame::new(pixels, self.width, self.height, ChannelOrder::Rgb).map(Some)
    }

    fn pace(&mut self) {
        if self.fps == 0 {
            return;
        }
        let interval = Duration::from_millis(1000 / self.fps.max(1) as u64);
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    /// Static background with an occasional scene change, so brightness based
    /// detectors see a mix of hits and misses.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;

        if self.frame_count.is_multiple_of(50) {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64 * 37) % 256) as u8;
        }
        pixels
    }
}

fn to_dimension(key: &str, value: u64) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if v > 0 && v <= 8192 => Ok(v),
        _ => Err(anyhow!("stub {} must be between 1 and 8192", key)),
    }
}
