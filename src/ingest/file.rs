//! Local video file source.
//!
//! `FileSource` reads frames from a local video file until end-of-stream.
//! Real files decode through FFmpeg (feature: ingest-file-ffmpeg); `stub://`
//! paths produce a bounded synthetic clip.
//!
//! The file source only accepts local paths. URL schemes other than `stub://`
//! belong to `StreamSource`.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::SyntheticClip;
use super::FrameReader;
use crate::frame::Frame;

/// Frames in a synthetic clip when the URL gives no `frames` parameter.
const DEFAULT_STUB_FRAMES: u64 = 30;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "/home/me/videos/table.mp4").
    pub path: String,
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)?),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "video file {} requires the ingest-file-ffmpeg feature",
                    config.path
                ))
            }
        }
    }

    /// Connect to the file source.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    /// Decode the next frame; `None` at end-of-stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl FrameReader for FileSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        self.next_frame()
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        let stats = self.stats();
        log::info!(
            "FileSource: released {} after {} frames",
            stats.path,
            stats.frames_captured
        );
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    clip: SyntheticClip,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Result<Self> {
        let clip = SyntheticClip::parse(&config.path, Some(DEFAULT_STUB_FRAMES))?;
        Ok(Self { config, clip })
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.clip.next_frame()
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.clip.frames_generated(),
            path: self.config.path.clone(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
