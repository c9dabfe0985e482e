//! Frame ingestion sources.
//!
//! This module provides the user-facing `Source` selection and the capture
//! handles that read frames from it:
//! - Still images (PNG/JPEG via the image crate)
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Local capture devices by index (feature: ingest-v4l2)
//! - Network streams, RTSP or HTTP MJPEG (feature: stream-gstreamer)
//! - Synthetic `stub://` sources (testing, demos)
//!
//! Every capture handle implements `FrameReader`. Handles are opened and
//! dropped on the capture worker thread; nothing here is touched by the UI
//! thread once a session is running.

mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
mod file_ffmpeg;
pub(crate) mod normalize;
mod still;
mod stream;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::frame::Frame;

pub use file::{FileConfig, FileSource, FileStats};
pub use still::ImageSource;
pub use stream::{StreamConfig, StreamSource};
pub use synthetic::SyntheticClip;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// File extensions treated as still images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// What the user selected to capture from.
///
/// A `Source` is immutable for the lifetime of a session. Selecting a new one
/// requires stopping the active session first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Single still image; produces exactly one frame.
    Image(PathBuf),
    /// Local video file; ends at end-of-stream.
    Video(PathBuf),
    /// Local capture device by index (e.g. webcam 0).
    Device(u32),
    /// Network camera stream URL.
    Stream(String),
}

/// How a source ends, which drives the worker loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Still,
    File,
    Live,
}

impl Source {
    /// Classify a local path by extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_image_path(&path) {
            Source::Image(path)
        } else {
            Source::Video(path)
        }
    }

    /// Parse free-form user input: a bare integer is a device index, a
    /// `scheme://` string is a network stream, anything else is a local path.
    ///
    /// `stub://` and `file://` inputs stay local so synthetic clips can be
    /// selected like files.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if let Ok(index) = trimmed.parse::<u32>() {
            return Source::Device(index);
        }
        match trimmed.split_once("://") {
            Some(("file", rest)) => Source::from_path(rest),
            Some(("stub", _)) | None => Source::from_path(trimmed),
            Some(_) => Source::Stream(trimmed.to_string()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Image(_) => SourceKind::Still,
            Source::Video(_) => SourceKind::File,
            Source::Device(_) | Source::Stream(_) => SourceKind::Live,
        }
    }

    pub fn is_still(&self) -> bool {
        self.kind() == SourceKind::Still
    }

    /// Live sources never reach end-of-stream; an empty read is retried.
    pub fn is_live(&self) -> bool {
        self.kind() == SourceKind::Live
    }

    /// Short label for status displays.
    pub fn label(&self) -> String {
        match self {
            Source::Image(path) | Source::Video(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Source::Device(index) => format!("Webcam {}", index),
            Source::Stream(url) => url.clone(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Image(path) | Source::Video(path) => write!(f, "{}", path.display()),
            Source::Device(index) => write!(f, "device:{}", index),
            Source::Stream(url) => write!(f, "{}", url),
        }
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

/// An opened capture handle.
///
/// `read_frame` may block for as long as the backend needs to decode a frame.
/// `Ok(None)` means no frame was produced by this read: end-of-stream for file
/// backed sources, a transient gap for live ones. The worker decides which.
pub trait FrameReader {
    fn read_frame(&mut self) -> Result<Option<Frame>>;
}

/// Open the capture handle for a source.
pub fn open(source: &Source) -> Result<Box<dyn FrameReader>> {
    match source {
        Source::Image(path) => Ok(Box::new(ImageSource::open(path)?)),
        Source::Video(path) => {
            let mut file = FileSource::new(FileConfig {
                path: path.to_string_lossy().into_owned(),
                ..FileConfig::default()
            })?;
            file.connect()?;
            Ok(Box::new(file))
        }
        Source::Device(index) => open_device(*index),
        Source::Stream(url) => {
            let mut stream = StreamSource::new(StreamConfig {
                url: url.clone(),
                ..StreamConfig::default()
            })?;
            stream.connect()?;
            Ok(Box::new(stream))
        }
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(index: u32) -> Result<Box<dyn FrameReader>> {
    let mut device = V4l2Source::new(V4l2Config {
        device: format!("/dev/video{}", index),
        ..V4l2Config::default()
    })?;
    device.connect()?;
    Ok(Box::new(device))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(index: u32) -> Result<Box<dyn FrameReader>> {
    anyhow::bail!(
        "capture device {} requires the ingest-v4l2 feature",
        index
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_image_extensions_case_insensitively() {
        assert_eq!(
            Source::from_path("cards/ace.PNG"),
            Source::Image(PathBuf::from("cards/ace.PNG"))
        );
        assert!(Source::from_path("hand.jpeg").is_still());
        assert_eq!(
            Source::from_path("table.mp4"),
            Source::Video(PathBuf::from("table.mp4"))
        );
        assert!(!Source::from_path("no_extension").is_still());
    }

    #[test]
    fn parses_user_input() {
        assert_eq!(Source::parse("0"), Source::Device(0));
        assert_eq!(
            Source::parse("http://192.168.137.111:4747/video"),
            Source::Stream("http://192.168.137.111:4747/video".to_string())
        );
        assert_eq!(
            Source::parse("file:///tmp/clip.avi"),
            Source::Video(PathBuf::from("/tmp/clip.avi"))
        );
        assert_eq!(
            Source::parse("stub://clip?frames=3"),
            Source::Video(PathBuf::from("stub://clip?frames=3"))
        );
    }

    #[test]
    fn only_devices_and_streams_are_live() {
        assert!(Source::Device(1).is_live());
        assert!(Source::Stream("rtsp://cam/1".into()).is_live());
        assert!(!Source::Video("a.mkv".into()).is_live());
        assert!(!Source::Image("a.jpg".into()).is_live());
    }

    #[test]
    fn labels_are_short() {
        assert_eq!(Source::from_path("/data/videos/deal.mp4").label(), "deal.mp4");
        assert_eq!(Source::Device(0).label(), "Webcam 0");
    }

    #[test]
    fn missing_image_fails_to_open() {
        let source = Source::Image(PathBuf::from("/nonexistent/smartcam/none.png"));
        assert!(open(&source).is_err());
    }
}
