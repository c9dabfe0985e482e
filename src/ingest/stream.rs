//! Network camera stream source.
//!
//! `StreamSource` ingests frames from IP cameras: RTSP feeds and HTTP MJPEG
//! endpoints such as phone webcam apps. Real streams decode through GStreamer
//! (feature: stream-gstreamer); `stub://` URLs produce an endless synthetic
//! stream.
//!
//! A stream never ends on its own. A pull that times out is reported as
//! `Ok(None)` and the worker retries. A pipeline error or EOS posted on the
//! bus is returned as `Err` from the next pull, after which the pipeline is
//! restarted so a later pull can reconnect.

#[cfg(feature = "stream-gstreamer")]
use anyhow::Context;
use anyhow::Result;

use super::synthetic::SyntheticClip;
use super::FrameReader;
use crate::frame::Frame;

/// Configuration for a network stream.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Stream URL (e.g., "rtsp://192.168.1.100:554/stream").
    pub url: String,
    /// Expected frame rate; scales the pull timeout.
    pub target_fps: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "rtsp://localhost:554/stream".to_string(),
            target_fps: 30,
        }
    }
}

/// Network stream frame source.
pub struct StreamSource {
    backend: StreamBackend,
}

enum StreamBackend {
    Synthetic(SyntheticStreamSource),
    #[cfg(feature = "stream-gstreamer")]
    Gstreamer(GstreamerStreamSource),
}

impl StreamSource {
    pub fn new(config: StreamConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: StreamBackend::Synthetic(SyntheticStreamSource::new(config)?),
            })
        } else {
            #[cfg(feature = "stream-gstreamer")]
            {
                Ok(Self {
                    backend: StreamBackend::Gstreamer(GstreamerStreamSource::new(config)?),
                })
            }
            #[cfg(not(feature = "stream-gstreamer"))]
            {
                anyhow::bail!(
                    "network stream {} requires the stream-gstreamer feature",
                    config.url
                )
            }
        }
    }

    /// Connect to the stream.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.connect(),
        }
    }

    /// Pull the next frame, `None` when nothing arrived in time.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.next_frame(),
        }
    }
}

impl FrameReader for StreamSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        self.next_frame()
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticStreamSource {
    config: StreamConfig,
    clip: SyntheticClip,
}

impl SyntheticStreamSource {
    fn new(config: StreamConfig) -> Result<Self> {
        let clip = SyntheticClip::parse(&config.url, None)?;
        Ok(Self { config, clip })
    }

    /// Synthetic streams are always "connected".
    fn connect(&mut self) -> Result<()> {
        log::info!("StreamSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.clip.next_frame()
    }
}

// ----------------------------------------------------------------------------
// Production stream source using GStreamer
// ----------------------------------------------------------------------------

#[cfg(feature = "stream-gstreamer")]
struct GstreamerStreamSource {
    config: StreamConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    last_error: Option<String>,
}

#[cfg(feature = "stream-gstreamer")]
impl GstreamerStreamSource {
    /// Build `uridecodebin ! videoconvert ! appsink`, which covers RTSP and
    /// HTTP MJPEG alike. The URI is set as an element property, never parsed
    /// as part of a launch line. The appsink keeps only the newest buffer so
    /// a slow detector never falls behind a live feed.
    fn new(config: StreamConfig) -> Result<Self> {
        use gstreamer::prelude::*;

        gstreamer::init().context("initialize gstreamer")?;

        let pipeline = gstreamer::Pipeline::new();
        let source = gstreamer::ElementFactory::make("uridecodebin")
            .property("uri", config.url.as_str())
            .build()
            .context("create uridecodebin")?;
        let convert = gstreamer::ElementFactory::make("videoconvert")
            .build()
            .context("create videoconvert")?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        let appsink = gstreamer_app::AppSink::builder()
            .caps(&caps)
            .max_buffers(1)
            .drop(true)
            .build();
        appsink.set_sync(false);

        pipeline
            .add_many([&source, &convert, appsink.upcast_ref()])
            .context("assemble stream pipeline")?;
        convert
            .link(&appsink)
            .context("link videoconvert to appsink")?;

        // uridecodebin exposes its pads once the stream type is known.
        let convert_weak = convert.downgrade();
        source.connect_pad_added(move |_, src_pad| {
            let Some(convert) = convert_weak.upgrade() else {
                return;
            };
            let Some(sink_pad) = convert.static_pad("sink") else {
                return;
            };
            if sink_pad.is_linked() {
                return;
            }
            let is_video = src_pad
                .current_caps()
                .and_then(|caps| {
                    caps.structure(0)
                        .map(|s| s.name().as_str().starts_with("video/"))
                })
                .unwrap_or(false);
            if !is_video {
                return;
            }
            if let Err(err) = src_pad.link(&sink_pad) {
                log::warn!("StreamSource: failed to link decoded video pad: {:?}", err);
            }
        });

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            last_error: None,
        })
    }

    fn connect(&mut self) -> Result<()> {
        use gstreamer::prelude::*;

        self.pipeline
            .set_state(gstreamer::State::Playing)
            .with_context(|| format!("failed to open stream {}", self.config.url))?;
        log::info!("StreamSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.poll_bus();
        if let Some(error) = self.last_error.take() {
            self.restart();
            anyhow::bail!("stream {} failed: {}", self.config.url, error);
        }

        let Some(sample) = self.appsink.try_pull_sample(self.frame_timeout()) else {
            return Ok(None);
        };
        let (pixels, width, height) = sample_to_pixels(&sample)?;

        self.frame_count += 1;

        Frame::new(pixels, width, height, crate::frame::ChannelOrder::Rgb).map(Some)
    }

    /// Cycle the pipeline through Null so the next pull reconnects.
    fn restart(&self) {
        use gstreamer::prelude::*;

        if let Err(err) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("StreamSource: failed to reset pipeline: {}", err);
            return;
        }
        if let Err(err) = self.pipeline.set_state(gstreamer::State::Playing) {
            log::warn!("StreamSource: failed to restart {}: {}", self.config.url, err);
        }
    }

    fn frame_timeout(&self) -> gstreamer::ClockTime {
        let base_ms = if self.config.target_fps == 0 {
            500
        } else {
            (1000 / self.config.target_fps).saturating_mul(4)
        };
        gstreamer::ClockTime::from_mseconds(base_ms.clamp(100, 500) as u64)
    }

    fn poll_bus(&mut self) {
        use gstreamer::prelude::*;

        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.pop() {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    let error = format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    );
                    log::warn!("StreamSource: {}", error);
                    self.last_error = Some(error);
                }
                MessageView::Eos(..) => {
                    self.last_error = Some("gstreamer reached EOS".to_string());
                }
                _ => {}
            }
        }
    }
}

#[cfg(feature = "stream-gstreamer")]
impl Drop for GstreamerStreamSource {
    fn drop(&mut self) {
        use gstreamer::prelude::*;

        if let Err(err) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("StreamSource: failed to stop pipeline: {}", err);
        }
        log::info!(
            "StreamSource: released {} after {} frames",
            self.config.url,
            self.frame_count
        );
    }
}

#[cfg(feature = "stream-gstreamer")]
fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("stream sample missing buffer")?;
    let caps = sample.caps().context("stream sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse stream caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer.map_readable().context("map stream buffer")?;
    let data = map.as_slice();

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("stream buffer row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
