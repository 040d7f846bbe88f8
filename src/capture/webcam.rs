//! Webcam frame source.
//!
//! This module provides `WebcamSource` for capturing frames from local
//! webcams.
//!
//! The webcam source is responsible for:
//! - Connecting to a local device node (e.g., /dev/video0)
//! - Negotiating an RGB24 format and capturing frames in-memory
//! - Producing `Frame` instances sized to the active format
//!
//! Device paths starting with `stub://` select a synthetic backend that
//! renders scripted scenes instead of touching hardware. Synthetic frames
//! follow a fixed luminance scheme so the heuristic analyzers can decode
//! them: empty scenes sit near `SYNTHETIC_EMPTY_LUMA`, a face with label
//! index `k` fills around `SYNTHETIC_BAND_BASE + k * SYNTHETIC_BAND_STEP`.

use anyhow::Result;
use rand::Rng;
use std::collections::VecDeque;

#[cfg(feature = "capture-v4l2")]
use anyhow::Context;
#[cfg(feature = "capture-v4l2")]
use ouroboros::self_referencing;
#[cfg(feature = "capture-v4l2")]
use std::time::{Duration, Instant};

use super::FrameSource;
use crate::frame::Frame;
use crate::EmotionLabel;

/// Mean luminance of synthetic frames with no face in view.
pub const SYNTHETIC_EMPTY_LUMA: u8 = 8;
/// Band center for the first label (`EmotionLabel::ALL[0]`).
pub const SYNTHETIC_BAND_BASE: u8 = 72;
/// Band spacing between adjacent labels.
pub const SYNTHETIC_BAND_STEP: u8 = 24;

/// Configuration for a webcam source.
#[derive(Clone, Debug)]
pub struct WebcamConfig {
    /// Device path (e.g., "/dev/video0"), or "stub://<name>" for synthetic.
    pub device: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// One synthetic scene: either a face showing a label, or an empty backdrop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scene {
    pub face: Option<EmotionLabel>,
}

impl Scene {
    pub fn with_face(label: EmotionLabel) -> Self {
        Self { face: Some(label) }
    }

    pub fn empty() -> Self {
        Self { face: None }
    }
}

/// Webcam frame source.
///
/// Uses libv4l for real devices, with a synthetic backend for `stub://`
/// paths.
pub struct WebcamSource {
    backend: WebcamBackend,
}

enum WebcamBackend {
    Synthetic(SyntheticWebcamSource),
    #[cfg(feature = "capture-v4l2")]
    Device(DeviceWebcamSource),
}

impl WebcamSource {
    pub fn new(config: WebcamConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: WebcamBackend::Synthetic(SyntheticWebcamSource::cycling(config)),
            });
        }
        #[cfg(feature = "capture-v4l2")]
        {
            Ok(Self {
                backend: WebcamBackend::Device(DeviceWebcamSource::new(config)?),
            })
        }
        #[cfg(not(feature = "capture-v4l2"))]
        {
            Err(anyhow::anyhow!(
                "webcam device {} requires the capture-v4l2 feature (use stub:// for synthetic)",
                config.device
            ))
        }
    }

    /// Synthetic source that plays `segments` (scene, frame count) in order
    /// and ends the stream when they run out.
    pub fn scripted(config: WebcamConfig, segments: Vec<(Scene, u32)>) -> Self {
        Self {
            backend: WebcamBackend::Synthetic(SyntheticWebcamSource::scripted(config, segments)),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> WebcamStats {
        match &self.backend {
            WebcamBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "capture-v4l2")]
            WebcamBackend::Device(source) => source.stats(),
        }
    }
}

impl FrameSource for WebcamSource {
    fn name(&self) -> &str {
        match &self.backend {
            WebcamBackend::Synthetic(source) => &source.config.device,
            #[cfg(feature = "capture-v4l2")]
            WebcamBackend::Device(source) => &source.config.device,
        }
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            WebcamBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "capture-v4l2")]
            WebcamBackend::Device(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            WebcamBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "capture-v4l2")]
            WebcamBackend::Device(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            WebcamBackend::Synthetic(_) => true,
            #[cfg(feature = "capture-v4l2")]
            WebcamBackend::Device(source) => source.is_healthy(),
        }
    }
}

/// Statistics for a webcam source.
#[derive(Clone, Debug)]
pub struct WebcamStats {
    pub frames_captured: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

/// Frames per mood in the endless default cycle.
const CYCLE_FRAMES: u64 = 50;
/// Trailing frames of each cycle slot rendered without a face.
const CYCLE_GAP_FRAMES: u64 = 5;

struct SyntheticWebcamSource {
    config: WebcamConfig,
    frame_count: u64,
    /// `None` plays the endless default mood cycle.
    script: Option<VecDeque<(Scene, u32)>>,
}

impl SyntheticWebcamSource {
    /// Endless source: rotates through the labels, holding each for
    /// `CYCLE_FRAMES` frames with a short faceless gap at the end of every
    /// slot.
    fn cycling(config: WebcamConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            script: None,
        }
    }

    fn scripted(config: WebcamConfig, segments: Vec<(Scene, u32)>) -> Self {
        Self {
            config,
            frame_count: 0,
            script: Some(segments.into_iter().collect()),
        }
    }

    /// Synthetic sources are always "connected".
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "WebcamSource: connected to {} (synthetic)",
            self.config.device
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let scene = match &mut self.script {
            None => self.cycle_scene(),
            Some(segments) => loop {
                match segments.front_mut() {
                    None => return Ok(None),
                    Some((_, 0)) => {
                        segments.pop_front();
                    }
                    Some((scene, remaining)) => {
                        let scene = *scene;
                        *remaining -= 1;
                        break scene;
                    }
                }
            },
        };

        self.frame_count += 1;
        let pixels = self.render_scene(scene);
        Ok(Some(Frame::new(pixels, self.config.width, self.config.height)))
    }

    fn cycle_scene(&self) -> Scene {
        let slot = self.frame_count / CYCLE_FRAMES;
        let offset = self.frame_count % CYCLE_FRAMES;
        if offset >= CYCLE_FRAMES - CYCLE_GAP_FRAMES {
            Scene::empty()
        } else {
            Scene::with_face(EmotionLabel::ALL[(slot % EmotionLabel::COUNT as u64) as usize])
        }
    }

    /// Render a scene into RGB24 pixels following the luminance scheme.
    ///
    /// A small positional ripple plus one per-frame jitter value keep frames
    /// from being byte-identical while staying well inside the band.
    fn render_scene(&self, scene: Scene) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;
        let jitter: i16 = rand::thread_rng().gen_range(-2..=2);

        let mut pixels = vec![0u8; pixel_count];
        match scene.face {
            None => {
                for (i, pixel) in pixels.iter_mut().enumerate() {
                    *pixel = SYNTHETIC_EMPTY_LUMA.wrapping_add((i % 7) as u8);
                }
            }
            Some(label) => {
                let base = SYNTHETIC_BAND_BASE as i16
                    + label.index() as i16 * SYNTHETIC_BAND_STEP as i16;
                for (i, pixel) in pixels.iter_mut().enumerate() {
                    let ripple = (i % 16) as i16 - 8;
                    *pixel = (base + ripple + jitter).clamp(0, 255) as u8;
                }
            }
        }

        pixels
    }

    fn stats(&self) -> WebcamStats {
        WebcamStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Production webcam source using libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "capture-v4l2")]
struct DeviceWebcamSource {
    config: WebcamConfig,
    state: Option<DeviceWebcamState>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "capture-v4l2")]
#[self_referencing]
struct DeviceWebcamState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "capture-v4l2")]
impl DeviceWebcamSource {
    fn new(config: WebcamConfig) -> Result<Self> {
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open webcam device {}", self.config.device))?;
        let mut format = device.format().context("read webcam format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "WebcamSource: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read webcam format after set failure")?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "WebcamSource: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceWebcamStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create webcam buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "WebcamSource: connected to {} ({}x{})",
            self.config.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("webcam device not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture webcam frame")
            })?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Ok(Some(Frame::new(
            buf.to_vec(),
            self.active_width,
            self.active_height,
        )))
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> WebcamStats {
        WebcamStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> WebcamConfig {
        WebcamConfig {
            device: "stub://test".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        }
    }

    fn mean_luma(frame: &Frame) -> f32 {
        let pixels = frame.pixels();
        pixels.iter().map(|&p| p as u32).sum::<u32>() as f32 / pixels.len() as f32
    }

    #[test]
    fn webcam_source_produces_frames() -> Result<()> {
        let mut source = WebcamSource::new(stub_config())?;
        source.connect()?;

        let frame = source.next_frame()?.expect("synthetic stream never ends");
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.pixels().len(), frame.expected_len());

        Ok(())
    }

    #[test]
    fn scripted_source_ends_after_segments() -> Result<()> {
        let segments = vec![
            (Scene::with_face(EmotionLabel::Happy), 3),
            (Scene::empty(), 2),
        ];
        let mut source = WebcamSource::scripted(stub_config(), segments);
        source.connect()?;

        for _ in 0..5 {
            assert!(source.next_frame()?.is_some());
        }
        assert!(source.next_frame()?.is_none());
        assert!(source.next_frame()?.is_none());

        Ok(())
    }

    #[test]
    fn scene_luminance_lands_in_band() -> Result<()> {
        let segments = vec![
            (Scene::empty(), 1),
            (Scene::with_face(EmotionLabel::Angry), 1),
            (Scene::with_face(EmotionLabel::Neutral), 1),
        ];
        let mut source = WebcamSource::scripted(stub_config(), segments);
        source.connect()?;

        let empty = source.next_frame()?.unwrap();
        assert!(mean_luma(&empty) < 20.0);

        let angry = source.next_frame()?.unwrap();
        let angry_base = SYNTHETIC_BAND_BASE as f32;
        assert!((mean_luma(&angry) - angry_base).abs() < SYNTHETIC_BAND_STEP as f32 / 2.0);

        let neutral = source.next_frame()?.unwrap();
        let neutral_base = SYNTHETIC_BAND_BASE as f32
            + (EmotionLabel::COUNT - 1) as f32 * SYNTHETIC_BAND_STEP as f32;
        assert!((mean_luma(&neutral) - neutral_base).abs() < SYNTHETIC_BAND_STEP as f32 / 2.0);

        Ok(())
    }

    #[test]
    fn default_cycle_interleaves_faces_and_gaps() -> Result<()> {
        let mut source = WebcamSource::new(stub_config())?;
        source.connect()?;

        let mut faceless = 0u32;
        let mut faced = 0u32;
        for _ in 0..CYCLE_FRAMES {
            let frame = source.next_frame()?.unwrap();
            if mean_luma(&frame) < 20.0 {
                faceless += 1;
            } else {
                faced += 1;
            }
        }
        assert_eq!(faceless as u64, CYCLE_GAP_FRAMES);
        assert_eq!(faced as u64, CYCLE_FRAMES - CYCLE_GAP_FRAMES);
        assert_eq!(source.stats().frames_captured, CYCLE_FRAMES);

        Ok(())
    }

    #[test]
    fn device_path_requires_feature() {
        let config = WebcamConfig::default();
        let result = WebcamSource::new(config);
        #[cfg(not(feature = "capture-v4l2"))]
        assert!(result.is_err());
        #[cfg(feature = "capture-v4l2")]
        assert!(result.is_ok());
    }
}
