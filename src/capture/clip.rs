//! Image-clip frame source.
//!
//! This module provides `ClipSource` for playing a directory of still images
//! (jpg/jpeg/png, sorted by file name) as a finite frame stream. It exists so
//! sessions can run against recorded clips, and so end-of-stream handling has
//! a real-file path.
//!
//! The clip source MUST NOT:
//! - Loop playback on its own
//! - Skip frames that fail to decode (a bad frame is an acquisition error)

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use super::FrameSource;
use crate::frame::Frame;

/// Configuration for a clip source.
#[derive(Clone, Debug, Default)]
pub struct ClipConfig {
    /// Directory holding the clip's frames as still images.
    pub dir: String,
}

/// Image-directory frame source.
pub struct ClipSource {
    config: ClipConfig,
    frames: Vec<PathBuf>,
    cursor: usize,
    connected: bool,
}

impl ClipSource {
    pub fn new(config: ClipConfig) -> Self {
        Self {
            config,
            frames: Vec::new(),
            cursor: 0,
            connected: false,
        }
    }

    /// Frames left to play, once connected.
    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }
}

impl FrameSource for ClipSource {
    fn name(&self) -> &str {
        &self.config.dir
    }

    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.config.dir)
            .with_context(|| format!("read clip directory {}", self.config.dir))?;

        let mut frames = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            if matches!(ext.as_deref(), Some("jpg") | Some("jpeg") | Some("png")) {
                frames.push(path);
            }
        }
        frames.sort();

        if frames.is_empty() {
            return Err(anyhow!(
                "clip directory {} has no jpg/jpeg/png frames",
                self.config.dir
            ));
        }

        log::info!(
            "ClipSource: loaded {} frames from {}",
            frames.len(),
            self.config.dir
        );
        self.frames = frames;
        self.cursor = 0;
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("clip source not connected"));
        }
        let Some(path) = self.frames.get(self.cursor) else {
            return Ok(None);
        };

        let image =
            image::open(path).with_context(|| format!("decode clip frame {}", path.display()))?;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        self.cursor += 1;

        Ok(Some(Frame::new(rgb.into_raw(), width, height)))
    }
}
