//! Frame capture sources.
//!
//! This module provides the sources a watch session samples frames from:
//! - Webcam devices via V4L2 (feature: capture-v4l2)
//! - Synthetic webcams (`stub://` device paths) for tests and demos
//! - Image-directory clips (feature: capture-clip)
//!
//! All sources produce `Frame` instances that flow into the analysis stage.
//! The capture layer is responsible for:
//! - Acquiring and releasing the underlying device handle
//! - Producing tightly-packed RGB24 buffers at the negotiated size
//! - Signaling end of stream with `Ok(None)`
//!
//! The capture layer MUST NOT:
//! - Retry a failed acquisition on its own
//! - Buffer frames beyond the one being handed off
//! - Log pixel content

use anyhow::Result;

use crate::frame::Frame;

#[cfg(feature = "capture-clip")]
pub mod clip;
pub mod webcam;

#[cfg(feature = "capture-clip")]
pub use clip::ClipSource;
pub use webcam::{Scene, WebcamSource};

/// A source of frames for one watch session.
///
/// Implementations own the device handle. Acquisition happens in `connect`,
/// release happens on drop, so every session exit path releases exactly once.
pub trait FrameSource: Send {
    /// Identifier used in logs (device path, directory, ...).
    fn name(&self) -> &str;

    /// Acquire the underlying handle. Called once at session start.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    ///
    /// `Ok(None)` means the stream has ended; an error means acquisition
    /// failed. The session treats both as terminal.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Liveness signal for periodic health logging.
    fn is_healthy(&self) -> bool {
        true
    }
}
