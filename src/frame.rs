//! RGB frame container.
//!
//! A `Frame` is one sample from a `FrameSource`: a tightly-packed RGB24
//! buffer plus its dimensions. Analyzers read pixels through `pixels()`;
//! nothing downstream mutates a frame after capture.

/// One captured RGB24 frame. `data.len()` is expected to be
/// `width * height * 3`; sources are responsible for producing
/// correctly-sized buffers and backends validate before inference.
pub struct Frame {
    data: Vec<u8>,

    /// Frame dimensions (analyzers may see these for inference setup).
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Tightly-packed RGB24 pixel data, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Expected buffer length for the frame's dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}
