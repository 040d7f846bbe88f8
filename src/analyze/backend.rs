use anyhow::Result;

use crate::analyze::result::EmotionScores;

/// Face-presence gate for one frame.
///
/// Implementations must treat the pixel slice as read-only and ephemeral.
/// Calls should return promptly: the analysis worker can time a call out
/// from the session's point of view, but it cannot interrupt one, so a
/// backend that never returns wedges its worker thread.
pub trait FaceDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when a face is in view.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<bool>;

    /// Optional warm-up hook, called once at session start.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Per-frame emotion scoring.
///
/// Same contract as `FaceDetector`: read-only pixels, prompt returns.
/// A call error is a recoverable per-frame failure, never a session error.
pub trait EmotionClassifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Score the emotion categories for the face in the frame.
    fn classify(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<EmotionScores>;

    /// Optional warm-up hook, called once at session start.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
