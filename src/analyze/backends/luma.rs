use anyhow::{anyhow, Result};

use crate::analyze::backend::{EmotionClassifier, FaceDetector};
use crate::analyze::result::EmotionScores;
use crate::capture::webcam::{SYNTHETIC_BAND_BASE, SYNTHETIC_BAND_STEP};
use crate::EmotionLabel;

/// Default mean-luminance threshold separating "face in view" from an
/// empty backdrop, halfway between the synthetic empty level and the
/// first label band.
pub const DEFAULT_FACE_LUMA_THRESHOLD: f32 = 48.0;

fn mean_luma(pixels: &[u8], width: u32, height: u32) -> Result<f32> {
    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        return Err(anyhow!(
            "pixel buffer size {} does not match {}x{} rgb frame",
            pixels.len(),
            width,
            height
        ));
    }
    if pixels.is_empty() {
        return Err(anyhow!("empty frame"));
    }
    let sum: u64 = pixels.iter().map(|&p| p as u64).sum();
    Ok(sum as f32 / pixels.len() as f32)
}

/// Face gate driven by mean luminance.
///
/// Decodes the synthetic scene scheme; on real footage it is only a
/// stand-in for a proper face model.
pub struct LumaFaceDetector {
    threshold: f32,
}

impl LumaFaceDetector {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_FACE_LUMA_THRESHOLD,
        }
    }

    pub fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for LumaFaceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceDetector for LumaFaceDetector {
    fn name(&self) -> &'static str {
        "luma"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<bool> {
        Ok(mean_luma(pixels, width, height)? >= self.threshold)
    }
}

/// Classifier driven by mean-luminance banding.
///
/// Maps the frame's mean luminance to the nearest label band; the winner's
/// confidence falls off toward the band edge and the remainder spills onto
/// the adjacent bands.
#[derive(Default)]
pub struct LumaEmotionClassifier;

impl LumaEmotionClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl EmotionClassifier for LumaEmotionClassifier {
    fn name(&self) -> &'static str {
        "luma"
    }

    fn classify(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<EmotionScores> {
        let luma = mean_luma(pixels, width, height)?;
        let base = SYNTHETIC_BAND_BASE as f32;
        let step = SYNTHETIC_BAND_STEP as f32;

        // Position on the band axis: 0.0 at the first band center.
        let position = (luma - base) / step;
        let index = position.round().clamp(0.0, (EmotionLabel::COUNT - 1) as f32) as usize;
        let distance = (position - index as f32).abs().min(1.0);
        let label = EmotionLabel::ALL[index];

        let winner = (1.0 - distance).clamp(0.5, 1.0);
        let spill = (1.0 - winner) / 2.0;

        let mut scores = EmotionScores::new();
        scores.set(label, winner);
        if index > 0 {
            scores.set(EmotionLabel::ALL[index - 1], spill);
        }
        if index + 1 < EmotionLabel::COUNT {
            scores.set(EmotionLabel::ALL[index + 1], spill);
        }
        Ok(scores)
    }
}
