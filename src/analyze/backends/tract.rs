#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::analyze::backend::EmotionClassifier;
use crate::analyze::result::EmotionScores;
use crate::EmotionLabel;

/// Tract-based emotion classifier for ONNX models.
///
/// Loads a local model file and performs inference on RGB frames. The model
/// is expected to produce at least `EmotionLabel::COUNT` scores in label
/// order; they are softmaxed into `EmotionScores`. This backend does not
/// perform any network I/O or write to disk beyond model loading.
pub struct TractEmotionClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
}

impl TractEmotionClassifier {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn extract_scores(&self, outputs: TVec<TValue>) -> Result<EmotionScores> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let logits: Vec<f32> = view.iter().cloned().take(EmotionLabel::COUNT).collect();
        if logits.len() != EmotionLabel::COUNT {
            return Err(anyhow!(
                "model produced {} scores, expected at least {}",
                logits.len(),
                EmotionLabel::COUNT
            ));
        }

        let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() {
            return Err(anyhow!("model produced non-finite scores"));
        }

        let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
        let total: f32 = exps.iter().sum();
        Ok(EmotionLabel::ALL
            .iter()
            .zip(exps)
            .map(|(&label, e)| (label, e / total))
            .collect())
    }
}

impl EmotionClassifier for TractEmotionClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classify(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<EmotionScores> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_scores(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let zeros = Tensor::zero::<f32>(&[1, 3, self.height as usize, self.width as usize])?;
        self.model
            .run(tvec!(zeros.into()))
            .context("ONNX warm-up inference failed")?;
        Ok(())
    }
}
