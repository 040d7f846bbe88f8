use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::analyze::backend::{EmotionClassifier, FaceDetector};
use crate::analyze::result::EmotionScores;
use crate::EmotionLabel;

/// Scripted face gate for tests and demos. Pops one answer per call and
/// falls back to `default_present` when the script runs out.
pub struct StubFaceDetector {
    script: VecDeque<bool>,
    default_present: bool,
}

impl StubFaceDetector {
    pub fn always(present: bool) -> Self {
        Self {
            script: VecDeque::new(),
            default_present: present,
        }
    }

    pub fn scripted(script: Vec<bool>, default_present: bool) -> Self {
        Self {
            script: script.into_iter().collect(),
            default_present,
        }
    }
}

impl FaceDetector for StubFaceDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<bool> {
        Ok(self.script.pop_front().unwrap_or(self.default_present))
    }
}

/// One scripted classifier step.
#[derive(Clone, Copy, Debug)]
pub enum StubStep {
    /// Classify as `label` with the given confidence.
    Label(EmotionLabel, f32),
    /// Fail this call with a classifier error.
    Fail,
}

/// Scripted classifier. Pops one step per call and falls back to the
/// default label when the script runs out.
pub struct StubEmotionClassifier {
    script: VecDeque<StubStep>,
    default_label: EmotionLabel,
}

impl StubEmotionClassifier {
    pub fn fixed(label: EmotionLabel) -> Self {
        Self {
            script: VecDeque::new(),
            default_label: label,
        }
    }

    pub fn scripted(script: Vec<StubStep>, default_label: EmotionLabel) -> Self {
        Self {
            script: script.into_iter().collect(),
            default_label,
        }
    }
}

impl EmotionClassifier for StubEmotionClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<EmotionScores> {
        let step = self
            .script
            .pop_front()
            .unwrap_or(StubStep::Label(self.default_label, 0.9));
        match step {
            StubStep::Label(label, confidence) => {
                let mut scores = EmotionScores::new();
                scores.set(label, confidence);
                Ok(scores)
            }
            StubStep::Fail => Err(anyhow!("scripted classifier failure")),
        }
    }
}
