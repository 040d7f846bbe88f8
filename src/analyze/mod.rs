//! Frame analysis: face gating and emotion classification.
//!
//! This module provides the two seams a watch session analyzes frames
//! through, plus the backends that implement them:
//! - `FaceDetector`: is a face in view at all?
//! - `EmotionClassifier`: score the seven emotion categories for a frame
//!
//! Backends are pluggable: scripted stubs for tests and demos, luminance
//! heuristics that decode synthetic frames, and an ONNX classifier behind
//! the `backend-tract` feature. The crate-private `AnalysisWorker` runs
//! both seams for one frame on a dedicated thread so every per-frame
//! analysis gets a hard timeout.

mod backend;
pub mod backends;
mod result;
pub(crate) mod worker;

pub use backend::{EmotionClassifier, FaceDetector};
#[cfg(feature = "backend-tract")]
pub use backends::TractEmotionClassifier;
pub use backends::{
    LumaEmotionClassifier, LumaFaceDetector, StubEmotionClassifier, StubFaceDetector, StubStep,
};
pub use result::{EmotionReading, EmotionScores};
