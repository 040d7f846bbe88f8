//! mood-watch
//!
//! This crate implements a webcam emotion stability watcher: it samples a
//! video source, gates each frame on face presence, classifies the face into
//! one of seven emotion categories, and debounces the per-frame labels into
//! stabilized events delivered through a callback.
//!
//! # Architecture
//!
//! The watch loop enforces a small set of rules by construction:
//!
//! 1. **Debounce**: a label must hold for a minimum duration before it fires.
//! 2. **Restart on change**: any label change restarts the hold timer.
//! 3. **Cooldown**: after an emission, nothing fires again until the cooldown
//!    has passed, no matter how labels churn in between.
//! 4. **Failure isolation**: per-frame analysis failures, analysis timeouts
//!    and callback errors are logged and counted, never fatal to the session.
//! 5. **Bounded exit**: cancellation is observed once per iteration and the
//!    source handle is released on every exit path.
//!
//! # Module Structure
//!
//! - `frame`: RGB frame container
//! - `capture`: frame sources (synthetic webcam, V4L2 device, image clips)
//! - `analyze`: face gate + emotion classifier seams and their backends
//! - `stability`: the pure debounce state machine
//! - `watch`: the blocking session loop, cancellation, spawn handle
//! - `config`: layered daemon configuration

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

pub mod analyze;
pub mod capture;
pub mod config;
pub mod frame;
pub mod stability;
pub mod watch;

#[cfg(feature = "backend-tract")]
pub use analyze::TractEmotionClassifier;
pub use analyze::{
    EmotionClassifier, EmotionReading, EmotionScores, FaceDetector, LumaEmotionClassifier,
    LumaFaceDetector, StubEmotionClassifier, StubFaceDetector, StubStep,
};
#[cfg(feature = "capture-clip")]
pub use capture::{clip::ClipConfig, ClipSource};
pub use capture::{webcam::WebcamConfig, FrameSource, Scene, WebcamSource};
pub use frame::Frame;
pub use stability::{
    NoFacePolicy, StabilityConfig, StabilityTracker, StableEmotion, DEFAULT_COOLDOWN, DEFAULT_HOLD,
};
pub use watch::{
    CancelToken, EmotionWatcher, SessionEnd, SessionSummary, WatchHandle, WatcherConfig,
};

// -------------------- Emotion Labels --------------------

/// The closed set of emotion categories a classifier reports.
///
/// Score vectors are indexed by `index()`, so the declaration order is part
/// of the contract: `EmotionScores` arrays and the synthetic luminance bands
/// both follow it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    pub const COUNT: usize = 7;

    /// All labels in declaration (index) order.
    pub const ALL: [EmotionLabel; Self::COUNT] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Angry => "angry",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Neutral => "neutral",
        }
    }

    /// Position in `ALL`, used to address score arrays.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmotionLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "angry" => Ok(EmotionLabel::Angry),
            "disgust" => Ok(EmotionLabel::Disgust),
            "fear" => Ok(EmotionLabel::Fear),
            "happy" => Ok(EmotionLabel::Happy),
            "sad" => Ok(EmotionLabel::Sad),
            "surprise" => Ok(EmotionLabel::Surprise),
            "neutral" => Ok(EmotionLabel::Neutral),
            other => Err(anyhow!("unknown emotion label: {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn label_index_matches_all_order() {
        for (i, label) in EmotionLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
        }
    }

    #[test]
    fn label_round_trips_through_str() {
        for label in EmotionLabel::ALL {
            let parsed = EmotionLabel::from_str(label.as_str()).unwrap();
            assert_eq!(parsed, label);
        }
    }

    #[test]
    fn label_parse_is_case_insensitive() {
        assert_eq!(
            EmotionLabel::from_str("Happy").unwrap(),
            EmotionLabel::Happy
        );
        assert_eq!(
            EmotionLabel::from_str(" NEUTRAL ").unwrap(),
            EmotionLabel::Neutral
        );
    }

    #[test]
    fn label_parse_rejects_unknown() {
        assert!(EmotionLabel::from_str("bored").is_err());
    }
}
