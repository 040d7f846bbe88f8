//! Emotion stability tracking.
//!
//! `StabilityTracker` debounces a stream of per-frame emotion readings into
//! stabilized events. It is a pure state machine: callers supply the clock,
//! so behavior is fully deterministic under test.
//!
//! Rules:
//! - A label must hold for `hold` before it fires; any label change
//!   restarts the timer from the change instant.
//! - A fire opens the `cooldown` window. The window is anchored to the fire
//!   instant and survives streak resets, so label churn can never shorten
//!   it.
//! - Firing re-arms the streak, so one continuously-held label emits once
//!   per cooldown interval (or hold interval, when that is longer).
//! - Faceless frames follow `NoFacePolicy`: `Hold` leaves the streak
//!   untouched, `Reset` clears it (never the cooldown).

use std::time::{Duration, Instant};

use crate::analyze::EmotionReading;
use crate::EmotionLabel;

/// Default minimum duration a label must hold before it fires.
pub const DEFAULT_HOLD: Duration = Duration::from_secs(3);
/// Default minimum interval between two emissions.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

/// What a faceless frame does to the current streak.
///
/// `Hold` matches a subject glancing away: the streak neither advances nor
/// resets, and because the streak clock is wall time, a long faceless gap
/// followed by the same label can fire immediately. `Reset` treats a face
/// leaving as the end of the streak.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoFacePolicy {
    #[default]
    Hold,
    Reset,
}

impl NoFacePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoFacePolicy::Hold => "hold",
            NoFacePolicy::Reset => "reset",
        }
    }
}

impl std::fmt::Display for NoFacePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NoFacePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hold" => Ok(NoFacePolicy::Hold),
            "reset" => Ok(NoFacePolicy::Reset),
            other => Err(anyhow::anyhow!(
                "unknown no-face policy '{other}' (expected hold or reset)"
            )),
        }
    }
}

/// Tunables for the stability state machine.
#[derive(Clone, Copy, Debug)]
pub struct StabilityConfig {
    /// Minimum duration a label must hold before it fires.
    pub hold: Duration,
    /// Minimum interval between two emissions.
    pub cooldown: Duration,
    /// Faceless-frame handling.
    pub no_face: NoFacePolicy,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            hold: DEFAULT_HOLD,
            cooldown: DEFAULT_COOLDOWN,
            no_face: NoFacePolicy::default(),
        }
    }
}

/// One stabilized emotion emission.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StableEmotion {
    pub label: EmotionLabel,
    /// Confidence of the reading that completed the hold.
    pub confidence: f32,
    /// How long the label had been held when the event fired, measured
    /// from the streak's last (re)arm point.
    pub held: Duration,
}

/// Debounces per-frame readings into `StableEmotion` events.
pub struct StabilityTracker {
    config: StabilityConfig,
    last_emotion: Option<EmotionLabel>,
    stable_since: Option<Instant>,
    suppressed_until: Option<Instant>,
}

impl StabilityTracker {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            last_emotion: None,
            stable_since: None,
            suppressed_until: None,
        }
    }

    /// Feed one successful classification.
    ///
    /// Returns the stabilized event when this reading completes the hold
    /// outside the cooldown window. Comparisons are inclusive: a streak
    /// fires on the first observation at or past `hold`, and the cooldown
    /// ends at its boundary instant.
    pub fn observe(&mut self, reading: EmotionReading, now: Instant) -> Option<StableEmotion> {
        match (self.last_emotion, self.stable_since) {
            (Some(last), Some(since)) if last == reading.label => {
                let held = now.duration_since(since);
                if held >= self.config.hold && !self.in_cooldown(now) {
                    self.suppressed_until = Some(now + self.config.cooldown);
                    self.stable_since = Some(now);
                    return Some(StableEmotion {
                        label: reading.label,
                        confidence: reading.confidence,
                        held,
                    });
                }
                None
            }
            _ => {
                self.last_emotion = Some(reading.label);
                self.stable_since = Some(now);
                None
            }
        }
    }

    /// Feed one frame with no face in view.
    pub fn observe_absent(&mut self, _now: Instant) {
        if self.config.no_face == NoFacePolicy::Reset {
            self.reset();
        }
    }

    /// Clear the streak. The cooldown window survives.
    pub fn reset(&mut self) {
        self.last_emotion = None;
        self.stable_since = None;
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.suppressed_until.is_some_and(|until| now < until)
    }

    /// The label currently being held and when its streak started, if any.
    pub fn current_streak(&self) -> Option<(EmotionLabel, Instant)> {
        match (self.last_emotion, self.stable_since) {
            (Some(label), Some(since)) => Some((label, since)),
            _ => None,
        }
    }
}
