//! Watch session loop.
//!
//! This module is responsible for:
//! - Driving the acquire / detect / classify / stabilize cycle
//! - Cooperative cancellation via `CancelToken`
//! - Session accounting (`SessionSummary`)
//!
//! This module MUST NOT:
//! - Block shutdown on a wedged backend call (the analysis worker is
//!   detached instead)
//! - Let a callback or per-frame analysis error end the session
//!
//! The frame source is owned by the session and released by `Drop`, so
//! every exit path (cancellation, source exhaustion, error propagation)
//! releases the capture handle exactly once.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::analyze::worker::{Analysis, AnalysisWorker, AnalyzeOutcome};
use crate::analyze::{EmotionClassifier, FaceDetector};
use crate::capture::FrameSource;
use crate::stability::{StabilityConfig, StabilityTracker, StableEmotion};

/// Default upper bound on one face-detect + classify round trip.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
/// Pacing sleeps are sliced so cancellation stays prompt.
const PACING_SLICE: Duration = Duration::from_millis(20);

/// Shared cancellation flag for one watch session.
///
/// Clones observe the same flag. Each session takes its own token, so
/// cancelling one watcher never affects another.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct WatcherConfig {
    pub stability: StabilityConfig,
    /// Upper bound on one analysis round trip; overruns skip the frame.
    pub call_timeout: Duration,
    /// Minimum spacing between frame acquisitions. `None` runs the source
    /// at its own pace.
    pub min_frame_interval: Option<Duration>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability: StabilityConfig::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            min_frame_interval: None,
        }
    }
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// The cancellation token fired.
    Cancelled,
    /// The source returned end-of-stream or failed to produce a frame.
    SourceExhausted,
}

/// Accounting for one completed session.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct SessionSummary {
    pub frames: u64,
    pub no_face_frames: u64,
    pub classified_frames: u64,
    pub classification_failures: u64,
    pub analysis_timeouts: u64,
    pub busy_drops: u64,
    pub events: u64,
    pub callback_failures: u64,
    pub end: SessionEnd,
}

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    frames: u64,
    no_face_frames: u64,
    classified_frames: u64,
    classification_failures: u64,
    analysis_timeouts: u64,
    busy_drops: u64,
    events: u64,
    callback_failures: u64,
}

impl Counters {
    fn into_summary(self, end: SessionEnd) -> SessionSummary {
        SessionSummary {
            frames: self.frames,
            no_face_frames: self.no_face_frames,
            classified_frames: self.classified_frames,
            classification_failures: self.classification_failures,
            analysis_timeouts: self.analysis_timeouts,
            busy_drops: self.busy_drops,
            events: self.events,
            callback_failures: self.callback_failures,
            end,
        }
    }
}

/// One watch session over a frame source and an analysis backend pair.
pub struct EmotionWatcher {
    source: Box<dyn FrameSource>,
    face: Box<dyn FaceDetector>,
    classifier: Box<dyn EmotionClassifier>,
    config: WatcherConfig,
}

impl EmotionWatcher {
    pub fn new(
        source: Box<dyn FrameSource>,
        face: Box<dyn FaceDetector>,
        classifier: Box<dyn EmotionClassifier>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            source,
            face,
            classifier,
            config,
        }
    }

    /// Run the session on the calling thread until the token fires or the
    /// source runs out of frames.
    ///
    /// `on_stable` is invoked once per stabilized emotion. A callback error
    /// is logged and counted, never fatal. Connect and warm-up failures are
    /// fatal; per-frame analysis failures skip the frame.
    pub fn run<F>(mut self, token: CancelToken, mut on_stable: F) -> Result<SessionSummary>
    where
        F: FnMut(StableEmotion) -> Result<()>,
    {
        self.source.connect()?;
        self.face.warm_up()?;
        self.classifier.warm_up()?;
        log::info!(
            "watch session started: source={} face={} classifier={}",
            self.source.name(),
            self.face.name(),
            self.classifier.name()
        );

        let mut worker = AnalysisWorker::spawn(self.face, self.classifier, self.config.call_timeout);
        let mut tracker = StabilityTracker::new(self.config.stability);
        let mut counters = Counters::default();
        let mut last_health_log = Instant::now();
        let mut next_frame_at = Instant::now();

        let end = loop {
            if token.is_cancelled() {
                break Ok(SessionEnd::Cancelled);
            }

            if self.config.min_frame_interval.is_some() {
                let mut remaining = next_frame_at.saturating_duration_since(Instant::now());
                while remaining > Duration::ZERO {
                    std::thread::sleep(remaining.min(PACING_SLICE));
                    if token.is_cancelled() {
                        break;
                    }
                    remaining = next_frame_at.saturating_duration_since(Instant::now());
                }
                if token.is_cancelled() {
                    break Ok(SessionEnd::Cancelled);
                }
            }
            if let Some(interval) = self.config.min_frame_interval {
                next_frame_at = Instant::now() + interval;
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("frame source {} reached end of stream", self.source.name());
                    break Ok(SessionEnd::SourceExhausted);
                }
                Err(e) => {
                    log::warn!("frame acquisition failed: {e:#}");
                    break Ok(SessionEnd::SourceExhausted);
                }
            };
            counters.frames += 1;

            let outcome = match worker.analyze(frame) {
                Ok(outcome) => outcome,
                Err(e) => break Err(e),
            };
            let now = Instant::now();
            match outcome {
                AnalyzeOutcome::Done(Analysis::NoFace) => {
                    counters.no_face_frames += 1;
                    tracker.observe_absent(now);
                }
                AnalyzeOutcome::Done(Analysis::Scores(scores)) => match scores.dominant() {
                    Some(reading) => {
                        counters.classified_frames += 1;
                        if let Some(event) = tracker.observe(reading, now) {
                            counters.events += 1;
                            log::info!(
                                "stable emotion {} confidence={:.2} held={:.1}s",
                                event.label,
                                event.confidence,
                                event.held.as_secs_f64()
                            );
                            if let Err(e) = on_stable(event) {
                                counters.callback_failures += 1;
                                log::warn!("stable-emotion callback failed: {e:#}");
                            }
                        }
                    }
                    None => {
                        counters.classification_failures += 1;
                        log::warn!("classifier produced no usable scores; skipping frame");
                    }
                },
                AnalyzeOutcome::Done(Analysis::Failed(message)) => {
                    counters.classification_failures += 1;
                    log::warn!("analysis failed: {message}; skipping frame");
                }
                AnalyzeOutcome::TimedOut => {
                    counters.analysis_timeouts += 1;
                    log::warn!(
                        "analysis exceeded {:?}; skipping frame",
                        self.config.call_timeout
                    );
                }
                AnalyzeOutcome::Busy => {
                    counters.busy_drops += 1;
                    log::debug!("analysis worker busy; dropping frame");
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "capture health={} frames={} no_face={} events={}",
                    self.source.is_healthy(),
                    counters.frames,
                    counters.no_face_frames,
                    counters.events
                );
                last_health_log = Instant::now();
            }
        };

        worker.shutdown();
        let end = end?;
        log::info!(
            "watch session ended: {:?} after {} frames, {} events",
            end,
            counters.frames,
            counters.events
        );
        Ok(counters.into_summary(end))
    }

    /// Run the session on a background thread.
    pub fn spawn<F>(self, on_stable: F) -> WatchHandle
    where
        F: FnMut(StableEmotion) -> Result<()> + Send + 'static,
    {
        let token = CancelToken::new();
        let session_token = token.clone();
        let join = std::thread::spawn(move || self.run(session_token, on_stable));
        WatchHandle {
            token,
            join: Some(join),
        }
    }
}

/// Handle to a session started with [`EmotionWatcher::spawn`].
#[derive(Debug)]
pub struct WatchHandle {
    token: CancelToken,
    join: Option<JoinHandle<Result<SessionSummary>>>,
}

impl WatchHandle {
    /// Token for cancelling from another thread or a signal handler.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Cancel the session and wait for it to wind down.
    pub fn stop(mut self) -> Result<SessionSummary> {
        self.token.cancel();
        self.join_inner()
    }

    /// Wait for the session to end on its own.
    pub fn wait(mut self) -> Result<SessionSummary> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<SessionSummary> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("watch session thread panicked"))?,
            None => Err(anyhow!("watch session already joined")),
        }
    }
}
