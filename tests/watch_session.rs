use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mood_watch::{
    CancelToken, EmotionLabel, EmotionWatcher, Frame, FrameSource, LumaEmotionClassifier,
    LumaFaceDetector, Scene, SessionEnd, StabilityConfig, StubEmotionClassifier, StubFaceDetector,
    StubStep, WatcherConfig, WebcamConfig, WebcamSource,
};

/// Short debounce windows so sessions finish quickly; margins are generous
/// relative to scheduler jitter.
fn fast_config(hold_ms: u64, cooldown_ms: u64, interval_ms: u64) -> WatcherConfig {
    WatcherConfig {
        stability: StabilityConfig {
            hold: Duration::from_millis(hold_ms),
            cooldown: Duration::from_millis(cooldown_ms),
            ..StabilityConfig::default()
        },
        min_frame_interval: Some(Duration::from_millis(interval_ms)),
        ..WatcherConfig::default()
    }
}

fn small_webcam(device: &str) -> WebcamConfig {
    WebcamConfig {
        device: device.to_string(),
        target_fps: 25,
        width: 320,
        height: 240,
    }
}

/// Counts drops so tests can assert the capture handle is released exactly
/// once per session.
struct TrackedSource {
    inner: WebcamSource,
    drops: Arc<AtomicUsize>,
}

impl FrameSource for TrackedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn connect(&mut self) -> Result<()> {
        self.inner.connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.inner.next_frame()
    }

    fn is_healthy(&self) -> bool {
        self.inner.is_healthy()
    }
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Produces blank frames then fails, as an unplugged camera would.
struct FailingSource {
    produced: u32,
    fail_after: u32,
    drops: Arc<AtomicUsize>,
}

impl FrameSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.produced >= self.fail_after {
            return Err(anyhow!("camera unplugged"));
        }
        self.produced += 1;
        Ok(Some(Frame::new(vec![100; 300], 10, 10)))
    }
}

impl Drop for FailingSource {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn scripted_story_debounces_into_ordered_events() -> Result<()> {
    // Neutral settles and fires; a one-frame surprise blip can never
    // complete a hold; happy fires once its own hold and the cooldown
    // from the neutral emission have both passed.
    let story = vec![
        (Scene::with_face(EmotionLabel::Neutral), 10),
        (Scene::with_face(EmotionLabel::Surprise), 1),
        (Scene::with_face(EmotionLabel::Happy), 30),
    ];
    let source = WebcamSource::scripted(small_webcam("stub://story"), story);
    let watcher = EmotionWatcher::new(
        Box::new(source),
        Box::new(LumaFaceDetector::new()),
        Box::new(LumaEmotionClassifier::default()),
        fast_config(120, 400, 40),
    );

    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = events.clone();
    let summary = watcher.run(CancelToken::new(), move |event| {
        sink.lock().unwrap().push(event);
        Ok(())
    })?;

    assert_eq!(summary.end, SessionEnd::SourceExhausted);
    assert_eq!(summary.frames, 41);
    assert_eq!(summary.no_face_frames, 0);

    let events = events.lock().unwrap();
    assert!(events.len() >= 2, "expected at least two events");
    assert_eq!(events[0].label, EmotionLabel::Neutral);
    assert_eq!(events[1].label, EmotionLabel::Happy);
    assert!(events.iter().all(|e| e.label != EmotionLabel::Surprise));
    assert!(events[0].held >= Duration::from_millis(120));
    Ok(())
}

#[test]
fn stop_cancels_a_spawned_session() -> Result<()> {
    let drops = Arc::new(AtomicUsize::new(0));
    let source = TrackedSource {
        inner: WebcamSource::new(small_webcam("stub://endless"))?,
        drops: drops.clone(),
    };
    let watcher = EmotionWatcher::new(
        Box::new(source),
        Box::new(LumaFaceDetector::new()),
        Box::new(LumaEmotionClassifier::default()),
        fast_config(50, 100, 10),
    );

    let handle = watcher.spawn(|_| Ok(()));
    std::thread::sleep(Duration::from_millis(250));
    let summary = handle.stop()?;

    assert_eq!(summary.end, SessionEnd::Cancelled);
    assert!(summary.frames > 0);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn acquisition_failure_ends_the_session_and_releases_the_source() -> Result<()> {
    let drops = Arc::new(AtomicUsize::new(0));
    let source = FailingSource {
        produced: 0,
        fail_after: 5,
        drops: drops.clone(),
    };
    let watcher = EmotionWatcher::new(
        Box::new(source),
        Box::new(StubFaceDetector::always(false)),
        Box::new(StubEmotionClassifier::fixed(EmotionLabel::Neutral)),
        WatcherConfig::default(),
    );

    let summary = watcher.run(CancelToken::new(), |_| Ok(()))?;

    assert_eq!(summary.end, SessionEnd::SourceExhausted);
    assert_eq!(summary.frames, 5);
    assert_eq!(summary.no_face_frames, 5);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn end_of_stream_releases_the_source_exactly_once() -> Result<()> {
    let drops = Arc::new(AtomicUsize::new(0));
    let source = TrackedSource {
        inner: WebcamSource::scripted(
            small_webcam("stub://short"),
            vec![(Scene::with_face(EmotionLabel::Neutral), 5)],
        ),
        drops: drops.clone(),
    };
    let watcher = EmotionWatcher::new(
        Box::new(source),
        Box::new(StubFaceDetector::always(true)),
        Box::new(StubEmotionClassifier::fixed(EmotionLabel::Neutral)),
        fast_config(10_000, 10_000, 5),
    );

    let summary = watcher.run(CancelToken::new(), |_| Ok(()))?;

    assert_eq!(summary.end, SessionEnd::SourceExhausted);
    assert_eq!(summary.frames, 5);
    assert_eq!(summary.classified_frames, 5);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn classification_failures_skip_frames_without_ending_the_streak() -> Result<()> {
    // Every other frame fails to classify; the survivors still complete
    // the hold because wall time, not sample count, drives the streak.
    let script = vec![
        StubStep::Label(EmotionLabel::Happy, 0.9),
        StubStep::Fail,
        StubStep::Label(EmotionLabel::Happy, 0.9),
        StubStep::Fail,
        StubStep::Label(EmotionLabel::Happy, 0.9),
        StubStep::Fail,
        StubStep::Label(EmotionLabel::Happy, 0.9),
        StubStep::Fail,
    ];
    let source = WebcamSource::scripted(
        small_webcam("stub://flaky"),
        vec![(Scene::with_face(EmotionLabel::Happy), 8)],
    );
    let watcher = EmotionWatcher::new(
        Box::new(source),
        Box::new(StubFaceDetector::always(true)),
        Box::new(StubEmotionClassifier::scripted(script, EmotionLabel::Happy)),
        fast_config(30, 10_000, 20),
    );

    let summary = watcher.run(CancelToken::new(), |event| {
        assert_eq!(event.label, EmotionLabel::Happy);
        Ok(())
    })?;

    assert_eq!(summary.end, SessionEnd::SourceExhausted);
    assert_eq!(summary.frames, 8);
    assert_eq!(summary.classified_frames, 4);
    assert_eq!(summary.classification_failures, 4);
    assert_eq!(summary.events, 1);
    Ok(())
}

#[test]
fn callback_errors_are_counted_not_fatal() -> Result<()> {
    let source = WebcamSource::scripted(
        small_webcam("stub://sink"),
        vec![(Scene::with_face(EmotionLabel::Sad), 10)],
    );
    let watcher = EmotionWatcher::new(
        Box::new(source),
        Box::new(StubFaceDetector::always(true)),
        Box::new(StubEmotionClassifier::fixed(EmotionLabel::Sad)),
        fast_config(30, 10_000, 15),
    );

    let summary = watcher.run(CancelToken::new(), |_| Err(anyhow!("sink broken")))?;

    assert_eq!(summary.end, SessionEnd::SourceExhausted);
    assert_eq!(summary.events, 1);
    assert_eq!(summary.callback_failures, 1);
    Ok(())
}

#[test]
fn faceless_frames_are_counted_and_skipped() -> Result<()> {
    let story = vec![
        (Scene::with_face(EmotionLabel::Happy), 4),
        (Scene::empty(), 3),
        (Scene::with_face(EmotionLabel::Happy), 4),
    ];
    let source = WebcamSource::scripted(small_webcam("stub://gaps"), story);
    let watcher = EmotionWatcher::new(
        Box::new(source),
        Box::new(LumaFaceDetector::new()),
        Box::new(LumaEmotionClassifier::default()),
        fast_config(60, 10_000, 15),
    );

    let summary = watcher.run(CancelToken::new(), |_| Ok(()))?;

    assert_eq!(summary.frames, 11);
    assert_eq!(summary.no_face_frames, 3);
    assert_eq!(summary.classified_frames, 8);
    // The default policy holds the streak across the gap, so happy fires
    // despite never being held for 60ms of contiguous samples.
    assert_eq!(summary.events, 1);
    Ok(())
}
