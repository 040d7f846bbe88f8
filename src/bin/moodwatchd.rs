//! moodwatchd - emotion stability watcher daemon
//!
//! This daemon:
//! 1. Acquires frames from the configured capture device (or stub source)
//! 2. Gates each frame on face presence before classifying
//! 3. Debounces per-frame labels into stabilized emotion events
//! 4. Prints one JSON line per stabilized event on stdout

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use mood_watch::config::{AnalysisBackend, MoodwatchdConfig};
#[cfg(feature = "backend-tract")]
use mood_watch::TractEmotionClassifier;
use mood_watch::{
    CancelToken, EmotionClassifier, EmotionLabel, EmotionWatcher, FaceDetector,
    LumaEmotionClassifier, LumaFaceDetector, WatcherConfig, WebcamConfig, WebcamSource,
};

#[derive(Serialize)]
struct EventRecord {
    seq: u64,
    label: EmotionLabel,
    confidence: f32,
    held_ms: u64,
    unix_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = MoodwatchdConfig::load()?;
    log::info!(
        "moodwatchd {} starting: device={} backend={}",
        env!("CARGO_PKG_VERSION"),
        cfg.capture.device,
        cfg.backend
    );
    log::info!(
        "stability: hold={}ms cooldown={}ms no_face={}",
        cfg.stability.hold.as_millis(),
        cfg.stability.cooldown.as_millis(),
        cfg.stability.no_face
    );

    let source = WebcamSource::new(WebcamConfig {
        device: cfg.capture.device.clone(),
        target_fps: cfg.capture.target_fps,
        width: cfg.capture.width,
        height: cfg.capture.height,
    })?;
    let (face, classifier) = build_backends(&cfg)?;

    let watcher_config = WatcherConfig {
        stability: cfg.stability,
        call_timeout: cfg.call_timeout,
        min_frame_interval: Some(cfg.frame_interval()),
    };
    let watcher = EmotionWatcher::new(Box::new(source), face, classifier, watcher_config);

    let token = CancelToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .expect("error setting Ctrl-C handler");

    let mut seq = 0u64;
    let summary = watcher.run(token, |event| {
        seq += 1;
        let record = EventRecord {
            seq,
            label: event.label,
            confidence: event.confidence,
            held_ms: event.held.as_millis() as u64,
            unix_ms: unix_millis()?,
        };
        println!("{}", serde_json::to_string(&record)?);
        Ok(())
    })?;

    log::info!(
        "moodwatchd exiting: {:?} after {} frames ({} events, {} no-face, {} skipped)",
        summary.end,
        summary.frames,
        summary.events,
        summary.no_face_frames,
        summary.classification_failures + summary.analysis_timeouts + summary.busy_drops
    );
    Ok(())
}

fn build_backends(
    cfg: &MoodwatchdConfig,
) -> Result<(Box<dyn FaceDetector>, Box<dyn EmotionClassifier>)> {
    match cfg.backend {
        AnalysisBackend::Luma => Ok((
            Box::new(LumaFaceDetector::new()),
            Box::new(LumaEmotionClassifier::default()),
        )),
        #[cfg(feature = "backend-tract")]
        AnalysisBackend::Tract => {
            let model_path = cfg
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("the tract backend requires a model_path"))?;
            let classifier =
                TractEmotionClassifier::new(model_path, cfg.capture.width, cfg.capture.height)?;
            Ok((Box::new(LumaFaceDetector::new()), Box::new(classifier)))
        }
        #[cfg(not(feature = "backend-tract"))]
        AnalysisBackend::Tract => Err(anyhow!(
            "moodwatchd was built without the backend-tract feature"
        )),
    }
}

fn unix_millis() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64)
}
