//! demo - end-to-end synthetic run for the emotion stability watcher
//!
//! Plays a scripted story against the synthetic webcam source: a neutral
//! settle, a happy hold, a surprise blip too short to stabilize, a happy
//! return, a faceless gap, and a sad finale. No devices, no models, no
//! network.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;

use mood_watch::{
    CancelToken, EmotionLabel, EmotionWatcher, LumaEmotionClassifier, LumaFaceDetector,
    NoFacePolicy, Scene, StabilityConfig, WatcherConfig, WebcamConfig, WebcamSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Cap the run at this many seconds (0 = run the story to its end).
    #[arg(long, default_value_t = 0)]
    seconds: u64,
    /// Frames per second for the synthetic source.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Hold duration in milliseconds before an emotion stabilizes.
    #[arg(long, default_value_t = 600)]
    hold_ms: u64,
    /// Cooldown in milliseconds between stabilized emissions.
    #[arg(long, default_value_t = 1500)]
    cooldown_ms: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    if args.hold_ms == 0 {
        return Err(anyhow!("hold-ms must be >= 1"));
    }

    let interval = Duration::from_secs(1) / args.fps;
    let interval_ms = interval.as_millis().max(1) as u64;
    let frames_for = |ms: u64| ((ms + interval_ms - 1) / interval_ms).max(1) as u32;

    // Act lengths derive from the debounce parameters so every act lands
    // exactly one emission (or, for the blip and the gap, none).
    let settle = frames_for(args.hold_ms * 2);
    let act = frames_for(args.hold_ms + args.cooldown_ms);
    let blip = frames_for(args.hold_ms / 2);
    let gap = frames_for(args.hold_ms);

    stage("scripted story: neutral, happy, surprise blip, happy, faceless gap, sad");
    let story = vec![
        (Scene::with_face(EmotionLabel::Neutral), settle),
        (Scene::with_face(EmotionLabel::Happy), act),
        (Scene::with_face(EmotionLabel::Surprise), blip),
        (Scene::with_face(EmotionLabel::Happy), act),
        (Scene::empty(), gap),
        (Scene::with_face(EmotionLabel::Sad), act),
    ];
    let total_frames: u32 = story.iter().map(|(_, frames)| *frames).sum();

    let source = WebcamSource::scripted(
        WebcamConfig {
            device: "stub://demo".to_string(),
            target_fps: args.fps,
            width: 320,
            height: 240,
        },
        story,
    );

    let watcher = EmotionWatcher::new(
        Box::new(source),
        Box::new(LumaFaceDetector::new()),
        Box::new(LumaEmotionClassifier::default()),
        WatcherConfig {
            stability: StabilityConfig {
                hold: Duration::from_millis(args.hold_ms),
                cooldown: Duration::from_millis(args.cooldown_ms),
                no_face: NoFacePolicy::Hold,
            },
            min_frame_interval: Some(interval),
            ..WatcherConfig::default()
        },
    );

    let token = CancelToken::new();
    if args.seconds > 0 {
        let cap_token = token.clone();
        let cap = Duration::from_secs(args.seconds);
        std::thread::spawn(move || {
            std::thread::sleep(cap);
            cap_token.cancel();
        });
    }

    stage(&format!(
        "watching {} frames at {} fps (hold={}ms cooldown={}ms)",
        total_frames, args.fps, args.hold_ms, args.cooldown_ms
    ));
    let mut shown = 0u64;
    let summary = watcher.run(token, |event| {
        shown += 1;
        println!(
            "stable #{}: {} after {:.1}s (confidence {:.2})",
            shown,
            event.label,
            event.held.as_secs_f64(),
            event.confidence
        );
        Ok(())
    })?;

    println!("demo summary:");
    println!("  frames processed: {}", summary.frames);
    println!("  no-face frames: {}", summary.no_face_frames);
    println!("  classified frames: {}", summary.classified_frames);
    println!("  stabilized events: {}", summary.events);
    println!("  end: {:?}", summary.end);
    println!("next steps:");
    println!("  cargo run --bin moodwatchd");
    println!("  MOODWATCH_HOLD_MS=1000 cargo run --bin moodwatchd");

    if summary.events == 0 {
        return Err(anyhow!("scripted story produced no stabilized events"));
    }
    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
