use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::stability::{NoFacePolicy, StabilityConfig, DEFAULT_COOLDOWN, DEFAULT_HOLD};
use crate::watch::DEFAULT_CALL_TIMEOUT;

const DEFAULT_DEVICE: &str = "stub://desk";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct MoodwatchdConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    capture: Option<CaptureConfigFile>,
    stability: Option<StabilityConfigFile>,
    analysis: Option<AnalysisConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct StabilityConfigFile {
    hold_ms: Option<u64>,
    cooldown_ms: Option<u64>,
    no_face: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AnalysisConfigFile {
    call_timeout_ms: Option<u64>,
}

/// Which classifier stack the daemon builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnalysisBackend {
    /// Luminance-band heuristic; works against the synthetic sources.
    #[default]
    Luma,
    /// ONNX emotion model via tract.
    Tract,
}

impl AnalysisBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisBackend::Luma => "luma",
            AnalysisBackend::Tract => "tract",
        }
    }
}

impl std::fmt::Display for AnalysisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "luma" => Ok(AnalysisBackend::Luma),
            "tract" => Ok(AnalysisBackend::Tract),
            other => Err(anyhow!(
                "unknown analysis backend '{other}' (expected luma or tract)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MoodwatchdConfig {
    pub backend: AnalysisBackend,
    pub model_path: Option<PathBuf>,
    pub capture: CaptureSettings,
    pub stability: StabilityConfig,
    pub call_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub device: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl MoodwatchdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MOODWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MoodwatchdConfigFile) -> Result<Self> {
        let backend = match file.backend {
            Some(raw) => raw.parse()?,
            None => AnalysisBackend::default(),
        };
        let model_path = file.model_path;
        let capture = CaptureSettings {
            device: file
                .capture
                .as_ref()
                .and_then(|capture| capture.device.clone())
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            target_fps: file
                .capture
                .as_ref()
                .and_then(|capture| capture.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
            width: file
                .capture
                .as_ref()
                .and_then(|capture| capture.width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            height: file
                .capture
                .as_ref()
                .and_then(|capture| capture.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
        };
        let no_face = match file.stability.as_ref().and_then(|s| s.no_face.clone()) {
            Some(raw) => raw.parse()?,
            None => NoFacePolicy::default(),
        };
        let stability = StabilityConfig {
            hold: file
                .stability
                .as_ref()
                .and_then(|s| s.hold_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_HOLD),
            cooldown: file
                .stability
                .as_ref()
                .and_then(|s| s.cooldown_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_COOLDOWN),
            no_face,
        };
        let call_timeout = file
            .analysis
            .and_then(|analysis| analysis.call_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CALL_TIMEOUT);
        Ok(Self {
            backend,
            model_path,
            capture,
            stability,
            call_timeout,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("MOODWATCH_DEVICE") {
            if !device.trim().is_empty() {
                self.capture.device = device;
            }
        }
        if let Ok(fps) = std::env::var("MOODWATCH_TARGET_FPS") {
            let parsed: u32 = fps
                .parse()
                .map_err(|_| anyhow!("MOODWATCH_TARGET_FPS must be an integer"))?;
            self.capture.target_fps = parsed;
        }
        if let Ok(hold) = std::env::var("MOODWATCH_HOLD_MS") {
            let millis: u64 = hold.parse().map_err(|_| {
                anyhow!("MOODWATCH_HOLD_MS must be an integer number of milliseconds")
            })?;
            self.stability.hold = Duration::from_millis(millis);
        }
        if let Ok(cooldown) = std::env::var("MOODWATCH_COOLDOWN_MS") {
            let millis: u64 = cooldown.parse().map_err(|_| {
                anyhow!("MOODWATCH_COOLDOWN_MS must be an integer number of milliseconds")
            })?;
            self.stability.cooldown = Duration::from_millis(millis);
        }
        if let Ok(policy) = std::env::var("MOODWATCH_NO_FACE") {
            if !policy.trim().is_empty() {
                self.stability.no_face = policy.parse()?;
            }
        }
        if let Ok(backend) = std::env::var("MOODWATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend.parse()?;
            }
        }
        if let Ok(path) = std::env::var("MOODWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(timeout) = std::env::var("MOODWATCH_CALL_TIMEOUT_MS") {
            let millis: u64 = timeout.parse().map_err(|_| {
                anyhow!("MOODWATCH_CALL_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.call_timeout = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.capture.device.trim().is_empty() {
            return Err(anyhow!("capture device must not be empty"));
        }
        if self.capture.target_fps == 0 {
            return Err(anyhow!("target_fps must be greater than zero"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("frame dimensions must be greater than zero"));
        }
        if self.stability.hold.is_zero() {
            return Err(anyhow!("stability hold must be greater than zero"));
        }
        if self.call_timeout.is_zero() {
            return Err(anyhow!("analysis call timeout must be greater than zero"));
        }
        if self.backend == AnalysisBackend::Tract && self.model_path.is_none() {
            return Err(anyhow!("the tract backend requires a model_path"));
        }
        Ok(())
    }

    /// Frame pacing interval derived from the target rate. A zero rate is
    /// clamped to one frame per second.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.capture.target_fps.max(1)
    }
}

fn read_config_file(path: &Path) -> Result<MoodwatchdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
