use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

use crate::detect::DetectorSettings;
use crate::ingest::CaptureConfig;
use crate::notify::{GateSettings, SmtpSettings};

const DEFAULT_SOURCE: &str = "0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_SNAPSHOT_DIR: &str = ".";

#[derive(Debug, Deserialize, Default)]
struct SentryConfigFile {
    capture: Option<CaptureConfigFile>,
    detection: Option<DetectionConfigFile>,
    notify: Option<NotifyConfigFile>,
    snapshot_dir: Option<PathBuf>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    sensitivity: Option<u8>,
    min_area: Option<f64>,
    dilate_iterations: Option<u8>,
    blur_kernel: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct NotifyConfigFile {
    enabled: Option<bool>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    sender: Option<String>,
    receiver: Option<String>,
    cooldown_secs: Option<u64>,
    retry_backoff_secs: Option<u64>,
    retry_backoff_max_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

/// Secret string that is wiped on drop and never printed.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub capture: CaptureConfig,
    pub detection: DetectorSettings,
    pub notify: NotifySettings,
    pub snapshot_dir: PathBuf,
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub enabled: bool,
    pub smtp: SmtpSettings,
    pub gate: GateSettings,
}

impl SentryConfig {
    /// File named by `MOTION_CONFIG` (if any), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MOTION_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentryConfigFile) -> Self {
        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureConfig {
            source: capture_file
                .source
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            width: capture_file.width.unwrap_or(DEFAULT_WIDTH),
            height: capture_file.height.unwrap_or(DEFAULT_HEIGHT),
            target_fps: capture_file.target_fps.unwrap_or(DEFAULT_FPS),
        };

        let defaults = DetectorSettings::default();
        let detection_file = file.detection.unwrap_or_default();
        let detection = DetectorSettings {
            sensitivity: detection_file.sensitivity.unwrap_or(defaults.sensitivity),
            min_area: detection_file.min_area.unwrap_or(defaults.min_area),
            dilate_iterations: detection_file
                .dilate_iterations
                .unwrap_or(defaults.dilate_iterations),
            blur_kernel: detection_file.blur_kernel.unwrap_or(defaults.blur_kernel),
        };

        let smtp_defaults = SmtpSettings::default();
        let gate_defaults = GateSettings::default();
        let notify_file = file.notify.unwrap_or_default();
        let notify = NotifySettings {
            enabled: notify_file.enabled.unwrap_or(true),
            smtp: SmtpSettings {
                host: notify_file.smtp_host.unwrap_or(smtp_defaults.host),
                port: notify_file.smtp_port.unwrap_or(smtp_defaults.port),
                sender: notify_file.sender,
                // Never read from disk; only from the environment.
                password: None,
                receiver: notify_file.receiver,
                timeout: notify_file
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(smtp_defaults.timeout),
            },
            gate: GateSettings {
                cooldown: notify_file
                    .cooldown_secs
                    .map(Duration::from_secs)
                    .unwrap_or(gate_defaults.cooldown),
                retry_backoff: notify_file
                    .retry_backoff_secs
                    .map(Duration::from_secs)
                    .unwrap_or(gate_defaults.retry_backoff),
                retry_backoff_max: notify_file
                    .retry_backoff_max_secs
                    .map(Duration::from_secs)
                    .unwrap_or(gate_defaults.retry_backoff_max),
            },
        };

        Self {
            capture,
            detection,
            notify,
            snapshot_dir: file
                .snapshot_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            font_path: file.font_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(sender) = env_non_empty("SENDER_EMAIL") {
            self.notify.smtp.sender = Some(sender);
        }
        if let Some(password) = env_non_empty("SENDER_PASSWORD") {
            self.notify.smtp.password = Some(Secret::new(password));
        }
        if let Some(receiver) = env_non_empty("RECEIVER_EMAIL") {
            self.notify.smtp.receiver = Some(receiver);
        }
        if let Some(source) = env_non_empty("MOTION_SOURCE") {
            self.capture.source = source;
        }
        if let Some(host) = env_non_empty("MOTION_SMTP_HOST") {
            self.notify.smtp.host = host;
        }
        if let Some(port) = env_parse::<u16>("MOTION_SMTP_PORT", "a TCP port number")? {
            self.notify.smtp.port = port;
        }
        if let Some(sensitivity) = env_parse::<u8>("MOTION_SENSITIVITY", "an integer 0-255")? {
            self.detection.sensitivity = sensitivity;
        }
        if let Some(min_area) = env_parse::<f64>("MOTION_MIN_AREA", "a number of pixels")? {
            self.detection.min_area = min_area;
        }
        if let Some(secs) = env_parse::<u64>("MOTION_COOLDOWN_SECS", "an integer number of seconds")? {
            self.notify.gate.cooldown = Duration::from_secs(secs);
        }
        if let Some(dir) = env_non_empty("MOTION_SNAPSHOT_DIR") {
            self.snapshot_dir = PathBuf::from(dir);
        }
        if let Some(font) = env_non_empty("MOTION_FONT") {
            self.font_path = Some(PathBuf::from(font));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.source.trim().is_empty() {
            return Err(anyhow!("capture source must not be empty"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture width and height must be greater than zero"));
        }
        self.detection.validate()?;
        if self.notify.smtp.host.trim().is_empty() {
            return Err(anyhow!("smtp host must not be empty"));
        }
        if self.notify.smtp.port == 0 {
            return Err(anyhow!("smtp port must be greater than zero"));
        }
        if self.notify.gate.retry_backoff > self.notify.gate.retry_backoff_max {
            return Err(anyhow!(
                "retry_backoff_secs must not exceed retry_backoff_max_secs"
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SentryConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match env_non_empty(key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}", key, expected)),
        None => Ok(None),
    }
}
