use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{DEFAULT_COOLDOWN, DEFAULT_PLAYER};
use crate::camera::{self, BboxOrder, CameraSettings, NetworkIntrinsics, DEFAULT_BUFFER_COUNT};
use crate::overlay::DEFAULT_FONT_PATH;
use crate::policy::AudioCues;

pub const CONFIG_ENV: &str = "ZEBRA_GUARD_CONFIG";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GuardConfigFile {
    camera: Option<CameraConfigFile>,
    network: Option<NetworkConfigFile>,
    audio: Option<AudioConfigFile>,
    overlay: Option<OverlayConfigFile>,
    preview_dir: Option<PathBuf>,
    ui: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    buffer_count: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct NetworkConfigFile {
    bbox_order: Option<BboxOrder>,
    bbox_normalization: Option<bool>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AudioConfigFile {
    player: Option<String>,
    stop: Option<PathBuf>,
    go: Option<PathBuf>,
    idle: Option<PathBuf>,
    cooldown_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OverlayConfigFile {
    font_path: Option<PathBuf>,
}

/// Deployment settings that are not command line flags.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub camera: CameraSettings,
    pub buffer_count: usize,
    pub network: NetworkIntrinsics,
    pub audio: AudioSettings,
    pub font_path: PathBuf,
    pub ui: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AudioSettings {
    pub player: String,
    pub cues: AudioCues,
    pub cooldown: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            buffer_count: DEFAULT_BUFFER_COUNT,
            network: NetworkIntrinsics::default(),
            audio: AudioSettings {
                player: DEFAULT_PLAYER.to_string(),
                cues: AudioCues::default(),
                cooldown: DEFAULT_COOLDOWN,
            },
            font_path: PathBuf::from(DEFAULT_FONT_PATH),
            ui: None,
        }
    }
}

impl GuardConfig {
    /// Load from the JSON file named by `ZEBRA_GUARD_CONFIG` (if set), then
    /// apply environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GuardConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            url: camera_file.url.unwrap_or(defaults.camera.url),
            width: camera_file.width.unwrap_or(defaults.camera.width),
            height: camera_file.height.unwrap_or(defaults.camera.height),
            preview_dir: file.preview_dir,
        };
        let buffer_count = camera_file.buffer_count.unwrap_or(defaults.buffer_count);

        let network_file = file.network.unwrap_or_default();
        let network = NetworkIntrinsics {
            bbox_order: network_file
                .bbox_order
                .unwrap_or(defaults.network.bbox_order),
            bbox_normalized: network_file
                .bbox_normalization
                .unwrap_or(defaults.network.bbox_normalized),
            input_width: network_file
                .input_width
                .unwrap_or(defaults.network.input_width),
            input_height: network_file
                .input_height
                .unwrap_or(defaults.network.input_height),
        };

        let audio_file = file.audio.unwrap_or_default();
        let cooldown = match audio_file.cooldown_secs {
            Some(secs) => cooldown_from_secs(secs)?,
            None => defaults.audio.cooldown,
        };
        let audio = AudioSettings {
            player: audio_file.player.unwrap_or(defaults.audio.player),
            cues: AudioCues {
                stop: audio_file.stop.unwrap_or(defaults.audio.cues.stop),
                go: audio_file.go.unwrap_or(defaults.audio.cues.go),
                idle: audio_file.idle.unwrap_or(defaults.audio.cues.idle),
            },
            cooldown,
        };

        let font_path = file
            .overlay
            .and_then(|overlay| overlay.font_path)
            .unwrap_or(defaults.font_path);

        Ok(Self {
            camera,
            buffer_count,
            network,
            audio,
            font_path,
            ui: file.ui,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("ZEBRA_GUARD_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(player) = std::env::var("ZEBRA_GUARD_AUDIO_PLAYER") {
            if !player.trim().is_empty() {
                self.audio.player = player;
            }
        }
        if let Ok(dir) = std::env::var("ZEBRA_GUARD_PREVIEW_DIR") {
            if !dir.trim().is_empty() {
                self.camera.preview_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(font) = std::env::var("ZEBRA_GUARD_FONT") {
            if !font.trim().is_empty() {
                self.font_path = PathBuf::from(font);
            }
        }
        if let Ok(ui) = std::env::var("ZEBRA_GUARD_UI") {
            if !ui.trim().is_empty() {
                self.ui = Some(ui);
            }
        }
        if let Ok(cooldown) = std::env::var("ZEBRA_GUARD_COOLDOWN_SECS") {
            let secs: f64 = cooldown.trim().parse().map_err(|_| {
                anyhow!("ZEBRA_GUARD_COOLDOWN_SECS must be a number of seconds")
            })?;
            self.audio.cooldown = cooldown_from_secs(secs)?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !camera::is_supported_url(&self.camera.url) {
            return Err(anyhow!(
                "camera url '{}' is not supported (expected stub://...)",
                self.camera.url
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.buffer_count == 0 {
            return Err(anyhow!("camera buffer_count must be greater than zero"));
        }
        self.network.validate()?;
        if self.audio.player.trim().is_empty() {
            return Err(anyhow!("audio player must not be empty"));
        }
        if let Some(ui) = self.ui.as_deref() {
            if !matches!(ui, "auto" | "plain" | "pretty") {
                return Err(anyhow!("ui must be one of auto, plain, pretty (got '{}')", ui));
            }
        }
        Ok(())
    }
}

fn cooldown_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(anyhow!(
            "audio cooldown must be a non-negative number of seconds, got {}",
            secs
        ));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn read_config_file(path: &Path) -> Result<GuardConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() -> Result<()> {
        let mut cfg = GuardConfig::from_file(GuardConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.camera.url, "stub://crossing");
        assert_eq!(cfg.buffer_count, 12);
        assert_eq!(cfg.audio.player, "aplay");
        assert_eq!(cfg.audio.cooldown, Duration::from_secs(3));
        assert_eq!(cfg.audio.cues, AudioCues::default());
        assert_eq!(cfg.network, NetworkIntrinsics::default());
        Ok(())
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() -> Result<()> {
        let file: GuardConfigFile = serde_json::from_str(
            r#"{ "audio": { "cooldown_secs": 1.5 }, "network": { "bbox_order": "xy" } }"#,
        )?;
        let cfg = GuardConfig::from_file(file)?;
        assert_eq!(cfg.audio.cooldown, Duration::from_millis(1500));
        assert_eq!(cfg.audio.player, "aplay");
        assert_eq!(cfg.network.bbox_order, BboxOrder::Xy);
        assert!(cfg.network.bbox_normalized);
        Ok(())
    }

    #[test]
    fn negative_cooldown_is_rejected() {
        let file: GuardConfigFile =
            serde_json::from_str(r#"{ "audio": { "cooldown_secs": -1.0 } }"#).unwrap();
        assert!(GuardConfig::from_file(file).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed: Result<GuardConfigFile, _> = serde_json::from_str(r#"{ "camra": {} }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn validate_rejects_unsupported_camera_url() {
        let mut cfg = GuardConfig::default();
        cfg.camera.url = "rtsp://10.0.0.2/stream".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn validate_rejects_unknown_ui_mode() {
        let mut cfg = GuardConfig {
            ui: Some("fancy".to_string()),
            ..GuardConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
