// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::hardware::{Codec, EncoderTag};
use crate::engine::audio::AudioSafety;
use crate::engine::request::{AudioPolicy, Mode, VIDEO_EXTENSIONS};
use crate::engine::strategy::{Preferences, StrategySettings};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Codec used when re-encoding
    #[serde(default)]
    pub codec: Codec,

    /// Stream-copy or re-encode by default
    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub audio_policy: AudioPolicy,

    /// Container for per-file transcodes (merge takes it from the output name)
    #[serde(default = "default_container")]
    pub container: String,

    /// Hardware encoders to try, highest priority first. Software is always the last resort.
    #[serde(default = "default_hw_preference")]
    pub hw_preference: Vec<EncoderTag>,

    /// Extensions picked up when a directory is given as input
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Default overwrite setting (whether to overwrite existing output files)
    #[serde(default)]
    pub overwrite: bool,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,

    /// Extra ffmpeg output arguments, shell-quoted
    #[serde(default)]
    pub extra_args: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// CRF/CQ/QP target for H.264 (lower is better)
    #[serde(default = "default_h264_quality")]
    pub h264: u32,

    /// CRF/CQ/QP target for H.265 (lower is better)
    #[serde(default = "default_h265_quality")]
    pub h265: u32,

    #[serde(default = "default_software_preset")]
    pub software_preset: String,

    #[serde(default = "default_nvenc_preset")]
    pub nvenc_preset: String,

    #[serde(default = "default_software_preset")]
    pub qsv_preset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry a failed attempt once with the next strategy
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lower the quality target on the retry
    #[serde(default = "default_true")]
    pub lower_quality: bool,

    /// How many CRF/QP steps the retry moves towards lower quality
    #[serde(default = "default_quality_offset")]
    pub quality_offset: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Per-container audio codecs that may be stream-copied; replaces the built-in set
    #[serde(default)]
    pub safe_copy: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,

    /// VA-API render node; auto-detected when unset
    #[serde(default)]
    pub vaapi_device: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_container() -> String {
    "mp4".to_string()
}

fn default_hw_preference() -> Vec<EncoderTag> {
    EncoderTag::HARDWARE.to_vec()
}

fn default_extensions() -> Vec<String> {
    VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_audio_bitrate() -> u32 {
    192
}

fn default_h264_quality() -> u32 {
    23
}

fn default_h265_quality() -> u32 {
    28
}

fn default_software_preset() -> String {
    "medium".to_string()
}

fn default_nvenc_preset() -> String {
    "p5".to_string()
}

fn default_quality_offset() -> u32 {
    2
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            codec: Codec::default(),
            mode: Mode::default(),
            audio_policy: AudioPolicy::default(),
            container: default_container(),
            hw_preference: default_hw_preference(),
            extensions: default_extensions(),
            overwrite: false, // Default to not overwriting
            audio_bitrate_kbps: default_audio_bitrate(),
            extra_args: String::new(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            h264: default_h264_quality(),
            h265: default_h265_quality(),
            software_preset: default_software_preset(),
            nvenc_preset: default_nvenc_preset(),
            qsv_preset: default_software_preset(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lower_quality: true,
            quality_offset: default_quality_offset(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            vaapi_device: None,
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("ffmerge")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("ffmerge")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();

            // A read-only config dir is not fatal; built-in defaults still apply
            if let Err(e) = config.save_to(&config_path) {
                tracing::warn!(
                    "Could not create default config file: {:#}. Using built-in defaults; run 'ffmerge init-config' to create one.",
                    e
                );
            }

            Ok(config)
        }
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Preference order with the mandatory software fallback
    pub fn preferences(&self) -> Preferences {
        Preferences::new(self.defaults.hw_preference.clone())
    }

    pub fn strategy_settings(&self) -> StrategySettings {
        StrategySettings {
            h264_quality: self.quality.h264,
            h265_quality: self.quality.h265,
            software_preset: self.quality.software_preset.clone(),
            nvenc_preset: self.quality.nvenc_preset.clone(),
            qsv_preset: self.quality.qsv_preset.clone(),
            retry_enabled: self.retry.enabled,
            retry_lower_quality: self.retry.lower_quality,
            retry_quality_offset: self.retry.quality_offset,
            vaapi_device: self.tools.vaapi_device.clone(),
        }
    }

    pub fn audio_safety(&self) -> AudioSafety {
        let mut safety = AudioSafety::default();
        for (container, codecs) in &self.audio.safe_copy {
            safety.set(container, codecs.iter().cloned());
        }
        safety
    }

    /// Extra ffmpeg arguments, split shell-style so quoted values survive
    pub fn extra_args(&self) -> Result<Vec<String>> {
        let raw = self.defaults.extra_args.trim();
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        shlex::split(raw).with_context(|| format!("Unbalanced quotes in extra_args: {}", raw))
    }
}
