//! Encoder selection and attempt planning
//!
//! Selection walks the preference list and takes the first encoder family the
//! capability probe reports for the target codec; software is the guaranteed
//! fallback. Planning turns that choice into at most two attempts: the
//! primary strategy and exactly one retry.

use std::fmt;

use super::hardware::{
    CapabilityProbe, Codec, DEFAULT_RENDER_DEVICE, EncoderTag, detect_render_device,
};
use super::request::{EncodeRequest, Mode};

/// Ordered hardware preference with the mandatory software fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    order: Vec<EncoderTag>,
}

impl Preferences {
    /// Duplicate tags keep their first position
    pub fn new(order: Vec<EncoderTag>) -> Self {
        let mut deduped = Vec::with_capacity(order.len());
        for tag in order {
            if !deduped.contains(&tag) {
                deduped.push(tag);
            }
        }
        Self { order: deduped }
    }

    pub fn order(&self) -> &[EncoderTag] {
        &self.order
    }

    pub fn fallback(&self) -> EncoderTag {
        EncoderTag::Software
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::new(EncoderTag::HARDWARE.to_vec())
    }
}

/// First preferred encoder family present in `probe`, else the software fallback
pub fn select_strategy(probe: &CapabilityProbe, codec: Codec, prefs: &Preferences) -> EncoderTag {
    prefs
        .order()
        .iter()
        .copied()
        .find(|tag| probe.supports(codec, *tag))
        .unwrap_or_else(|| prefs.fallback())
}

/// Next-lower-priority family after `current`, else the software fallback
pub fn next_strategy(
    probe: &CapabilityProbe,
    codec: Codec,
    prefs: &Preferences,
    current: EncoderTag,
) -> EncoderTag {
    if !current.is_hardware() {
        return prefs.fallback();
    }

    prefs
        .order()
        .iter()
        .skip_while(|tag| **tag != current)
        .skip(1)
        .copied()
        .find(|tag| probe.supports(codec, *tag))
        .unwrap_or_else(|| prefs.fallback())
}

/// Tunables for building encoder configurations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategySettings {
    pub h264_quality: u32,
    pub h265_quality: u32,
    pub software_preset: String,
    pub nvenc_preset: String,
    pub qsv_preset: String,
    pub retry_enabled: bool,
    pub retry_lower_quality: bool,
    pub retry_quality_offset: u32,
    pub vaapi_device: Option<String>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            h264_quality: 23,
            h265_quality: 28,
            software_preset: "medium".to_string(),
            nvenc_preset: "p5".to_string(),
            qsv_preset: "medium".to_string(),
            retry_enabled: true,
            retry_lower_quality: true,
            retry_quality_offset: 2,
            vaapi_device: None,
        }
    }
}

impl StrategySettings {
    pub fn quality_for(&self, codec: Codec) -> u32 {
        match codec {
            Codec::H264 => self.h264_quality,
            Codec::H265 => self.h265_quality,
        }
    }

    fn retry_quality(&self, quality: u32) -> u32 {
        if self.retry_lower_quality {
            // CRF/QP scales top out at 51
            (quality + self.retry_quality_offset).min(51)
        } else {
            quality
        }
    }
}

/// One concrete video encoder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub tag: EncoderTag,
    pub encoder: String,
    pub preset: Option<String>,
    /// CRF/CQ/QP-style target, lower is better
    pub quality: u32,
    pub filters: Vec<String>,
    /// Arguments placed before the first input (device initialisation)
    pub input_args: Vec<String>,
}

impl EncoderConfig {
    /// Configuration for an encoder family on a codec
    pub fn for_tag(codec: Codec, tag: EncoderTag, quality: u32, settings: &StrategySettings) -> Self {
        Self::named(codec.encoder_name(tag), tag, quality, settings)
    }

    /// Configuration for an explicit encoder name (user override)
    pub fn for_encoder(encoder: &str, quality: u32, settings: &StrategySettings) -> Self {
        Self::named(encoder, EncoderTag::from_encoder_name(encoder), quality, settings)
    }

    fn named(encoder: &str, tag: EncoderTag, quality: u32, settings: &StrategySettings) -> Self {
        let (preset, filters, input_args) = match tag {
            EncoderTag::Software => (Some(settings.software_preset.clone()), vec![], vec![]),
            EncoderTag::Nvenc => (Some(settings.nvenc_preset.clone()), vec![], vec![]),
            EncoderTag::Qsv => (Some(settings.qsv_preset.clone()), vec![], vec![]),
            EncoderTag::Amf => (Some("balanced".to_string()), vec![], vec![]),
            EncoderTag::Vaapi => {
                let device = settings
                    .vaapi_device
                    .clone()
                    .or_else(detect_render_device)
                    .unwrap_or_else(|| DEFAULT_RENDER_DEVICE.to_string());
                (
                    None,
                    vec!["format=nv12".to_string(), "hwupload".to_string()],
                    vec!["-vaapi_device".to_string(), device],
                )
            }
            EncoderTag::VideoToolbox => (None, vec![], vec![]),
        };

        Self {
            tag,
            encoder: encoder.to_string(),
            preset,
            quality,
            filters,
            input_args,
        }
    }

    /// Rate-control arguments for this encoder family
    pub fn quality_args(&self) -> Vec<String> {
        let q = self.quality.to_string();
        match self.tag {
            EncoderTag::Software => vec!["-crf".into(), q],
            EncoderTag::Nvenc => vec!["-rc".into(), "vbr".into(), "-cq".into(), q, "-b:v".into(), "0".into()],
            EncoderTag::Qsv => vec!["-global_quality".into(), q],
            EncoderTag::Vaapi => vec!["-rc_mode".into(), "CQP".into(), "-qp".into(), q],
            EncoderTag::Amf => vec![
                "-rc".into(),
                "cqp".into(),
                "-qp_i".into(),
                q.clone(),
                "-qp_p".into(),
                q,
            ],
            // VideoToolbox quality is 1-100, higher is better
            EncoderTag::VideoToolbox => vec![
                "-q:v".into(),
                100u32.saturating_sub(self.quality * 2).clamp(1, 100).to_string(),
            ],
        }
    }

    pub fn preset_args(&self) -> Vec<String> {
        match (&self.preset, self.tag) {
            (Some(preset), EncoderTag::Amf) => vec!["-quality".into(), preset.clone()],
            (Some(preset), _) => vec!["-preset".into(), preset.clone()],
            (None, _) => vec![],
        }
    }
}

/// One planned tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    StreamCopy,
    Encode(EncoderConfig),
}

impl Attempt {
    pub fn label(&self) -> String {
        self.to_string()
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, Attempt::Encode(cfg) if cfg.tag.is_hardware())
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::StreamCopy => f.write_str("stream copy"),
            Attempt::Encode(cfg) => write!(f, "{} (quality {})", cfg.encoder, cfg.quality),
        }
    }
}

/// Ordered attempts for one request: the primary strategy and at most one retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeStrategy {
    attempts: Vec<Attempt>,
}

impl EncodeStrategy {
    pub const MAX_ATTEMPTS: usize = 2;

    pub fn plan(
        request: &EncodeRequest,
        probe: &CapabilityProbe,
        prefs: &Preferences,
        settings: &StrategySettings,
    ) -> Self {
        let codec = request.codec;
        let quality = settings.quality_for(codec);

        let (selected, retry_tag) = match &request.encoder_override {
            Some(name) => {
                let cfg = EncoderConfig::for_encoder(name, quality, settings);
                (cfg, prefs.fallback())
            }
            None => {
                let tag = select_strategy(probe, codec, prefs);
                let cfg = EncoderConfig::for_tag(codec, tag, quality, settings);
                (cfg, next_strategy(probe, codec, prefs, tag))
            }
        };

        let attempts = match request.mode {
            Mode::Copy => vec![Attempt::StreamCopy, Attempt::Encode(selected)],
            Mode::Reencode => {
                let retry = EncoderConfig::for_tag(
                    codec,
                    retry_tag,
                    settings.retry_quality(quality),
                    settings,
                );
                vec![Attempt::Encode(selected), Attempt::Encode(retry)]
            }
        };

        let mut strategy = Self { attempts };
        if !settings.retry_enabled {
            strategy.attempts.truncate(1);
        }

        let retry = strategy
            .attempts
            .get(1)
            .map(Attempt::label)
            .unwrap_or_else(|| "none".to_string());
        tracing::info!(primary = %strategy.attempts[0], retry = %retry, "planned encode strategy");

        strategy
    }

    /// Build a strategy from explicit attempts; anything past the retry is dropped
    pub fn from_attempts(mut attempts: Vec<Attempt>) -> Self {
        attempts.truncate(Self::MAX_ATTEMPTS);
        Self { attempts }
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn primary(&self) -> Option<&Attempt> {
        self.attempts.first()
    }
}
