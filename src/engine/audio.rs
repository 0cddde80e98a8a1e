//! Audio copy-safety classification.
//!
//! Stream-copying an audio codec the target container cannot hold makes the
//! mux fail. That is decided up front from the probed input codecs, not
//! discovered through a failed attempt.

use std::collections::{BTreeMap, BTreeSet};

use super::request::AudioPolicy;

/// Audio codecs each container accepts without transcoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSafety {
    // None means the container takes any codec
    containers: BTreeMap<String, Option<BTreeSet<String>>>,
}

fn codec_set(codecs: &[&str]) -> Option<BTreeSet<String>> {
    Some(codecs.iter().map(|c| c.to_string()).collect())
}

impl Default for AudioSafety {
    fn default() -> Self {
        let mp4 = &["aac", "mp3", "ac3", "eac3"];
        let mut containers = BTreeMap::new();
        containers.insert("mp4".to_string(), codec_set(mp4));
        containers.insert("m4v".to_string(), codec_set(mp4));
        containers.insert(
            "mov".to_string(),
            codec_set(&["aac", "mp3", "ac3", "eac3", "alac", "pcm_s16le"]),
        );
        containers.insert("webm".to_string(), codec_set(&["opus", "vorbis"]));
        containers.insert("mkv".to_string(), None);
        Self { containers }
    }
}

impl AudioSafety {
    /// Replace the copy-safe set for a container
    pub fn set<I, S>(&mut self, container: &str, codecs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.containers.insert(
            container.to_ascii_lowercase(),
            Some(codecs.into_iter().map(Into::into).collect()),
        );
    }

    /// Whether `codec` can be stream-copied into `container`.
    /// Containers without a rule accept anything.
    pub fn is_safe(&self, container: &str, codec: &str) -> bool {
        match self.containers.get(&container.to_ascii_lowercase()) {
            Some(Some(codecs)) => codecs.contains(&codec.to_ascii_lowercase()),
            Some(None) | None => true,
        }
    }

    /// First input codec that cannot be copied into `container`
    pub fn first_unsafe<'a>(&self, container: &str, codecs: &'a [String]) -> Option<&'a str> {
        codecs
            .iter()
            .map(String::as_str)
            .find(|codec| !self.is_safe(container, codec))
    }
}

/// Effective audio policy for a request.
///
/// A copy policy is upgraded to transcode when any input carries an audio
/// codec outside the container's safe set. A transcode policy stays as is.
pub fn resolve_audio_policy(
    requested: AudioPolicy,
    container: &str,
    input_codecs: &[String],
    safety: &AudioSafety,
) -> AudioPolicy {
    if requested == AudioPolicy::Transcode {
        return AudioPolicy::Transcode;
    }

    match safety.first_unsafe(container, input_codecs) {
        Some(codec) => {
            tracing::info!(
                codec,
                container,
                "audio codec cannot be copied into container; transcoding audio"
            );
            AudioPolicy::Transcode
        }
        None => AudioPolicy::Copy,
    }
}

/// Audio encoder used when transcoding into `container`
pub fn transcode_codec(container: &str) -> &'static str {
    match container {
        // WebM only supports Vorbis/Opus audio.
        "webm" => "libopus",
        _ => "aac",
    }
}
