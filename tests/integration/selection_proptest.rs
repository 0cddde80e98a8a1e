// Property tests for encoder selection and planning

use ffmerge::engine::{
    Attempt, CapabilityProbe, Codec, EncodeRequest, EncodeStrategy, EncoderTag, Mode, Preferences,
    StrategySettings, select_strategy,
};
use proptest::prelude::*;
use std::path::PathBuf;

const ALL_TAGS: [EncoderTag; 6] = [
    EncoderTag::Nvenc,
    EncoderTag::Qsv,
    EncoderTag::Vaapi,
    EncoderTag::Amf,
    EncoderTag::VideoToolbox,
    EncoderTag::Software,
];

fn tag() -> impl Strategy<Value = EncoderTag> {
    prop::sample::select(ALL_TAGS.to_vec())
}

fn codec() -> impl Strategy<Value = Codec> {
    prop_oneof![Just(Codec::H264), Just(Codec::H265)]
}

/// Probe containing the encoders for a random subset of families, both codecs
fn probe() -> impl Strategy<Value = CapabilityProbe> {
    prop::collection::vec((tag(), codec()), 0..8).prop_map(|entries| {
        CapabilityProbe::from_encoders(
            entries
                .into_iter()
                .map(|(tag, codec)| codec.encoder_name(tag)),
        )
    })
}

fn preferences() -> impl Strategy<Value = Preferences> {
    prop::collection::vec(tag(), 0..8).prop_map(Preferences::new)
}

proptest! {
    #[test]
    fn selects_first_present_preference_or_fallback(
        probe in probe(),
        prefs in preferences(),
        codec in codec(),
    ) {
        let selected = select_strategy(&probe, codec, &prefs);

        let expected = prefs
            .order()
            .iter()
            .copied()
            .find(|t| *t == EncoderTag::Software || probe.has_encoder(codec.encoder_name(*t)))
            .unwrap_or(EncoderTag::Software);
        prop_assert_eq!(selected, expected);

        // Never something outside the preference list and the fallback
        prop_assert!(selected == EncoderTag::Software || prefs.order().contains(&selected));
        // A selected hardware family is actually present
        if selected.is_hardware() {
            prop_assert!(probe.has_encoder(codec.encoder_name(selected)));
        }
    }

    #[test]
    fn selection_is_idempotent(
        probe in probe(),
        prefs in preferences(),
        codec in codec(),
    ) {
        let first = select_strategy(&probe, codec, &prefs);
        let second = select_strategy(&probe, codec, &prefs);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn plan_never_exceeds_one_retry(
        probe in probe(),
        prefs in preferences(),
        codec in codec(),
        reencode in any::<bool>(),
        retry_enabled in any::<bool>(),
    ) {
        let mode = if reencode { Mode::Reencode } else { Mode::Copy };
        let request = EncodeRequest::new(vec![PathBuf::from("/videos/a.mp4")], PathBuf::from("/videos/out.mp4"))
            .with_mode(mode)
            .with_codec(codec);
        let settings = StrategySettings { retry_enabled, ..StrategySettings::default() };

        let strategy = EncodeStrategy::plan(&request, &probe, &prefs, &settings);
        let attempts = strategy.attempts();

        prop_assert_eq!(attempts.len(), if retry_enabled { 2 } else { 1 });
        prop_assert_eq!(
            matches!(attempts[0], Attempt::StreamCopy),
            mode == Mode::Copy
        );
        // Every encode attempt uses an encoder the host has, or software
        for attempt in attempts {
            if let Attempt::Encode(cfg) = attempt {
                prop_assert!(!cfg.tag.is_hardware() || probe.has_encoder(&cfg.encoder));
            }
        }
    }
}
