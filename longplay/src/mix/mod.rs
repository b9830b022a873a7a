//! Mix composition
//!
//! The deterministic signal core: takes the acquired clips in slot
//! order and splices them into one continuous program. Every clip is
//! silence-trimmed first, junctions get an equal-power crossfade
//! (clamped so a fade never outruns either adjacent clip), tracklist
//! timestamps account for the overlap each crossfade removes, and an
//! optional single global peak-normalization pass sets the final
//! level. Same clips + same options produce the same samples.

pub mod decode;
pub mod export;
pub mod silence;

pub use decode::{frames_to_ms, ms_to_frames, AudioClip, CHANNELS, SAMPLE_RATE};
pub use silence::{trim_silence, SILENCE_THRESHOLD_DBFS};

use longplay_common::config::MixSettings;
use longplay_common::{Error, FadeCurve, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A crossfade never consumes a clip whole: each junction's fade is
/// capped at the shorter adjacent clip minus this guard.
pub const CROSSFADE_GUARD_MS: u64 = 100;

/// Composer tunables
#[derive(Debug, Clone)]
pub struct MixOptions {
    pub crossfade_ms: u64,
    pub normalize: bool,
    /// Peak target of the normalization pass, dBFS
    pub target_dbfs: f32,
    pub curve: FadeCurve,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self {
            crossfade_ms: 5_000,
            normalize: true,
            target_dbfs: -1.0,
            curve: FadeCurve::EqualPower,
        }
    }
}

impl From<&MixSettings> for MixOptions {
    fn from(settings: &MixSettings) -> Self {
        Self {
            crossfade_ms: settings.crossfade_ms,
            normalize: settings.normalize,
            target_dbfs: settings.target_dbfs,
            curve: settings.crossfade_curve,
        }
    }
}

/// One clip queued for the mix, with the title that lands on the
/// tracklist.
#[derive(Debug, Clone)]
pub struct MixInput {
    pub title: String,
    pub clip: AudioClip,
}

/// Tracklist line: where a track starts in the final program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracklistEntry {
    pub title: String,
    pub start_ms: u64,
}

/// The assembled program
#[derive(Debug, Clone)]
pub struct MixedAudio {
    pub clip: AudioClip,
    pub tracklist: Vec<TracklistEntry>,
    pub total_duration_ms: u64,
}

/// Splice the ordered clips into one continuous mix.
///
/// Output length is the sum of the trimmed clip lengths minus the
/// crossfade applied at each junction. A single clip skips crossfade
/// logic entirely and is just trimmed and (optionally) normalized.
pub fn compose(inputs: &[MixInput], opts: &MixOptions) -> Result<MixedAudio> {
    if inputs.is_empty() {
        return Err(Error::Validation("no clips to mix".to_string()));
    }

    let mut trimmed: Vec<(&str, AudioClip)> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let clip = trim_silence(&input.clip);
        if clip.is_empty() {
            return Err(Error::Validation(format!(
                "clip '{}' is entirely below the silence threshold",
                input.title
            )));
        }
        trimmed.push((&input.title, clip));
    }

    let configured_fade = ms_to_frames(opts.crossfade_ms);
    let guard = ms_to_frames(CROSSFADE_GUARD_MS);

    let mut out: Vec<f32> = trimmed[0].1.samples.clone();
    let mut tracklist = vec![TracklistEntry {
        title: trimmed[0].0.to_string(),
        start_ms: 0,
    }];

    for idx in 1..trimmed.len() {
        let (title, next) = &trimmed[idx];
        let prev_frames = trimmed[idx - 1].1.frames();
        let fade = configured_fade
            .min(prev_frames.saturating_sub(guard))
            .min(next.frames().saturating_sub(guard));

        let overlap_start = out.len() / CHANNELS - fade;
        tracklist.push(TracklistEntry {
            title: title.to_string(),
            start_ms: frames_to_ms(overlap_start),
        });

        // Gain-ramped overlap: previous material fades out while the
        // incoming clip fades in across the same window
        for i in 0..fade {
            let pos = i as f32 / fade as f32;
            let gain_out = opts.curve.fade_out(pos);
            let gain_in = opts.curve.fade_in(pos);
            let o = (overlap_start + i) * CHANNELS;
            let n = i * CHANNELS;
            for ch in 0..CHANNELS {
                out[o + ch] = out[o + ch] * gain_out + next.samples[n + ch] * gain_in;
            }
        }
        out.extend_from_slice(&next.samples[fade * CHANNELS..]);

        if fade < configured_fade {
            debug!(
                junction = idx,
                requested_ms = opts.crossfade_ms,
                applied_ms = frames_to_ms(fade),
                "crossfade clamped to adjacent clip length"
            );
        }
    }

    if opts.normalize {
        normalize_peak(&mut out, opts.target_dbfs);
    }

    let clip = AudioClip::new(out);
    let total_duration_ms = clip.duration_ms();

    debug_assert!(
        tracklist.windows(2).all(|w| w[0].start_ms < w[1].start_ms),
        "tracklist timestamps must be strictly increasing"
    );

    info!(
        tracks = tracklist.len(),
        total_duration_ms,
        crossfade_ms = opts.crossfade_ms,
        normalized = opts.normalize,
        "mix composed"
    );
    Ok(MixedAudio {
        clip,
        tracklist,
        total_duration_ms,
    })
}

/// Scan for the peak and apply one gain factor to the whole buffer so
/// the peak lands on `target_dbfs`. Global by design: per-clip
/// normalization would flatten the energy arc between tracks. A
/// silent buffer is left untouched.
fn normalize_peak(samples: &mut [f32], target_dbfs: f32) {
    let peak = samples.iter().fold(0f32, |m, s| m.max(s.abs()));
    if peak <= 0.0 {
        return;
    }
    let gain = silence::db_to_linear(target_dbfs) / peak;
    for s in samples.iter_mut() {
        *s *= gain;
    }
    debug!(peak, gain, "applied global peak normalization");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_input(title: &str, duration_ms: u64, amplitude: f32) -> MixInput {
        MixInput {
            title: title.to_string(),
            clip: AudioClip::new(vec![amplitude; ms_to_frames(duration_ms) * CHANNELS]),
        }
    }

    #[test]
    fn zero_clips_is_a_usage_error() {
        let err = compose(&[], &MixOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn all_silent_clip_fails_validation() {
        let silent = MixInput {
            title: "Hiss".to_string(),
            clip: AudioClip::silence(5_000),
        };
        let err = compose(&[silent], &MixOptions::default()).unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("Hiss")),
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn single_clip_is_trimmed_only() {
        let opts = MixOptions {
            normalize: false,
            ..MixOptions::default()
        };
        let mixed = compose(&[tone_input("Solo", 3_000, 0.5)], &opts).unwrap();
        assert_eq!(mixed.total_duration_ms, 3_000);
        assert_eq!(mixed.tracklist.len(), 1);
        assert_eq!(mixed.tracklist[0].start_ms, 0);
        // No fades touched the samples
        assert!(mixed.clip.samples.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn normalization_is_a_single_global_gain() {
        let opts = MixOptions {
            crossfade_ms: 1_000,
            normalize: true,
            target_dbfs: -1.0,
            curve: FadeCurve::EqualPower,
        };
        let inputs = [
            tone_input("A", 2_000, 0.8),
            tone_input("B", 2_000, 0.2),
        ];
        let mixed = compose(&inputs, &opts).unwrap();

        let peak = mixed
            .clip
            .samples
            .iter()
            .fold(0f32, |m, s| m.max(s.abs()));
        let target = silence::db_to_linear(-1.0);
        assert!((peak - target).abs() < 1e-3, "peak {} target {}", peak, target);
    }
}
