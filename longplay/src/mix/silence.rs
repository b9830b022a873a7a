//! Leading/trailing silence trim
//!
//! Clips are trimmed before any crossfade math so fades never blend
//! into dead air. Detection is a windowed peak scan against a fixed
//! amplitude threshold; the boundary resolution is one window.

use super::decode::{AudioClip, CHANNELS, SAMPLE_RATE};

/// Amplitude threshold below which audio counts as silence (dBFS).
/// Tunable constant, deliberately above the -60 dB noise floor of
/// typical provider output so faint tails still get cut.
pub const SILENCE_THRESHOLD_DBFS: f32 = -50.0;

/// Peak-scan window length
const WINDOW_MS: u64 = 10;

/// Convert a dBFS level to a linear amplitude
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Trim leading and trailing silence from a clip.
///
/// Returns the trimmed clip; a clip that never crosses the threshold
/// trims to empty, which callers must treat as unusable.
pub fn trim_silence(clip: &AudioClip) -> AudioClip {
    let threshold = db_to_linear(SILENCE_THRESHOLD_DBFS);
    let window_frames = (WINDOW_MS * SAMPLE_RATE as u64 / 1000) as usize;
    let frames = clip.frames();
    if frames == 0 {
        return AudioClip::new(Vec::new());
    }

    let window_peak = |window_idx: usize| -> f32 {
        let start = window_idx * window_frames * CHANNELS;
        let end = ((window_idx + 1) * window_frames * CHANNELS).min(clip.samples.len());
        clip.samples[start..end]
            .iter()
            .fold(0f32, |m, s| m.max(s.abs()))
    };

    let window_count = frames.div_ceil(window_frames);
    let first_loud = (0..window_count).find(|&w| window_peak(w) > threshold);
    let Some(first_loud) = first_loud else {
        return AudioClip::new(Vec::new());
    };
    let last_loud = (0..window_count)
        .rev()
        .find(|&w| window_peak(w) > threshold)
        .expect("a loud window exists");

    let start_frame = first_loud * window_frames;
    let end_frame = (((last_loud + 1) * window_frames).min(frames)).max(start_frame);
    AudioClip::new(clip.samples[start_frame * CHANNELS..end_frame * CHANNELS].to_vec())
}
