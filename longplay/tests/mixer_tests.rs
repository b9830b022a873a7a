//! Mix composer tests: duration accounting, tracklist timestamps,
//! crossfade clamping, trim-before-fade, and normalization.

use longplay::mix::{
    compose, ms_to_frames, AudioClip, MixInput, MixOptions, CHANNELS,
};
use longplay_common::FadeCurve;

fn tone(duration_ms: u64, amplitude: f32) -> AudioClip {
    AudioClip::new(vec![amplitude; ms_to_frames(duration_ms) * CHANNELS])
}

fn input(title: &str, clip: AudioClip) -> MixInput {
    MixInput {
        title: title.to_string(),
        clip,
    }
}

fn options(crossfade_ms: u64, normalize: bool) -> MixOptions {
    MixOptions {
        crossfade_ms,
        normalize,
        target_dbfs: -1.0,
        curve: FadeCurve::EqualPower,
    }
}

#[test]
fn three_clips_lose_one_crossfade_per_junction() {
    let inputs = [
        input("One", tone(60_000, 0.5)),
        input("Two", tone(45_000, 0.5)),
        input("Three", tone(90_000, 0.5)),
    ];
    let mixed = compose(&inputs, &options(5_000, false)).unwrap();

    // 60000 + 45000 + 90000 - 2 * 5000
    assert_eq!(mixed.total_duration_ms, 185_000);

    let starts: Vec<u64> = mixed.tracklist.iter().map(|e| e.start_ms).collect();
    assert_eq!(starts, vec![0, 55_000, 95_000]);

    let titles: Vec<&str> = mixed.tracklist.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["One", "Two", "Three"]);
}

#[test]
fn tracklist_timestamps_are_strictly_increasing() {
    let inputs = [
        input("A", tone(6_000, 0.5)),
        input("B", tone(6_000, 0.5)),
        input("C", tone(6_000, 0.5)),
        input("D", tone(6_000, 0.5)),
    ];
    let mixed = compose(&inputs, &options(2_000, false)).unwrap();
    for pair in mixed.tracklist.windows(2) {
        assert!(pair[0].start_ms < pair[1].start_ms);
    }
}

#[test]
fn single_clip_shorter_than_crossfade_is_returned_trimmed_only() {
    let mixed = compose(
        &[input("Solo", tone(2_000, 0.5))],
        &options(5_000, false),
    )
    .unwrap();
    assert_eq!(mixed.total_duration_ms, 2_000);
    assert_eq!(mixed.tracklist.len(), 1);
    assert_eq!(mixed.tracklist[0].start_ms, 0);
}

#[test]
fn crossfade_clamps_to_the_shorter_adjacent_clip() {
    // First clip is 2 s but the configured fade is 5 s: the junction
    // fade clamps to 2000 - 100 (guard) = 1900 ms
    let inputs = [
        input("Short", tone(2_000, 0.5)),
        input("Long", tone(10_000, 0.5)),
    ];
    let mixed = compose(&inputs, &options(5_000, false)).unwrap();

    assert_eq!(mixed.total_duration_ms, 2_000 + 10_000 - 1_900);
    assert_eq!(mixed.tracklist[1].start_ms, 100);
}

#[test]
fn silence_is_trimmed_before_any_crossfade_math() {
    // Tail silence on the first clip and lead silence on the second
    // would otherwise let the fade blend into dead air
    let mut first = tone(1_000, 0.5);
    first.samples.extend(vec![0.0; ms_to_frames(500) * CHANNELS]);

    let mut second = AudioClip::new(vec![0.0; ms_to_frames(300) * CHANNELS]);
    second.samples.extend(vec![0.5; ms_to_frames(1_000) * CHANNELS]);

    let inputs = [input("A", first), input("B", second)];
    let mixed = compose(&inputs, &options(400, false)).unwrap();

    // 1000 + 1000 - 400, the silent padding is gone
    assert_eq!(mixed.total_duration_ms, 1_600);
    assert_eq!(mixed.tracklist[1].start_ms, 600);
}

#[test]
fn equal_power_crossfade_holds_level_through_the_junction() {
    // Two identical-level tones: an equal-power fade keeps the summed
    // gain within [1.0, sqrt(2)], so nothing dips toward silence
    let inputs = [input("A", tone(3_000, 0.5)), input("B", tone(3_000, 0.5))];
    let mixed = compose(&inputs, &options(1_000, false)).unwrap();

    let overlap_start = ms_to_frames(2_000) * CHANNELS;
    let overlap_end = ms_to_frames(3_000) * CHANNELS;
    for &s in &mixed.clip.samples[overlap_start..overlap_end] {
        assert!(s >= 0.49, "level dipped to {} inside the crossfade", s);
        assert!(s <= 0.51 * std::f32::consts::SQRT_2 + 1e-3);
    }
}

#[test]
fn normalization_preserves_relative_levels() {
    let inputs = [
        input("Loud", tone(2_000, 0.8)),
        input("Quiet", tone(2_000, 0.2)),
    ];

    let raw = compose(&inputs, &options(500, false)).unwrap();
    let normalized = compose(&inputs, &options(500, true)).unwrap();
    assert_eq!(raw.clip.samples.len(), normalized.clip.samples.len());

    // One global gain factor: the ratio between any two non-zero
    // points of the mix is unchanged
    let a = ms_to_frames(500) * CHANNELS; // inside the loud clip
    let b = ms_to_frames(3_000) * CHANNELS; // inside the quiet clip
    let ratio_raw = raw.clip.samples[a] / raw.clip.samples[b];
    let ratio_norm = normalized.clip.samples[a] / normalized.clip.samples[b];
    assert!((ratio_raw - ratio_norm).abs() < 1e-4);

    // And the peak lands on the -1 dBFS target
    let peak = normalized
        .clip
        .samples
        .iter()
        .fold(0f32, |m, s| m.max(s.abs()));
    assert!((peak - 10f32.powf(-1.0 / 20.0)).abs() < 1e-3);
}

#[test]
fn composition_is_deterministic() {
    let inputs = [
        input("A", tone(4_000, 0.6)),
        input("B", tone(4_000, 0.3)),
    ];
    let first = compose(&inputs, &options(1_000, true)).unwrap();
    let second = compose(&inputs, &options(1_000, true)).unwrap();

    assert_eq!(first.clip.samples, second.clip.samples);
    assert_eq!(first.tracklist, second.tracklist);
    assert_eq!(first.total_duration_ms, second.total_duration_ms);
}
