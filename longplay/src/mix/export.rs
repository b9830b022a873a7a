//! Mix export: WAV encode and the tracklist file
//!
//! The program exports as 16-bit PCM WAV so the encode step stays
//! deterministic; lossy transcoding for publishing happens outside
//! this pipeline. The tracklist is the plain-text artifact that ends
//! up in the video description.

use longplay_common::time::format_timestamp;
use longplay_common::{Error, Result};
use std::path::Path;

use super::decode::{AudioClip, CHANNELS, SAMPLE_RATE};
use super::TracklistEntry;

/// Write a clip as 16-bit stereo WAV.
pub fn write_wav(clip: &AudioClip, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: CHANNELS as u16,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| Error::Audio(format!("create {}: {}", path.display(), e)))?;

    for &sample in &clip.samples {
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| Error::Audio(format!("write {}: {}", path.display(), e)))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Audio(format!("finalize {}: {}", path.display(), e)))?;
    Ok(())
}

/// Render the tracklist text artifact.
pub fn render_tracklist(entries: &[TracklistEntry]) -> String {
    let rule = "=".repeat(40);
    let mut lines = vec!["TRACKLIST".to_string(), rule.clone(), String::new()];

    for entry in entries {
        lines.push(format!(
            "{} - {}",
            format_timestamp(entry.start_ms),
            entry.title
        ));
    }

    lines.push(String::new());
    lines.push(rule);
    lines.push(format!("Total tracks: {}", entries.len()));
    lines.join("\n")
}

/// Write the tracklist file next to the mix.
pub fn write_tracklist(entries: &[TracklistEntry], path: &Path) -> Result<()> {
    std::fs::write(path, render_tracklist(entries))?;
    Ok(())
}
