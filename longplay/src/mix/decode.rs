//! Audio decoding and sample-rate normalization
//!
//! All mixing happens on interleaved stereo f32 at 44.1 kHz. Provider
//! output (mp3 and friends) is decoded with symphonia, mono is
//! duplicated to stereo, extra channels beyond the front pair are
//! dropped, and anything not at 44.1 kHz is resampled with rubato.

use longplay_common::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Standard sample rate for all mix processing
pub const SAMPLE_RATE: u32 = 44_100;

/// Interleaved stereo throughout
pub const CHANNELS: usize = 2;

/// Convert a millisecond position/length to a frame count at the
/// standard rate. Exact for whole-millisecond multiples of 10.
pub fn ms_to_frames(ms: u64) -> usize {
    (ms * SAMPLE_RATE as u64 / 1000) as usize
}

/// Convert a frame count back to milliseconds (floor).
pub fn frames_to_ms(frames: usize) -> u64 {
    frames as u64 * 1000 / SAMPLE_RATE as u64
}

/// One clip of decoded audio: interleaved stereo f32 at [`SAMPLE_RATE`].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len() % CHANNELS, 0);
        Self { samples }
    }

    /// Silence of the given length
    pub fn silence(duration_ms: u64) -> Self {
        Self {
            samples: vec![0.0; ms_to_frames(duration_ms) * CHANNELS],
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / CHANNELS
    }

    pub fn duration_ms(&self) -> u64 {
        frames_to_ms(self.frames())
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode an audio file into an [`AudioClip`].
///
/// The container/codec is probed from content (the extension is only a
/// hint), so a wav payload behind an `.mp3` key still decodes.
pub fn decode_file(path: &Path) -> Result<AudioClip> {
    let file = File::open(path)
        .map_err(|e| Error::Audio(format!("open {}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Audio(format!("probe {}: {}", path.display(), e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Audio(format!("{}: no decodable track", path.display())))?;
    let track_id = track.id;
    let native_rate = track.codec_params.sample_rate.unwrap_or(SAMPLE_RATE);
    let native_channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(CHANNELS);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Audio(format!("decoder for {}: {}", path.display(), e)))?;

    let mut native_samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(Error::Audio(format!("read {}: {}", path.display(), e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                let buf = sample_buf.as_mut().expect("allocated above");
                buf.copy_interleaved_ref(decoded);
                native_samples.extend_from_slice(buf.samples());
            }
            // A corrupt packet loses a few frames, not the whole clip
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(Error::Audio(format!("decode {}: {}", path.display(), e))),
        }
    }

    let stereo = map_to_stereo(&native_samples, native_channels);
    let samples = resample_stereo(&stereo, native_rate)?;

    debug!(
        path = %path.display(),
        native_rate,
        native_channels,
        frames = samples.len() / CHANNELS,
        "decoded clip"
    );
    Ok(AudioClip::new(samples))
}

/// Map interleaved native-channel samples to stereo: mono duplicates,
/// anything wider keeps the front left/right pair.
fn map_to_stereo(samples: &[f32], native_channels: usize) -> Vec<f32> {
    match native_channels {
        0 => Vec::new(),
        2 => samples.to_vec(),
        1 => {
            let mut out = Vec::with_capacity(samples.len() * 2);
            for &s in samples {
                out.push(s);
                out.push(s);
            }
            out
        }
        n => {
            let mut out = Vec::with_capacity(samples.len() / n * 2);
            for frame in samples.chunks_exact(n) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
            out
        }
    }
}

/// Resample interleaved stereo to the standard rate. Already-standard
/// input is returned unchanged.
fn resample_stereo(input: &[f32], input_rate: u32) -> Result<Vec<f32>> {
    if input_rate == SAMPLE_RATE {
        return Ok(input.to_vec());
    }
    let frames = input.len() / CHANNELS;
    if frames == 0 {
        return Ok(Vec::new());
    }

    let mut planar = vec![Vec::with_capacity(frames), Vec::with_capacity(frames)];
    for frame in input.chunks_exact(CHANNELS) {
        planar[0].push(frame[0]);
        planar[1].push(frame[1]);
    }

    let mut resampler = FastFixedIn::<f32>::new(
        SAMPLE_RATE as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        frames,
        CHANNELS,
    )
    .map_err(|e| Error::Audio(format!("resampler init: {}", e)))?;

    let planar_out = resampler
        .process(&planar, None)
        .map_err(|e| Error::Audio(format!("resample: {}", e)))?;

    let out_frames = planar_out[0].len();
    let mut interleaved = Vec::with_capacity(out_frames * CHANNELS);
    for i in 0..out_frames {
        interleaved.push(planar_out[0][i]);
        interleaved.push(planar_out[1][i]);
    }
    Ok(interleaved)
}
