//! Shared fixtures for integration tests: deterministic oracle and
//! provider stubs, slot builders, and in-memory WAV synthesis.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use longplay::planner::oracle::{PlanContext, PlanProposal, PlanningOracle};
use longplay::providers::{
    GeneratedAudio, MusicProvider, ProviderCaps, ELEVENLABS_CAPS, STABLE_AUDIO_CAPS,
};
use longplay::store::{put_json, BlobStore, FsStore};
use longplay_common::model::{
    GenerationRequest, SessionPlan, SlotRole, SlotSource, TrackMetadata, TrackSlot,
};
use longplay_common::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Oracle that returns a fixed proposal on every call.
pub struct StubOracle {
    pub proposal: PlanProposal,
}

#[async_trait]
impl PlanningOracle for StubOracle {
    fn model(&self) -> &str {
        "stub-oracle"
    }

    async fn propose(&self, _ctx: &PlanContext<'_>) -> Result<PlanProposal> {
        Ok(self.proposal.clone())
    }
}

/// Oracle whose transport always fails.
pub struct UnreachableOracle;

#[async_trait]
impl PlanningOracle for UnreachableOracle {
    fn model(&self) -> &str {
        "unreachable-oracle"
    }

    async fn propose(&self, _ctx: &PlanContext<'_>) -> Result<PlanProposal> {
        Err(Error::Transport("connection refused".to_string()))
    }
}

/// What a stub provider does when asked to generate.
#[derive(Clone, Copy)]
pub enum StubBehavior {
    /// Return a playable WAV tone of the requested duration
    Succeed,
    /// Fail with a quota error
    Quota,
    /// Fail with a transport error
    Fail,
}

/// Counting provider stub.
pub struct StubProvider {
    caps: &'static ProviderCaps,
    behavior: StubBehavior,
    pub calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn elevenlabs(behavior: StubBehavior) -> Self {
        Self {
            caps: &ELEVENLABS_CAPS,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn stable_audio(behavior: StubBehavior) -> Self {
        Self {
            caps: &STABLE_AUDIO_CAPS,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MusicProvider for StubProvider {
    fn caps(&self) -> &ProviderCaps {
        self.caps
    }

    async fn generate(&self, _prompt: &str, duration_ms: u64) -> Result<GeneratedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            StubBehavior::Succeed => Ok(GeneratedAudio {
                // Short playable audio regardless of the requested
                // length; realized duration intentionally differs
                bytes: wav_bytes(1_200, 0.5),
                reported_duration_ms: Some(1_200),
                reported_bpm: None,
            }),
            StubBehavior::Quota => Err(Error::QuotaExceeded(format!(
                "{} credits exhausted",
                self.caps.name
            ))),
            StubBehavior::Fail => {
                Err(Error::Transport(format!("{} timed out", self.caps.name)))
            }
        }
    }
}

/// 16-bit stereo WAV bytes of a constant-amplitude tone.
pub fn wav_bytes(duration_ms: u64, amplitude: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = duration_ms * 44_100 / 1000;
        let sample = (amplitude * i16::MAX as f32) as i16;
        for _ in 0..frames {
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// A generation slot with a fixed-width duration range.
pub fn gen_slot(order: u32, role: SlotRole, duration_min_ms: u64, duration_max_ms: u64) -> TrackSlot {
    TrackSlot {
        order,
        role,
        title: format!("Untitled {}", order),
        duration_min_ms,
        duration_max_ms,
        bpm_target: 124.0,
        energy: 5,
        source: SlotSource::Generate,
        track_id: None,
        request: Some(GenerationRequest {
            genre: "techno".to_string(),
            subgenre: None,
            mood: "hypnotic late-night atmosphere".to_string(),
            instruments: vec!["deep kick".to_string(), "filtered stabs".to_string()],
            exclusions: vec!["vocals".to_string()],
        }),
    }
}

/// A library-reuse slot.
pub fn lib_slot(order: u32, track_id: &str, duration_ms: u64) -> TrackSlot {
    TrackSlot {
        order,
        role: SlotRole::Sustain,
        title: format!("Reused {}", order),
        duration_min_ms: duration_ms,
        duration_max_ms: duration_ms,
        bpm_target: 124.0,
        energy: 5,
        source: SlotSource::Library,
        track_id: Some(track_id.to_string()),
        request: None,
    }
}

pub fn proposal(slots: Vec<TrackSlot>) -> PlanProposal {
    PlanProposal {
        genre: "techno".to_string(),
        bpm_range: (120.0, 128.0),
        slots,
    }
}

/// A plan that skips validation, for exercising the acquirer directly.
pub fn plan_with_slots(slots: Vec<TrackSlot>) -> SessionPlan {
    SessionPlan {
        concept: "late night focus".to_string(),
        genre: "techno".to_string(),
        target_duration_minutes: 6,
        bpm_range: (120.0, 128.0),
        slots,
        estimated_cost_usd: 0.0,
        model_used: "stub-oracle".to_string(),
    }
}

/// Library track metadata for seeding test stores.
pub fn library_track(id: &str, genre: &str, duration_ms: u64) -> TrackMetadata {
    TrackMetadata {
        id: id.to_string(),
        title: format!("Track {}", id),
        genre: genre.to_string(),
        subgenre: None,
        bpm: 124.0,
        duration_ms,
        energy: 5,
        role: SlotRole::Sustain,
        key: None,
        provider: "stable_audio".to_string(),
        prompt_hash: "feedfacefeedface".to_string(),
        session_id: "session_seed".to_string(),
        quality: None,
        usage_count: 0,
        created_at: Utc::now(),
        last_used_at: None,
    }
}

/// Seed a track (sidecar + playable audio) into an FsStore.
pub async fn seed_library_track(store: &FsStore, meta: &TrackMetadata) {
    put_json(store, &meta.metadata_key(), meta).await.unwrap();
    store
        .put(&meta.audio_key(), &wav_bytes(meta.duration_ms, 0.5))
        .await
        .unwrap();
}
