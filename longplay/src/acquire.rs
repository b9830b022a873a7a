//! Track acquisition
//!
//! Resolves each planned slot to concrete audio on disk: library
//! slots are fetched from the store (and their usage stats updated),
//! generate slots are dispatched to a provider by the role-based
//! routing rule. Slots are independent, so acquisition fans out
//! concurrently; the first fatal slot error cancels everything still
//! in flight and fails the run. Partial sessions are never assembled.
//!
//! The one piece of resilience logic lives here: a generate slot
//! whose routed provider fails with a quota or transport error is
//! retried exactly once against the other provider. There is no
//! second fallback.

use longplay_common::model::{SessionPlan, SlotRole, SlotSource, TrackMetadata, TrackSlot};
use longplay_common::{time, Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::providers::{MusicProvider, ProviderKind};
use crate::store::{get_json, put_json, BlobStore};

/// A slot resolved to audio on disk plus its realized metadata.
#[derive(Debug, Clone)]
pub struct AcquiredTrack {
    pub order: u32,
    pub title: String,
    pub role: SlotRole,
    pub audio_path: PathBuf,
    /// Realized duration; may differ from the slot target
    pub duration_ms: u64,
    pub bpm: f32,
    pub provider: String,
    pub reused: bool,
}

/// Materializes plan slots into session-local audio files.
#[derive(Clone)]
pub struct TrackAcquirer {
    store: Arc<dyn BlobStore>,
    elevenlabs: Arc<dyn MusicProvider>,
    stable_audio: Arc<dyn MusicProvider>,
}

impl TrackAcquirer {
    pub fn new(
        store: Arc<dyn BlobStore>,
        elevenlabs: Arc<dyn MusicProvider>,
        stable_audio: Arc<dyn MusicProvider>,
    ) -> Self {
        Self {
            store,
            elevenlabs,
            stable_audio,
        }
    }

    fn provider(&self, kind: ProviderKind) -> &Arc<dyn MusicProvider> {
        match kind {
            ProviderKind::ElevenLabs => &self.elevenlabs,
            ProviderKind::StableAudio => &self.stable_audio,
        }
    }

    /// Acquire every slot of a validated plan.
    ///
    /// Fans out one task per slot; results come back in slot order.
    /// On the first slot failure the remaining in-flight acquisitions
    /// are cancelled and the error propagates unchanged.
    pub async fn acquire_all(
        &self,
        plan: &SessionPlan,
        session_id: &str,
        session_dir: &Path,
    ) -> Result<Vec<AcquiredTrack>> {
        tokio::fs::create_dir_all(session_dir).await?;

        let cancel = CancellationToken::new();
        let mut tasks: JoinSet<Result<AcquiredTrack>> = JoinSet::new();

        for slot in plan.slots.clone() {
            let acquirer = self.clone();
            let cancel = cancel.clone();
            let genre = plan.genre.clone();
            let session_id = session_id.to_string();
            let session_dir = session_dir.to_path_buf();

            tasks.spawn(async move {
                tokio::select! {
                    result = acquirer.acquire_slot(&slot, &genre, &session_id, &session_dir) => result,
                    _ = cancel.cancelled() => {
                        Err(Error::Transport(format!(
                            "slot {} acquisition cancelled",
                            slot.order
                        )))
                    }
                }
            });
        }

        let mut acquired = Vec::with_capacity(plan.slots.len());
        let mut first_error: Option<Error> = None;

        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(Error::Transport(format!("acquisition task failed: {}", e)))
            });
            match result {
                Ok(track) => acquired.push(track),
                Err(e) => {
                    // Keep the root cause; later arrivals are cancellation noise
                    if first_error.is_none() {
                        first_error = Some(e);
                        cancel.cancel();
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        acquired.sort_by_key(|t| t.order);
        info!(
            session_id,
            tracks = acquired.len(),
            reused = acquired.iter().filter(|t| t.reused).count(),
            "all slots acquired"
        );
        Ok(acquired)
    }

    async fn acquire_slot(
        &self,
        slot: &TrackSlot,
        plan_genre: &str,
        session_id: &str,
        session_dir: &Path,
    ) -> Result<AcquiredTrack> {
        match slot.source {
            SlotSource::Library => self.reuse_library_track(slot, session_dir).await,
            SlotSource::Generate => {
                self.generate_track(slot, plan_genre, session_id, session_dir)
                    .await
            }
        }
    }

    /// Locate a track's sidecar without knowing its genre folder.
    async fn find_sidecar_key(&self, track_id: &str) -> Result<String> {
        let suffix = format!("/{}.json", track_id);
        let keys = self.store.list(crate::library::TRACKS_PREFIX).await?;
        keys.into_iter()
            .find(|k| k.ends_with(&suffix))
            .ok_or_else(|| Error::NotFound(format!("library track {}", track_id)))
    }

    /// Download a library track into the session and bump its usage
    /// stats in the store. Any fetch failure is fatal to the run: a
    /// missing slot would break mix contiguity.
    async fn reuse_library_track(
        &self,
        slot: &TrackSlot,
        session_dir: &Path,
    ) -> Result<AcquiredTrack> {
        let track_id = slot
            .track_id
            .as_deref()
            .ok_or_else(|| Error::Validation(format!("slot {} has no track_id", slot.order)))?;

        let sidecar_key = self.find_sidecar_key(track_id).await?;
        let audio_key = sidecar_key.replace(".json", ".mp3");

        let audio = self.store.get(&audio_key).await?;
        let mut meta: TrackMetadata = get_json(self.store.as_ref(), &sidecar_key).await?;

        let previous_uses = meta.usage_count;
        meta.mark_used(time::now());
        put_json(self.store.as_ref(), &sidecar_key, &meta).await?;
        info!(
            track_id,
            title = %meta.title,
            usage_count = meta.usage_count,
            previous_uses,
            "reusing library track"
        );

        let audio_path = session_dir.join(format!("track_{:02}_reused.mp3", slot.order));
        tokio::fs::write(&audio_path, &audio).await?;
        let sidecar_path = session_dir.join(format!("track_{:02}_reused.json", slot.order));
        tokio::fs::write(&sidecar_path, serde_json::to_vec_pretty(&meta).unwrap_or_default())
            .await?;

        Ok(AcquiredTrack {
            order: slot.order,
            title: meta.title.clone(),
            role: slot.role.clone(),
            audio_path,
            duration_ms: meta.duration_ms,
            bpm: meta.bpm,
            provider: meta.provider.clone(),
            reused: true,
        })
    }

    /// Generate a slot's audio, applying the role-based routing rule
    /// and at most one fallback to the other provider.
    async fn generate_track(
        &self,
        slot: &TrackSlot,
        plan_genre: &str,
        session_id: &str,
        session_dir: &Path,
    ) -> Result<AcquiredTrack> {
        let request = slot.request.as_ref().ok_or_else(|| {
            Error::Validation(format!("slot {} has no generation request", slot.order))
        })?;
        let prompt = request.render_prompt(slot.bpm_target);
        let target_ms = slot.target_duration_ms();

        let primary = ProviderKind::for_role(&slot.role);
        let (audio, used) = match self.dispatch(primary, &prompt, target_ms).await {
            Ok(audio) => (audio, primary),
            Err(e) if e.is_transient() => {
                let fallback = primary.fallback();
                warn!(
                    order = slot.order,
                    primary = primary.name(),
                    fallback = fallback.name(),
                    error = %e,
                    "provider failed, trying fallback"
                );
                let audio = self.dispatch(fallback, &prompt, target_ms).await?;
                (audio, fallback)
            }
            Err(e) => return Err(e),
        };

        let realized_ms = audio
            .reported_duration_ms
            .unwrap_or_else(|| used.caps().clamp_duration(target_ms));
        let bpm = audio.reported_bpm.unwrap_or(slot.bpm_target);

        let audio_path = session_dir.join(format!("track_{:02}.mp3", slot.order));
        tokio::fs::write(&audio_path, &audio.bytes).await?;

        // New tracks join the library immediately so future sessions
        // can reuse them
        let meta = TrackMetadata::new(
            slot.title.clone(),
            plan_genre,
            request.subgenre.clone(),
            bpm,
            realized_ms,
            slot.energy,
            slot.role.clone(),
            used.name(),
            &prompt,
            session_id,
            time::now(),
        );
        self.store.put(&meta.audio_key(), &audio.bytes).await?;
        put_json(self.store.as_ref(), &meta.metadata_key(), &meta).await?;

        let sidecar_path = session_dir.join(format!("track_{:02}.json", slot.order));
        tokio::fs::write(&sidecar_path, serde_json::to_vec_pretty(&meta).unwrap_or_default())
            .await?;

        info!(
            order = slot.order,
            title = %slot.title,
            provider = used.name(),
            duration_ms = realized_ms,
            "generated track"
        );

        Ok(AcquiredTrack {
            order: slot.order,
            title: slot.title.clone(),
            role: slot.role.clone(),
            audio_path,
            duration_ms: realized_ms,
            bpm,
            provider: used.name().to_string(),
            reused: false,
        })
    }

    async fn dispatch(
        &self,
        kind: ProviderKind,
        prompt: &str,
        target_ms: u64,
    ) -> Result<crate::providers::GeneratedAudio> {
        let provider = self.provider(kind);
        let duration = provider.caps().clamp_duration(target_ms);
        provider.generate(prompt, duration).await
    }
}
