//! Session orchestration
//!
//! One session = one planned-and-mixed output unit. The runner
//! executes a validated plan as a strict pipeline: acquire every
//! slot, mix, then persist. The session directory (and the matching
//! `sessions/{id}/` prefix in the store) holds the plan, per-track
//! audio and sidecars, the final mix, the tracklist, and a summary.
//! Nothing is uploaded until the mix exists, so a failed run leaves
//! no artifact that could be mistaken for output.

use chrono::{DateTime, Utc};
use longplay_common::model::SessionPlan;
use longplay_common::{time, Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::acquire::{AcquiredTrack, TrackAcquirer};
use crate::mix::{self, export, MixInput, MixOptions, TracklistEntry};
use crate::providers::caps_for_name;
use crate::store::BlobStore;

/// Session ids carry their creation time, which keeps local output
/// directories and store prefixes naturally sorted.
pub fn new_session_id(now: DateTime<Utc>) -> String {
    format!("session_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Result of the mixing stage
#[derive(Debug, Clone)]
pub struct MixReport {
    pub output_path: PathBuf,
    pub tracklist_path: PathBuf,
    pub total_duration_ms: u64,
    pub tracklist: Vec<TracklistEntry>,
}

/// Result of a full session run
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub session_dir: PathBuf,
    pub reused_count: usize,
    pub generated_count: usize,
    pub actual_cost_usd: f64,
    pub mix: MixReport,
}

#[derive(Serialize)]
struct SessionSummary<'a> {
    session_id: &'a str,
    concept: &'a str,
    genre: &'a str,
    model_used: &'a str,
    target_duration_minutes: u32,
    total_slots: usize,
    reused_count: usize,
    generated_count: usize,
    estimated_cost_usd: f64,
    actual_cost_usd: f64,
    total_duration_ms: u64,
    created_at: DateTime<Utc>,
    tracklist: &'a [TracklistEntry],
}

/// Executes validated plans end to end.
pub struct SessionRunner {
    store: Arc<dyn BlobStore>,
    acquirer: TrackAcquirer,
    output_dir: PathBuf,
    mix_options: MixOptions,
}

impl SessionRunner {
    pub fn new(
        store: Arc<dyn BlobStore>,
        acquirer: TrackAcquirer,
        output_dir: PathBuf,
        mix_options: MixOptions,
    ) -> Self {
        Self {
            store,
            acquirer,
            output_dir,
            mix_options,
        }
    }

    /// Run a validated plan: acquire, mix, persist, upload.
    pub async fn run(&self, plan: &SessionPlan) -> Result<SessionOutcome> {
        let session_id = new_session_id(time::now());
        let session_dir = self.output_dir.join(&session_id);
        tokio::fs::create_dir_all(&session_dir).await?;

        info!(
            session_id,
            concept = %plan.concept,
            slots = plan.slots.len(),
            estimated_cost_usd = plan.estimated_cost_usd,
            "executing session plan"
        );

        let plan_path = session_dir.join("plan.json");
        tokio::fs::write(&plan_path, to_pretty_json(plan)?).await?;

        let tracks = self
            .acquirer
            .acquire_all(plan, &session_id, &session_dir)
            .await?;

        let reused_count = tracks.iter().filter(|t| t.reused).count();
        let generated_count = tracks.len() - reused_count;
        let actual_cost_usd = actual_cost(&tracks);

        let mix = mix_acquired_tracks(&tracks, &session_dir, &self.mix_options)?;

        let summary = SessionSummary {
            session_id: &session_id,
            concept: &plan.concept,
            genre: &plan.genre,
            model_used: &plan.model_used,
            target_duration_minutes: plan.target_duration_minutes,
            total_slots: plan.slots.len(),
            reused_count,
            generated_count,
            estimated_cost_usd: plan.estimated_cost_usd,
            actual_cost_usd,
            total_duration_ms: mix.total_duration_ms,
            created_at: time::now(),
            tracklist: &mix.tracklist,
        };
        let summary_path = session_dir.join("session.json");
        tokio::fs::write(&summary_path, to_pretty_json(&summary)?).await?;

        self.upload_session_artifacts(&session_id, plan, &mix, &summary_path)
            .await?;

        info!(
            session_id,
            reused_count,
            generated_count,
            actual_cost_usd,
            total_duration_ms = mix.total_duration_ms,
            "session complete"
        );

        Ok(SessionOutcome {
            session_id,
            session_dir,
            reused_count,
            generated_count,
            actual_cost_usd,
            mix,
        })
    }

    async fn upload_session_artifacts(
        &self,
        session_id: &str,
        plan: &SessionPlan,
        mix: &MixReport,
        summary_path: &Path,
    ) -> Result<()> {
        let prefix = format!("sessions/{}", session_id);

        self.store
            .put(&format!("{}/plan.json", prefix), &to_pretty_json(plan)?)
            .await?;
        self.store
            .put(
                &format!("{}/audio/final_mix.wav", prefix),
                &tokio::fs::read(&mix.output_path).await?,
            )
            .await?;
        self.store
            .put(
                &format!("{}/audio/tracklist.txt", prefix),
                &tokio::fs::read(&mix.tracklist_path).await?,
            )
            .await?;
        self.store
            .put(
                &format!("{}/session.json", prefix),
                &tokio::fs::read(summary_path).await?,
            )
            .await?;
        info!(session_id, "session artifacts uploaded");
        Ok(())
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value)
        .map_err(|e| Error::Validation(format!("failed to serialize artifact: {}", e)))
}

/// Actual spend: realized provider and duration per generated track.
fn actual_cost(tracks: &[AcquiredTrack]) -> f64 {
    let total: f64 = tracks
        .iter()
        .filter(|t| !t.reused)
        .filter_map(|t| caps_for_name(&t.provider).map(|caps| caps.cost(t.duration_ms)))
        .sum();
    (total * 100.0).round() / 100.0
}

/// Decode the acquired tracks in order and hand them to the composer.
pub fn mix_acquired_tracks(
    tracks: &[AcquiredTrack],
    session_dir: &Path,
    options: &MixOptions,
) -> Result<MixReport> {
    let mut inputs = Vec::with_capacity(tracks.len());
    for track in tracks {
        inputs.push(MixInput {
            title: track.title.clone(),
            clip: mix::decode::decode_file(&track.audio_path)?,
        });
    }
    let mixed = mix::compose(&inputs, options)?;

    let output_path = session_dir.join("final_mix.wav");
    let tracklist_path = session_dir.join("tracklist.txt");
    export::write_wav(&mixed.clip, &output_path)?;
    export::write_tracklist(&mixed.tracklist, &tracklist_path)?;

    Ok(MixReport {
        output_path,
        tracklist_path,
        total_duration_ms: mixed.total_duration_ms,
        tracklist: mixed.tracklist,
    })
}

/// Mix the tracks already sitting in a session directory.
///
/// Discovers `track_NN*` audio files, takes titles from the companion
/// sidecars, and composes them in order. Lets a session be re-mixed
/// with different crossfade settings without touching providers.
pub fn mix_session_dir(session_dir: &Path, options: &MixOptions) -> Result<MixReport> {
    let mut discovered: Vec<(u32, String, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(session_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_audio = ["mp3", "wav", "flac"]
            .iter()
            .any(|ext| name.ends_with(&format!(".{}", ext)));
        if !is_audio {
            continue;
        }
        let Some(order) = parse_track_order(name) else {
            continue;
        };

        let title = sidecar_title(&path).unwrap_or_else(|| format!("Track {}", order));
        discovered.push((order, title, path));
    }

    if discovered.is_empty() {
        return Err(Error::Validation(format!(
            "no tracks found in {}",
            session_dir.display()
        )));
    }
    discovered.sort_by_key(|(order, _, _)| *order);

    let mut inputs = Vec::with_capacity(discovered.len());
    for (_, title, path) in &discovered {
        inputs.push(MixInput {
            title: title.clone(),
            clip: mix::decode::decode_file(path)?,
        });
    }
    let mixed = mix::compose(&inputs, options)?;

    let output_path = session_dir.join("final_mix.wav");
    let tracklist_path = session_dir.join("tracklist.txt");
    export::write_wav(&mixed.clip, &output_path)?;
    export::write_tracklist(&mixed.tracklist, &tracklist_path)?;

    Ok(MixReport {
        output_path,
        tracklist_path,
        total_duration_ms: mixed.total_duration_ms,
        tracklist: mixed.tracklist,
    })
}

/// Extract NN from `track_NN[...].ext` file names.
fn parse_track_order(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("track_")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    match rest.as_bytes().get(digits.len()) {
        Some(b'_') | Some(b'.') => digits.parse().ok(),
        _ => None,
    }
}

/// Title from the companion `.json` sidecar, if present and readable.
fn sidecar_title(audio_path: &Path) -> Option<String> {
    let sidecar = audio_path.with_extension("json");
    let bytes = std::fs::read(sidecar).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value.get("title")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_id_embeds_creation_time() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(new_session_id(ts), "session_20260314_092653");
    }

    #[test]
    fn track_order_parsing() {
        assert_eq!(parse_track_order("track_01.mp3"), Some(1));
        assert_eq!(parse_track_order("track_07_reused.mp3"), Some(7));
        assert_eq!(parse_track_order("track_12.wav"), Some(12));
        assert_eq!(parse_track_order("final_mix.wav"), None);
        assert_eq!(parse_track_order("track_.mp3"), None);
        assert_eq!(parse_track_order("track_7b.mp3"), None);
    }
}
