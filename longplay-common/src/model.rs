//! Data models shared across the pipeline
//!
//! Track metadata sidecars, session plans, and the slot structures the
//! planner and acquirer exchange. All of these serialize as JSON: the
//! sidecars live next to the audio objects in the library store, plans
//! are persisted per session, and the planning oracle speaks the same
//! slot shape over the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hard lower bound for a planned slot duration (2 minutes)
pub const MIN_SLOT_DURATION_MS: u64 = 120_000;

/// Hard upper bound for a planned slot duration (8 minutes)
pub const MAX_SLOT_DURATION_MS: u64 = 480_000;

/// Role a slot plays in the session's energy arc.
///
/// The canonical values cover the arcs the planner produces today; the
/// oracle is allowed to invent additional roles, which round-trip
/// through `Other` without loss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SlotRole {
    Intro,
    Build,
    Peak,
    Sustain,
    Cooldown,
    Outro,
    Other(String),
}

impl SlotRole {
    pub fn as_str(&self) -> &str {
        match self {
            SlotRole::Intro => "intro",
            SlotRole::Build => "build",
            SlotRole::Peak => "peak",
            SlotRole::Sustain => "sustain",
            SlotRole::Cooldown => "cooldown",
            SlotRole::Outro => "outro",
            SlotRole::Other(s) => s,
        }
    }

    /// Hero roles are the anchor moments of a set (opening, peaks,
    /// closing) and are routed to the higher-quality provider.
    pub fn is_hero(&self) -> bool {
        matches!(self, SlotRole::Intro | SlotRole::Peak | SlotRole::Outro)
    }
}

impl From<String> for SlotRole {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "intro" => SlotRole::Intro,
            "build" => SlotRole::Build,
            "peak" => SlotRole::Peak,
            "sustain" => SlotRole::Sustain,
            "cooldown" | "wind_down" => SlotRole::Cooldown,
            "outro" => SlotRole::Outro,
            _ => SlotRole::Other(s),
        }
    }
}

impl From<SlotRole> for String {
    fn from(role: SlotRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for SlotRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a slot's audio comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotSource {
    /// Reuse an existing library track (free)
    Library,
    /// Request new generation from a provider
    Generate,
}

/// Parameters for generating a new track. Pure data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgenre: Option<String>,
    pub mood: String,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

impl GenerationRequest {
    /// Render the layered provider prompt: genre + BPM + instruments +
    /// mood + exclusions.
    pub fn render_prompt(&self, bpm: f32) -> String {
        let mut parts: Vec<String> = Vec::new();

        let genre = match &self.subgenre {
            Some(sub) => format!("{} ({})", self.genre, sub),
            None => self.genre.clone(),
        };
        parts.push(format!("{} at {:.0} BPM", genre, bpm));

        if !self.instruments.is_empty() {
            parts.push(self.instruments.join(", "));
        }
        if !self.mood.is_empty() {
            parts.push(self.mood.clone());
        }
        if !self.exclusions.is_empty() {
            parts.push(format!("No {}", self.exclusions.join(", no ")));
        }

        parts.join(". ") + "."
    }
}

/// Metadata sidecar for a track stored in the library.
///
/// Lives at `library/tracks/{genre}/{id}.json` next to the audio
/// object. `last_used_at` and `usage_count` are mutated each time a
/// session reuses the track; nothing in this pipeline ever deletes a
/// sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub id: String,
    pub title: String,
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgenre: Option<String>,
    pub bpm: f32,
    pub duration_ms: u64,
    pub energy: u8,
    pub role: SlotRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub provider: String,
    /// SHA-256 prefix of the generation prompt, for provenance and
    /// dedup; the full prompt is not stored.
    pub prompt_hash: String,
    /// Session that created this track
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<i32>,
    #[serde(default)]
    pub usage_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl TrackMetadata {
    /// Create metadata for a freshly generated track.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: impl Into<String>,
        genre: impl Into<String>,
        subgenre: Option<String>,
        bpm: f32,
        duration_ms: u64,
        energy: u8,
        role: SlotRole,
        provider: impl Into<String>,
        prompt: &str,
        session_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: short_id(),
            title: title.into(),
            genre: genre.into(),
            subgenre,
            bpm,
            duration_ms,
            energy,
            role,
            key: None,
            provider: provider.into(),
            prompt_hash: prompt_hash(prompt),
            session_id: session_id.into(),
            quality: None,
            usage_count: 0,
            created_at,
            last_used_at: None,
        }
    }

    /// Update usage tracking when the track is reused by a session.
    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.last_used_at = Some(now);
        self.usage_count += 1;
    }

    /// Store key for the audio object
    pub fn audio_key(&self) -> String {
        format!("library/tracks/{}/{}.mp3", self.genre, self.id)
    }

    /// Store key for this metadata sidecar
    pub fn metadata_key(&self) -> String {
        format!("library/tracks/{}/{}.json", self.genre, self.id)
    }
}

/// Random 8-character track/session id fragment
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// SHA-256 prefix (16 hex chars) of a generation prompt
pub fn prompt_hash(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..16].to_string()
}

/// One position in a planned session.
///
/// Exactly one of `track_id` (source = library) or `request`
/// (source = generate) is set; plan validation rejects anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSlot {
    /// 1-based position; contiguous across the plan
    pub order: u32,
    pub role: SlotRole,
    pub title: String,
    /// Target duration range, both ends inside the 2–8 minute hard bound
    pub duration_min_ms: u64,
    pub duration_max_ms: u64,
    /// Continuity hint only; never measured from audio
    pub bpm_target: f32,
    /// 1–10
    pub energy: u8,
    pub source: SlotSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<GenerationRequest>,
}

impl TrackSlot {
    /// Midpoint of the target duration range; used for tolerance-band
    /// math and as the duration requested from providers.
    pub fn target_duration_ms(&self) -> u64 {
        (self.duration_min_ms + self.duration_max_ms) / 2
    }
}

/// A complete, validated plan for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    /// Original user concept
    pub concept: String,
    /// Genre the oracle settled on
    pub genre: String,
    pub target_duration_minutes: u32,
    /// (low, high), low <= high
    pub bpm_range: (f32, f32),
    pub slots: Vec<TrackSlot>,
    /// Sum over generate slots of the provider cost table; reuse is free
    pub estimated_cost_usd: f64,
    /// Oracle model id, for provenance
    pub model_used: String,
}

impl SessionPlan {
    pub fn library_slots(&self) -> impl Iterator<Item = &TrackSlot> {
        self.slots
            .iter()
            .filter(|s| s.source == SlotSource::Library)
    }

    pub fn generation_slots(&self) -> impl Iterator<Item = &TrackSlot> {
        self.slots
            .iter()
            .filter(|s| s.source == SlotSource::Generate)
    }

    /// Planned total duration: sum of slot target midpoints.
    pub fn planned_duration_ms(&self) -> u64 {
        self.slots.iter().map(|s| s.target_duration_ms()).sum()
    }
}
