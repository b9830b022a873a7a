//! Music generation providers
//!
//! Two external synthesis backends with different cost models and
//! duration ceilings. Slot routing is a fixed role-based rule: hero
//! roles (intro/peak/outro) go to ElevenLabs, everything else to
//! Stable Audio; each kind has exactly one fallback (the other one).

mod elevenlabs;
mod stable_audio;

pub use elevenlabs::ElevenLabsProvider;
pub use stable_audio::StableAudioProvider;

use async_trait::async_trait;
use longplay_common::model::SlotRole;
use longplay_common::Result;

/// Static capabilities and cost model of a provider.
///
/// Exactly one of `cost_per_track` (flat rate) or `cost_per_ms`
/// (metered) is set.
#[derive(Debug, Clone, Copy)]
pub struct ProviderCaps {
    pub name: &'static str,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub cost_per_track: Option<f64>,
    pub cost_per_ms: Option<f64>,
}

impl ProviderCaps {
    /// Clamp a requested duration into this provider's supported range.
    pub fn clamp_duration(&self, duration_ms: u64) -> u64 {
        duration_ms.clamp(self.min_duration_ms, self.max_duration_ms)
    }

    /// Cost of one track of the given (already clamped) duration.
    pub fn cost(&self, duration_ms: u64) -> f64 {
        if let Some(flat) = self.cost_per_track {
            flat
        } else if let Some(per_ms) = self.cost_per_ms {
            per_ms * duration_ms as f64
        } else {
            0.0
        }
    }
}

/// ElevenLabs Music: metered, longer ceiling, hero-quality output.
pub const ELEVENLABS_CAPS: ProviderCaps = ProviderCaps {
    name: "elevenlabs",
    min_duration_ms: 10_000,
    max_duration_ms: 300_000,
    cost_per_track: None,
    cost_per_ms: Some(0.000_005),
};

/// Stable Audio: flat rate, hard 190 s ceiling.
pub const STABLE_AUDIO_CAPS: ProviderCaps = ProviderCaps {
    name: "stable_audio",
    min_duration_ms: 1_000,
    max_duration_ms: 190_000,
    cost_per_track: Some(0.20),
    cost_per_ms: None,
};

/// The fixed set of generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    ElevenLabs,
    StableAudio,
}

impl ProviderKind {
    /// Role-based routing rule: hero roles get the premium provider.
    pub fn for_role(role: &SlotRole) -> Self {
        if role.is_hero() {
            ProviderKind::ElevenLabs
        } else {
            ProviderKind::StableAudio
        }
    }

    /// The one fallback tried after a quota or transport failure.
    pub fn fallback(self) -> Self {
        match self {
            ProviderKind::ElevenLabs => ProviderKind::StableAudio,
            ProviderKind::StableAudio => ProviderKind::ElevenLabs,
        }
    }

    pub fn caps(self) -> &'static ProviderCaps {
        match self {
            ProviderKind::ElevenLabs => &ELEVENLABS_CAPS,
            ProviderKind::StableAudio => &STABLE_AUDIO_CAPS,
        }
    }

    pub fn name(self) -> &'static str {
        self.caps().name
    }
}

/// Look up the caps/cost table by provider name as recorded in
/// metadata sidecars. Unknown names (a provider retired from the
/// routing table) get no cost attribution.
pub fn caps_for_name(name: &str) -> Option<&'static ProviderCaps> {
    match name {
        "elevenlabs" => Some(&ELEVENLABS_CAPS),
        "stable_audio" => Some(&STABLE_AUDIO_CAPS),
        _ => None,
    }
}

/// Cost the planner attributes to one generate slot: route by role,
/// clamp the target duration to the routed provider's range, and read
/// the cost table. Library slots cost zero by definition.
pub fn estimate_generation_cost(role: &SlotRole, target_duration_ms: u64) -> f64 {
    let caps = ProviderKind::for_role(role).caps();
    caps.cost(caps.clamp_duration(target_duration_ms))
}

/// Raw output of one generation call.
#[derive(Debug, Clone)]
pub struct GeneratedAudio {
    pub bytes: Vec<u8>,
    /// Duration the provider reports, when it reports one
    pub reported_duration_ms: Option<u64>,
    pub reported_bpm: Option<f32>,
}

/// A synthesis backend. Implementations are thin request/response
/// wrappers; quota exhaustion must surface as `Error::QuotaExceeded`
/// so the acquirer can apply its one-shot fallback.
#[async_trait]
pub trait MusicProvider: Send + Sync {
    fn caps(&self) -> &ProviderCaps;

    fn name(&self) -> &'static str {
        self.caps().name
    }

    /// Generate one track. `duration_ms` must already be clamped into
    /// the provider's supported range.
    async fn generate(&self, prompt: &str, duration_ms: u64) -> Result<GeneratedAudio>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hero_roles_route_to_elevenlabs() {
        assert_eq!(
            ProviderKind::for_role(&SlotRole::Intro),
            ProviderKind::ElevenLabs
        );
        assert_eq!(
            ProviderKind::for_role(&SlotRole::Peak),
            ProviderKind::ElevenLabs
        );
        assert_eq!(
            ProviderKind::for_role(&SlotRole::Outro),
            ProviderKind::ElevenLabs
        );
        assert_eq!(
            ProviderKind::for_role(&SlotRole::Build),
            ProviderKind::StableAudio
        );
        assert_eq!(
            ProviderKind::for_role(&SlotRole::Sustain),
            ProviderKind::StableAudio
        );
        assert_eq!(
            ProviderKind::for_role(&SlotRole::Other("bridge".into())),
            ProviderKind::StableAudio
        );
    }

    #[test]
    fn fallback_is_the_other_provider() {
        assert_eq!(
            ProviderKind::ElevenLabs.fallback(),
            ProviderKind::StableAudio
        );
        assert_eq!(
            ProviderKind::StableAudio.fallback(),
            ProviderKind::ElevenLabs
        );
    }

    #[test]
    fn duration_clamping() {
        assert_eq!(STABLE_AUDIO_CAPS.clamp_duration(240_000), 190_000);
        assert_eq!(ELEVENLABS_CAPS.clamp_duration(240_000), 240_000);
        assert_eq!(ELEVENLABS_CAPS.clamp_duration(480_000), 300_000);
        assert_eq!(ELEVENLABS_CAPS.clamp_duration(5_000), 10_000);
    }

    #[test]
    fn cost_table() {
        // Flat rate regardless of duration
        assert_eq!(STABLE_AUDIO_CAPS.cost(120_000), 0.20);
        assert_eq!(STABLE_AUDIO_CAPS.cost(190_000), 0.20);
        // Metered: $0.000005/ms => $0.90 for a 3 minute track
        let cost = ELEVENLABS_CAPS.cost(180_000);
        assert!((cost - 0.90).abs() < 1e-9);
    }

    #[test]
    fn slot_cost_estimate_routes_and_clamps() {
        // Sustain routes to stable_audio: flat
        assert_eq!(estimate_generation_cost(&SlotRole::Sustain, 180_000), 0.20);
        // Peak routes to elevenlabs and clamps 480s down to 300s
        let cost = estimate_generation_cost(&SlotRole::Peak, 480_000);
        assert!((cost - 1.5).abs() < 1e-9);
    }
}
