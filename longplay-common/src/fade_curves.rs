//! Fade curve implementations for crossfading
//!
//! Provides the gain ramps used when splicing adjacent clips. The mix
//! composer pairs one clip's fade-out with the next clip's fade-in
//! across the overlap window.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Fade curve types for crossfading
///
/// - Linear: equal-gain ramp; the summed gains are constant but
///   perceived loudness dips at the crossfade midpoint
/// - SCurve: smooth acceleration and deceleration
/// - EqualPower: constant perceived loudness during the crossfade;
///   the default for mix junctions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear: v(t) = t
    Linear,

    /// S-Curve: v(t) = 0.5 × (1 - cos(π × t))
    SCurve,

    /// Equal-Power: v(t) = sin(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Calculate fade-in multiplier at the given normalized position.
    ///
    /// `position` runs 0.0 (start of fade) to 1.0 (end of fade); the
    /// result runs 0.0 (silence) to 1.0 (full volume).
    pub fn fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::SCurve => 0.5 * (1.0 - (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Calculate fade-out multiplier at the given normalized position.
    ///
    /// `position` runs 0.0 (start of fade-out) to 1.0 (end); the
    /// result runs 1.0 (full volume) down to 0.0 (silence).
    pub fn fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::SCurve => 0.5 * (1.0 + (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Parse a curve name (from config).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" | "equal_gain" => Some(FadeCurve::Linear),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Some(FadeCurve::SCurve),
            "equal_power" | "equalpower" => Some(FadeCurve::EqualPower),
            _ => None,
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::SCurve => "S-Curve",
            FadeCurve::EqualPower => "Equal Power",
        }
    }

    /// All available fade curve variants
    pub fn all_variants() -> &'static [FadeCurve] {
        &[FadeCurve::Linear, FadeCurve::SCurve, FadeCurve::EqualPower]
    }
}

impl Default for FadeCurve {
    /// Equal-power is the default: it avoids the perceived level dip
    /// at the crossfade midpoint that equal-gain ramps produce.
    fn default() -> Self {
        FadeCurve::EqualPower
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
