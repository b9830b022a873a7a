//! Session planning
//!
//! Orchestrates the content index and the planning oracle into a
//! validated [`SessionPlan`]. The oracle's proposal is untrusted:
//! every structural invariant is checked here, and a violation fails
//! the call with the offending field named. There is no internal
//! retry; retry policy belongs to the caller.

pub mod oracle;

use longplay_common::model::{
    SessionPlan, SlotSource, TrackMetadata, MAX_SLOT_DURATION_MS, MIN_SLOT_DURATION_MS,
};
use longplay_common::{time, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::library::ContentIndex;
use crate::providers::estimate_generation_cost;
use oracle::{PlanContext, PlanProposal, PlanningOracle};

/// Allowed deviation between the planned total duration and the
/// requested target, as a fraction of the target.
pub const DURATION_TOLERANCE: f64 = 0.10;

/// Upper bound on candidates handed to the oracle per call
pub const CANDIDATE_LIMIT: usize = 50;

/// Ordered keyword table for the deterministic genre hypothesis.
/// First match wins; multi-word entries come before their substrings.
const GENRE_KEYWORDS: &[(&str, &str)] = &[
    ("drum and bass", "drum_and_bass"),
    ("dnb", "drum_and_bass"),
    ("deep house", "deep_house"),
    ("house", "house"),
    ("minimal techno", "techno"),
    ("techno", "techno"),
    ("trance", "trance"),
    ("ambient", "ambient"),
    ("drone", "ambient"),
    ("lo-fi", "lofi"),
    ("lofi", "lofi"),
    ("hip hop", "hiphop"),
    ("jazz", "jazz"),
    ("piano", "piano"),
    ("classical", "classical"),
];

/// Derive the genre hypothesis from the concept text.
///
/// Pure keyword scan, fully deterministic: the first table entry found
/// in the lowercased concept wins, and concepts that name no known
/// genre fall back to "electronic". The oracle may still settle on a
/// different genre for the final plan.
pub fn infer_genre(concept: &str) -> &'static str {
    let lowered = concept.to_lowercase();
    GENRE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, genre)| *genre)
        .unwrap_or("electronic")
}

/// Plans sessions by reconciling the library against the oracle's
/// judgment.
pub struct SessionPlanner {
    index: ContentIndex,
    oracle: Arc<dyn PlanningOracle>,
}

impl SessionPlanner {
    pub fn new(index: ContentIndex, oracle: Arc<dyn PlanningOracle>) -> Self {
        Self { index, oracle }
    }

    /// Produce a validated plan for `concept`.
    ///
    /// With `allow_library_reuse` the index is consulted for candidates
    /// not used within `exclude_days`; an empty candidate list is not
    /// an error (every slot simply becomes a generation request).
    pub async fn plan(
        &self,
        concept: &str,
        target_duration_minutes: u32,
        exclude_days: i64,
        allow_library_reuse: bool,
    ) -> Result<SessionPlan> {
        let genre_hint = infer_genre(concept);
        let candidates = if allow_library_reuse {
            self.index
                .query(genre_hint, exclude_days, CANDIDATE_LIMIT, time::now())
                .await?
        } else {
            Vec::new()
        };

        let ctx = PlanContext {
            concept,
            genre_hint,
            candidates: &candidates,
            target_duration_minutes,
        };
        let proposal = self.oracle.propose(&ctx).await?;

        validate_proposal(&proposal, &candidates, target_duration_minutes)?;
        let estimated_cost_usd = estimate_plan_cost(&proposal);

        let plan = SessionPlan {
            concept: concept.to_string(),
            genre: proposal.genre,
            target_duration_minutes,
            bpm_range: proposal.bpm_range,
            slots: proposal.slots,
            estimated_cost_usd,
            model_used: self.oracle.model().to_string(),
        };

        info!(
            genre = %plan.genre,
            slots = plan.slots.len(),
            reuse = plan.library_slots().count(),
            generate = plan.generation_slots().count(),
            cost_usd = plan.estimated_cost_usd,
            "session plan validated"
        );
        Ok(plan)
    }
}

/// Check every structural invariant of a proposal against the
/// candidate set and the duration target. Fails with `PlanningInvalid`
/// naming the first offending field; nothing is silently repaired.
pub fn validate_proposal(
    proposal: &PlanProposal,
    candidates: &[TrackMetadata],
    target_duration_minutes: u32,
) -> Result<()> {
    use longplay_common::Error;

    if proposal.slots.is_empty() {
        return Err(Error::plan_invalid("slots", "plan contains no slots"));
    }

    let (bpm_low, bpm_high) = proposal.bpm_range;
    if !(bpm_low > 0.0 && bpm_high >= bpm_low) {
        return Err(Error::plan_invalid(
            "bpm_range",
            format!("expected 0 < low <= high, got [{}, {}]", bpm_low, bpm_high),
        ));
    }

    let candidate_ids: HashSet<&str> = candidates.iter().map(|t| t.id.as_str()).collect();
    let mut reused_ids: HashSet<&str> = HashSet::new();

    for (i, slot) in proposal.slots.iter().enumerate() {
        let expected_order = (i + 1) as u32;
        if slot.order != expected_order {
            return Err(Error::plan_invalid(
                format!("slots[{}].order", i),
                format!("expected {}, got {}", expected_order, slot.order),
            ));
        }
        if !(1..=10).contains(&slot.energy) {
            return Err(Error::plan_invalid(
                format!("slots[{}].energy", i),
                format!("expected 1-10, got {}", slot.energy),
            ));
        }
        if slot.bpm_target <= 0.0 {
            return Err(Error::plan_invalid(
                format!("slots[{}].bpm_target", i),
                format!("expected positive BPM, got {}", slot.bpm_target),
            ));
        }
        if slot.duration_min_ms > slot.duration_max_ms {
            return Err(Error::plan_invalid(
                format!("slots[{}].duration", i),
                format!(
                    "min {} exceeds max {}",
                    slot.duration_min_ms, slot.duration_max_ms
                ),
            ));
        }
        if slot.duration_min_ms < MIN_SLOT_DURATION_MS
            || slot.duration_max_ms > MAX_SLOT_DURATION_MS
        {
            return Err(Error::plan_invalid(
                format!("slots[{}].duration", i),
                format!(
                    "range {}..{} outside the {}..{} ms hard bound",
                    slot.duration_min_ms,
                    slot.duration_max_ms,
                    MIN_SLOT_DURATION_MS,
                    MAX_SLOT_DURATION_MS
                ),
            ));
        }

        match slot.source {
            SlotSource::Library => {
                if slot.request.is_some() {
                    return Err(Error::plan_invalid(
                        format!("slots[{}].request", i),
                        "library slot also carries a generation request",
                    ));
                }
                let Some(track_id) = slot.track_id.as_deref() else {
                    return Err(Error::plan_invalid(
                        format!("slots[{}].track_id", i),
                        "library slot without a track reference",
                    ));
                };
                if !candidate_ids.contains(track_id) {
                    return Err(Error::plan_invalid(
                        format!("slots[{}].track_id", i),
                        format!("{} is not in the candidate list", track_id),
                    ));
                }
                if !reused_ids.insert(track_id) {
                    return Err(Error::plan_invalid(
                        format!("slots[{}].track_id", i),
                        format!("{} is reused more than once", track_id),
                    ));
                }
            }
            SlotSource::Generate => {
                if slot.track_id.is_some() {
                    return Err(Error::plan_invalid(
                        format!("slots[{}].track_id", i),
                        "generate slot also references a library track",
                    ));
                }
                if slot.request.is_none() {
                    return Err(Error::plan_invalid(
                        format!("slots[{}].request", i),
                        "generate slot without a generation request",
                    ));
                }
            }
        }

        // Continuity is a hint, not an invariant; flag outliers only
        if slot.bpm_target < bpm_low || slot.bpm_target > bpm_high {
            warn!(
                order = slot.order,
                bpm_target = slot.bpm_target,
                "slot BPM target falls outside the plan's BPM range"
            );
        }
    }

    let planned_ms: u64 = proposal.slots.iter().map(|s| s.target_duration_ms()).sum();
    let target_ms = target_duration_minutes as u64 * 60_000;
    let tolerance_ms = (target_ms as f64 * DURATION_TOLERANCE) as u64;
    if planned_ms.abs_diff(target_ms) > tolerance_ms {
        return Err(Error::plan_invalid(
            "slots.total_duration",
            format!(
                "planned {} ms is outside {} ms +/- {} ms",
                planned_ms, target_ms, tolerance_ms
            ),
        ));
    }

    Ok(())
}

/// Sum the provider cost table over generate slots. Reuse is free.
/// Rounded to whole cents so plan serialization is stable.
pub fn estimate_plan_cost(proposal: &PlanProposal) -> f64 {
    let total: f64 = proposal
        .slots
        .iter()
        .filter(|s| s.source == SlotSource::Generate)
        .map(|s| estimate_generation_cost(&s.role, s.target_duration_ms()))
        .sum();
    (total * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_heuristic_first_match_wins() {
        assert_eq!(infer_genre("late night minimal techno focus"), "techno");
        assert_eq!(infer_genre("Deep House for rainy mornings"), "deep_house");
        assert_eq!(infer_genre("lo-fi beats to write essays to"), "lofi");
        assert_eq!(infer_genre("ambient drone for reading"), "ambient");
    }

    #[test]
    fn genre_heuristic_falls_back_to_electronic() {
        assert_eq!(infer_genre("something to code to"), "electronic");
        assert_eq!(infer_genre(""), "electronic");
    }

    #[test]
    fn genre_heuristic_is_deterministic() {
        let concept = "drum and bass warehouse session";
        assert_eq!(infer_genre(concept), infer_genre(concept));
        assert_eq!(infer_genre(concept), "drum_and_bass");
    }
}
