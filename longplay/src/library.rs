//! Content index over the library store
//!
//! Read-only queries against the metadata sidecars: genre and recency
//! filtering plus a deterministic relevance ordering. No business
//! logic beyond that; deciding which candidates actually fit a session
//! is the planner's job.

use chrono::{DateTime, Duration, Utc};
use longplay_common::model::TrackMetadata;
use longplay_common::Result;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::store::{get_json, BlobStore};

/// Prefix under which all track sidecars live
pub const TRACKS_PREFIX: &str = "library/tracks/";

/// Queries candidate tracks from the library store.
pub struct ContentIndex {
    store: Arc<dyn BlobStore>,
}

impl ContentIndex {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Query candidate tracks for a session.
    ///
    /// Filters the catalogue to exact `genre` matches that have not
    /// been used within the last `exclude_used_within_days` days of
    /// `now`. The recency boundary is exclusive-of-reuse: a track
    /// whose `last_used_at` falls exactly on the cutoff is still
    /// considered recently used and is excluded; never-used tracks
    /// always pass.
    ///
    /// Ordering is deterministic for a fixed catalogue snapshot and
    /// query time: quality rating descending (unrated tracks last),
    /// then usage count ascending, ties broken by id. At most `limit`
    /// entries are returned. An empty result is not an error.
    pub async fn query(
        &self,
        genre: &str,
        exclude_used_within_days: i64,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrackMetadata>> {
        let keys = self.store.list(TRACKS_PREFIX).await?;
        let cutoff = now - Duration::days(exclude_used_within_days);

        let mut candidates: Vec<TrackMetadata> = Vec::new();
        for key in keys.iter().filter(|k| k.ends_with(".json")) {
            let track: TrackMetadata = match get_json(self.store.as_ref(), key).await {
                Ok(track) => track,
                Err(e) => {
                    // One bad sidecar must not sink the whole query
                    warn!(key = %key, error = %e, "skipping unreadable track sidecar");
                    continue;
                }
            };

            if track.genre != genre {
                continue;
            }
            if let Some(last_used) = track.last_used_at {
                if last_used >= cutoff {
                    debug!(id = %track.id, %last_used, "skipping recently used track");
                    continue;
                }
            }
            candidates.push(track);
        }

        candidates.sort_by(compare_relevance);
        candidates.truncate(limit);

        info!(
            genre,
            exclude_used_within_days,
            count = candidates.len(),
            "library query complete"
        );
        Ok(candidates)
    }
}

fn compare_relevance(a: &TrackMetadata, b: &TrackMetadata) -> Ordering {
    // Quality descending, with unrated tracks after every rated one
    let quality = match (a.quality, b.quality) {
        (Some(qa), Some(qb)) => qb.cmp(&qa),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    quality
        .then(a.usage_count.cmp(&b.usage_count))
        .then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{put_json, FsStore};
    use longplay_common::model::SlotRole;

    fn track(id: &str, genre: &str) -> TrackMetadata {
        TrackMetadata {
            id: id.to_string(),
            title: format!("Track {}", id),
            genre: genre.to_string(),
            subgenre: None,
            bpm: 124.0,
            duration_ms: 180_000,
            energy: 5,
            role: SlotRole::Sustain,
            key: None,
            provider: "stable_audio".to_string(),
            prompt_hash: "deadbeefdeadbeef".to_string(),
            session_id: "session_seed".to_string(),
            quality: None,
            usage_count: 0,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    async fn seed(store: &FsStore, track: &TrackMetadata) {
        put_json(store, &track.metadata_key(), track).await.unwrap();
    }

    #[tokio::test]
    async fn filters_by_exact_genre() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStore::new(dir.path()));

        seed(&store, &track("aaa11111", "techno")).await;
        seed(&store, &track("bbb22222", "house")).await;

        let index = ContentIndex::new(store);
        let hits = index.query("techno", 7, 50, Utc::now()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "aaa11111");
    }

    #[tokio::test]
    async fn recency_boundary_is_exclusive_of_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStore::new(dir.path()));
        let now = Utc::now();

        let mut exactly_on_cutoff = track("aaa11111", "techno");
        exactly_on_cutoff.last_used_at = Some(now - Duration::days(7));

        let mut just_older = track("bbb22222", "techno");
        just_older.last_used_at = Some(now - Duration::days(7) - Duration::seconds(1));

        let mut recent = track("ccc33333", "techno");
        recent.last_used_at = Some(now - Duration::days(2));

        let never_used = track("ddd44444", "techno");

        for t in [&exactly_on_cutoff, &just_older, &recent, &never_used] {
            seed(&store, t).await;
        }

        let index = ContentIndex::new(store);
        let hits = index.query("techno", 7, 50, now).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|t| t.id.as_str()).collect();

        // Used exactly 7 days ago counts as recent; strictly older passes
        assert!(!ids.contains(&"aaa11111"));
        assert!(ids.contains(&"bbb22222"));
        assert!(!ids.contains(&"ccc33333"));
        assert!(ids.contains(&"ddd44444"));
    }

    #[tokio::test]
    async fn orders_by_quality_then_usage_then_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStore::new(dir.path()));

        let mut unrated = track("aaa11111", "techno");
        unrated.quality = None;

        let mut low_quality = track("bbb22222", "techno");
        low_quality.quality = Some(3);

        let mut high_quality_worn = track("ccc33333", "techno");
        high_quality_worn.quality = Some(8);
        high_quality_worn.usage_count = 5;

        let mut high_quality_fresh = track("ddd44444", "techno");
        high_quality_fresh.quality = Some(8);
        high_quality_fresh.usage_count = 1;

        for t in [&unrated, &low_quality, &high_quality_worn, &high_quality_fresh] {
            seed(&store, t).await;
        }

        let index = ContentIndex::new(store);
        let hits = index.query("techno", 7, 50, Utc::now()).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["ddd44444", "ccc33333", "bbb22222", "aaa11111"]);
    }

    #[tokio::test]
    async fn truncates_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStore::new(dir.path()));

        for id in ["aaa11111", "bbb22222", "ccc33333"] {
            seed(&store, &track(id, "techno")).await;
        }

        let index = ContentIndex::new(store);
        let hits = index.query("techno", 7, 2, Utc::now()).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn skips_malformed_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStore::new(dir.path()));

        seed(&store, &track("aaa11111", "techno")).await;
        store
            .put("library/tracks/techno/broken.json", b"not json at all")
            .await
            .unwrap();

        let index = ContentIndex::new(store);
        let hits = index.query("techno", 7, 50, Utc::now()).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn empty_catalogue_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsStore::new(dir.path()));

        let index = ContentIndex::new(store);
        let hits = index.query("techno", 7, 50, Utc::now()).await.unwrap();
        assert!(hits.is_empty());
    }
}
