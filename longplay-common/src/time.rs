//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a position in a mix as a tracklist timestamp.
///
/// Positions below one hour render as `MM:SS`; from one hour upward
/// the format switches to `H:MM:SS`. Sub-second precision is dropped
/// (tracklists are a publishing artifact, not an edit list).
pub fn format_timestamp(position_ms: u64) -> String {
    let total_seconds = position_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
