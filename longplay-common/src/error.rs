//! Common error types for the Longplay pipeline

use thiserror::Error;

/// Common result type for Longplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared across the pipeline.
///
/// Lower layers (store, providers) never swallow errors; planner and
/// mixer validate eagerly and fail fast rather than producing a
/// partially-correct plan or mix.
#[derive(Error, Debug)]
pub enum Error {
    /// A plan, slot, or mix input violates a structural invariant
    #[error("Validation error: {0}")]
    Validation(String),

    /// Oracle output failed plan validation; names the offending field
    #[error("Invalid plan ({field}): {reason}")]
    PlanningInvalid { field: String, reason: String },

    /// A collaborator network or storage call failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Transport subtype: a generation provider reported quota
    /// exhaustion
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Requested object or track not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio decode, resample, or encode error
    #[error("Audio error: {0}")]
    Audio(String),
}

impl Error {
    /// Shorthand for a `PlanningInvalid` naming the offending field.
    pub fn plan_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::PlanningInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether a generation attempt that failed with this error may be
    /// retried once against the other provider. Quota exhaustion and
    /// plain transport failures qualify; structural errors never do.
    /// The acquirer's fallback path is gated on this predicate alone.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::QuotaExceeded(_) | Error::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_invalid_names_field() {
        let err = Error::plan_invalid("slots[2].order", "expected 3, got 5");
        assert_eq!(
            err.to_string(),
            "Invalid plan (slots[2].order): expected 3, got 5"
        );
    }

    #[test]
    fn transient_errors_allow_the_provider_fallback() {
        assert!(Error::QuotaExceeded("elevenlabs".into()).is_transient());
        assert!(Error::Transport("timeout".into()).is_transient());
        assert!(!Error::Validation("bad slot".into()).is_transient());
        assert!(!Error::plan_invalid("slots", "empty").is_transient());
        assert!(!Error::NotFound("track".into()).is_transient());
    }
}
