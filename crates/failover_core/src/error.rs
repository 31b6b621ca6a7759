//! Error handling for failover engine operations
//!
//! The engine has exactly two failure modes, both returned synchronously
//! from plugin selection. Scoring and strategy math is total, and outcome
//! recording never fails: unknown plugin IDs simply create fresh records.

use thiserror::Error;

/// Result type alias for failover engine operations
pub type Result<T> = std::result::Result<T, FailoverError>;

/// Errors produced by plugin selection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailoverError {
    /// Nothing remains after exclusion filtering. The caller asked for a
    /// selection over a candidate list it excluded entirely; this is a
    /// configuration problem on the calling side.
    #[error("no candidates remain for request {request_id}: {submitted} submitted, {excluded} excluded")]
    NoCandidates {
        request_id: String,
        submitted: usize,
        excluded: usize,
    },

    /// Every surviving candidate has an open circuit and none is ready for
    /// a half-open probe. This is the systemic-outage signal: callers
    /// should surface it as "all providers down" rather than as an
    /// ordinary single-call failure.
    #[error("all circuits open for request {request_id}: {candidates} candidate(s) unavailable")]
    AllCircuitsOpen {
        request_id: String,
        candidates: usize,
    },
}

impl FailoverError {
    /// Check if error signals a systemic outage rather than a caller mistake
    #[must_use]
    pub const fn is_systemic(&self) -> bool {
        matches!(self, Self::AllCircuitsOpen { .. })
    }

    /// Get error category for monitoring
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::NoCandidates { .. } => "no_candidates",
            Self::AllCircuitsOpen { .. } => "all_circuits_open",
        }
    }
}
