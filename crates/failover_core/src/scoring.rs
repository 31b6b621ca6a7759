//! Pure scoring functions for the weighted selection strategy
//!
//! Every function here is a pure computation over a [`HealthMetrics`]
//! snapshot and a [`FailoverContext`]; no shared state, no clocks of its
//! own. Scores are 0.0-1.0 per dimension, combined by configurable weights
//! and multiplied by a time-decay factor that fades plugins whose last
//! success is growing stale.

use std::time::{Duration, Instant};

use crate::health::HealthMetrics;
use crate::types::FailoverContext;

/// Default weight for the success-rate dimension
pub const SCORING_DEFAULT_WEIGHT_SUCCESS: f64 = 0.30;

/// Default weight for the response-time dimension
pub const SCORING_DEFAULT_WEIGHT_RESPONSE: f64 = 0.25;

/// Default weight for the load dimension
pub const SCORING_DEFAULT_WEIGHT_LOAD: f64 = 0.20;

/// Default weight for the reliability dimension
pub const SCORING_DEFAULT_WEIGHT_RELIABILITY: f64 = 0.15;

/// Default weight for the geographic dimension
pub const SCORING_DEFAULT_WEIGHT_GEOGRAPHIC: f64 = 0.10;

/// Load considered saturation for the load score
pub const SCORING_DEFAULT_MAX_LOAD: i64 = 100;

/// Response-time decay constant: 3s of average latency scores ~0.37
pub const SCORING_RESPONSE_DECAY_SECS: f64 = 3.0;

/// Failures within this window discount reliability to 70%
pub const SCORING_RECENT_FAILURE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Failures within this window (but outside the recent one) discount to 90%
pub const SCORING_STALE_FAILURE_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Horizon over which the time-decay factor fades from 1.0 to its floor
pub const SCORING_DECAY_HORIZON: Duration = Duration::from_secs(24 * 60 * 60);

/// Floor of the time-decay factor, also the never-succeeded value
pub const SCORING_DECAY_FLOOR: f64 = 0.5;

/// Neutral geographic score when either side declares no region
pub const SCORING_GEO_NEUTRAL: f64 = 0.5;

/// Geographic score for a region absent from the preferred list
pub const SCORING_GEO_MISMATCH: f64 = 0.1;

/// Per-dimension weights for the final score
///
/// The five weights must sum to 1.0 before the time-decay multiplier;
/// [`is_normalized`](Self::is_normalized) checks this within a small
/// tolerance.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Weight of the success-rate score
    pub weight_success: f64,

    /// Weight of the response-time score
    pub weight_response: f64,

    /// Weight of the load score
    pub weight_load: f64,

    /// Weight of the reliability score
    pub weight_reliability: f64,

    /// Weight of the geographic score
    pub weight_geographic: f64,

    /// Load at which the load score bottoms out at 0.0
    pub max_load: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_success: SCORING_DEFAULT_WEIGHT_SUCCESS,
            weight_response: SCORING_DEFAULT_WEIGHT_RESPONSE,
            weight_load: SCORING_DEFAULT_WEIGHT_LOAD,
            weight_reliability: SCORING_DEFAULT_WEIGHT_RELIABILITY,
            weight_geographic: SCORING_DEFAULT_WEIGHT_GEOGRAPHIC,
            max_load: SCORING_DEFAULT_MAX_LOAD,
        }
    }
}

impl ScoringConfig {
    /// Check that the weights sum to 1.0 within tolerance
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        let sum = self.weight_success
            + self.weight_response
            + self.weight_load
            + self.weight_reliability
            + self.weight_geographic;
        (sum - 1.0).abs() < 1e-6
    }
}

/// Success-rate score with streak adjustments
///
/// The raw success rate is penalized up to 50% while a failure streak is
/// running (10% per consecutive failure) and boosted up to 20% once a
/// success streak clears five (2% per extra success).
#[must_use]
pub fn success_score(metrics: &HealthMetrics) -> f64 {
    let mut score = metrics.success_rate();

    if metrics.consecutive_failures > 0 {
        let penalty = (f64::from(metrics.consecutive_failures) * 0.1).min(0.5);
        score *= 1.0 - penalty;
    }

    if metrics.consecutive_successes > 5 {
        let boost = (f64::from(metrics.consecutive_successes - 5) * 0.02).min(0.2);
        score *= 1.0 + boost;
    }

    score.clamp(0.0, 1.0)
}

/// Response-time score: 1.0 at ~0s, exp-decaying toward 0 as latency grows
#[must_use]
pub fn response_score(metrics: &HealthMetrics) -> f64 {
    (-metrics.avg_response_time_secs.max(0.0) / SCORING_RESPONSE_DECAY_SECS).exp()
}

/// Load score: 1.0 idle, 0.0 at or beyond `max_load` reservations
#[must_use]
pub fn load_score(metrics: &HealthMetrics, max_load: i64) -> f64 {
    if max_load <= 0 {
        return 0.0;
    }
    let utilization = (metrics.current_load.max(0) as f64 / max_load as f64).min(1.0);
    1.0 - utilization
}

/// Stored reliability, discounted when failures are recent
///
/// A failure within the last five minutes discounts to 70%; within the
/// last hour, to 90%.
#[must_use]
pub fn reliability_score(metrics: &HealthMetrics, now: Instant) -> f64 {
    let mut score = metrics.reliability_score;

    if let Some(failed_at) = metrics.last_failure_at {
        let age = now.saturating_duration_since(failed_at);
        if age <= SCORING_RECENT_FAILURE_WINDOW {
            score *= 0.7;
        } else if age <= SCORING_STALE_FAILURE_WINDOW {
            score *= 0.9;
        }
    }

    score.clamp(0.0, 1.0)
}

/// Geographic affinity between a plugin's declared region and the
/// request's preference list
///
/// Neutral (0.5) when either side is silent. A region in the preferred
/// list scores by position (1st = 1.0, 2nd = 0.8, ...), floored at the
/// mismatch score; anything else gets the mismatch score.
#[must_use]
pub fn geographic_score(metrics: &HealthMetrics, context: &FailoverContext) -> f64 {
    let Some(region) = metrics.geographic_region.as_deref() else {
        return SCORING_GEO_NEUTRAL;
    };
    if context.preferred_regions.is_empty() {
        return SCORING_GEO_NEUTRAL;
    }

    context
        .preferred_regions
        .iter()
        .position(|preferred| preferred == region)
        .map_or(SCORING_GEO_MISMATCH, |index| {
            (1.0 - 0.2 * index as f64).max(SCORING_GEO_MISMATCH)
        })
}

/// Time-decay factor applied to the weighted sum
///
/// 0.5 for a plugin that has never succeeded; otherwise fades linearly
/// from 1.0 at "just succeeded" to the 0.5 floor at 24 hours.
#[must_use]
pub fn time_decay_factor(metrics: &HealthMetrics, now: Instant) -> f64 {
    let Some(succeeded_at) = metrics.last_success_at else {
        return SCORING_DECAY_FLOOR;
    };

    let age = now.saturating_duration_since(succeeded_at).as_secs_f64();
    let horizon = SCORING_DECAY_HORIZON.as_secs_f64();
    (1.0 - (1.0 - SCORING_DECAY_FLOOR) * (age / horizon)).max(SCORING_DECAY_FLOOR)
}

/// Weighted composite score for one candidate
#[must_use]
pub fn final_score(
    metrics: &HealthMetrics,
    context: &FailoverContext,
    config: &ScoringConfig,
    now: Instant,
) -> f64 {
    let weighted = config.weight_success * success_score(metrics)
        + config.weight_response * response_score(metrics)
        + config.weight_load * load_score(metrics, config.max_load)
        + config.weight_reliability * reliability_score(metrics, now)
        + config.weight_geographic * geographic_score(metrics, context);

    weighted * time_decay_factor(metrics, now)
}
