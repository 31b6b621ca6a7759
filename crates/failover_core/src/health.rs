//! Per-plugin health records and the concurrent health store
//!
//! The store is the engine's single source of truth and its only mutable
//! shared state. Records are created lazily on first reference and never
//! dropped implicitly; stale entries for retired plugins persist at the cost
//! of one record per distinct plugin ID ever seen. Mutations of one plugin's
//! record are serialized by the store's shard locking, and mutations of
//! different plugins do not block each other.

use std::time::Instant;

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;

use crate::circuit_breaker::CircuitState;
use crate::types::PluginStats;

/// Reliability penalty per consecutive failure (capped at 50%)
pub const HEALTH_FAILURE_STREAK_PENALTY: f64 = 0.1;

/// Maximum reliability penalty from a failure streak
pub const HEALTH_MAX_FAILURE_STREAK_PENALTY: f64 = 0.5;

/// Reliability boost once a plugin has a meaningful sample size
pub const HEALTH_SAMPLE_SIZE_BOOST: f64 = 1.2;

/// Requests required before the sample-size boost applies
pub const HEALTH_SAMPLE_SIZE_THRESHOLD: u64 = 10;

/// Mutable health record for one plugin
///
/// Invariants maintained by [`record_outcome`](Self::record_outcome) and the
/// circuit breaker transitions:
/// - `total_requests == success_count + failure_count`
/// - at most one of `consecutive_failures` / `consecutive_successes` is
///   non-zero (a success resets the failure streak and vice versa)
/// - `current_load >= 0`
/// - `circuit_opened_at` is set if and only if `circuit_state == Open`
#[derive(Debug, Clone)]
pub struct HealthMetrics {
    /// Plugin identifier
    pub plugin_id: String,

    /// Successful requests recorded
    pub success_count: u64,

    /// Failed requests recorded
    pub failure_count: u64,

    /// Total requests recorded
    pub total_requests: u64,

    /// Exponential moving average of response time in seconds
    pub avg_response_time_secs: f64,

    /// When the last success was recorded
    pub last_success_at: Option<Instant>,

    /// When the last failure was recorded
    pub last_failure_at: Option<Instant>,

    /// Current failure streak
    pub consecutive_failures: u32,

    /// Current success streak
    pub consecutive_successes: u32,

    /// Circuit breaker state
    pub circuit_state: CircuitState,

    /// When the circuit opened; set iff the circuit is open
    pub circuit_opened_at: Option<Instant>,

    /// Declared region from the plugin registry, if seeded
    pub geographic_region: Option<String>,

    /// In-flight reservation counter, never negative
    pub current_load: i64,

    /// Stored reliability score (0.0-1.0), recomputed on every outcome
    pub reliability_score: f64,
}

impl HealthMetrics {
    /// Create a pristine record for a plugin
    ///
    /// Reliability starts at 1.0 as an optimistic prior so cold plugins are
    /// not starved before their first request; the time-decay factor already
    /// halves the final score of a plugin that has never succeeded.
    #[must_use]
    pub fn new<T: Into<String>>(plugin_id: T) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            success_count: 0,
            failure_count: 0,
            total_requests: 0,
            avg_response_time_secs: 0.0,
            last_success_at: None,
            last_failure_at: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            circuit_state: CircuitState::Closed,
            circuit_opened_at: None,
            geographic_region: None,
            current_load: 0,
            reliability_score: 1.0,
        }
    }

    /// Derived success rate (0.0 before the first request)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_requests as f64
    }

    /// Record one completed request
    ///
    /// Updates counters, streaks, the response-time EMA (seeded with the
    /// first observation), last-seen stamps, and the stored reliability
    /// score. Circuit transitions are the breaker's job, not this one's.
    pub fn record_outcome(&mut self, success: bool, latency_secs: f64, learning_rate: f64, now: Instant) {
        self.total_requests = self.total_requests.saturating_add(1);

        if success {
            self.success_count = self.success_count.saturating_add(1);
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            self.consecutive_failures = 0;
            self.last_success_at = Some(now);
        } else {
            self.failure_count = self.failure_count.saturating_add(1);
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.consecutive_successes = 0;
            self.last_failure_at = Some(now);
        }

        let latency = latency_secs.max(0.0);
        if self.total_requests <= 1 {
            self.avg_response_time_secs = latency;
        } else {
            self.avg_response_time_secs += learning_rate * (latency - self.avg_response_time_secs);
        }

        self.recompute_reliability();
    }

    /// Take a serializable snapshot relative to `now`
    #[must_use]
    pub fn stats(&self, now: Instant) -> PluginStats {
        PluginStats {
            plugin_id: self.plugin_id.clone(),
            circuit_state: self.circuit_state,
            success_count: self.success_count,
            failure_count: self.failure_count,
            total_requests: self.total_requests,
            success_rate: self.success_rate(),
            avg_response_time_secs: self.avg_response_time_secs,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            current_load: self.current_load,
            reliability_score: self.reliability_score,
            geographic_region: self.geographic_region.clone(),
            secs_since_last_success: self
                .last_success_at
                .map(|at| now.saturating_duration_since(at).as_secs_f64()),
            secs_since_last_failure: self
                .last_failure_at
                .map(|at| now.saturating_duration_since(at).as_secs_f64()),
            secs_since_circuit_opened: self
                .circuit_opened_at
                .map(|at| now.saturating_duration_since(at).as_secs_f64()),
        }
    }

    /// Reliability = success rate, penalized up to 50% by the current
    /// failure streak and boosted 20% once the sample size clears the
    /// threshold, clamped to 0.0-1.0.
    fn recompute_reliability(&mut self) {
        let penalty = (f64::from(self.consecutive_failures) * HEALTH_FAILURE_STREAK_PENALTY)
            .min(HEALTH_MAX_FAILURE_STREAK_PENALTY);
        let mut score = self.success_rate() * (1.0 - penalty);
        if self.total_requests > HEALTH_SAMPLE_SIZE_THRESHOLD {
            score *= HEALTH_SAMPLE_SIZE_BOOST;
        }
        self.reliability_score = score.clamp(0.0, 1.0);
    }
}

/// Thread-safe health store keyed by plugin ID
#[derive(Debug, Default)]
pub struct HealthStore {
    plugins: DashMap<String, HealthMetrics>,
}

impl HealthStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: DashMap::new(),
        }
    }

    /// Get a mutable reference to a plugin's record, creating it lazily
    ///
    /// The returned guard serializes mutations of this plugin's record;
    /// drop it before touching another plugin to keep shard locking fair.
    pub fn get_or_create(&self, plugin_id: &str) -> RefMut<'_, String, HealthMetrics> {
        self.plugins
            .entry(plugin_id.to_string())
            .or_insert_with(|| HealthMetrics::new(plugin_id))
    }

    /// Clone a plugin's record, if it exists
    #[must_use]
    pub fn snapshot(&self, plugin_id: &str) -> Option<HealthMetrics> {
        self.plugins.get(plugin_id).map(|entry| entry.value().clone())
    }

    /// Clone every record in the store
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<HealthMetrics> {
        self.plugins.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Reset a plugin to a pristine record
    ///
    /// The declared region survives: it is registry metadata seeded from
    /// outside, not health state. No-op for unknown plugins.
    pub fn reset(&self, plugin_id: &str) {
        if let Some(mut entry) = self.plugins.get_mut(plugin_id) {
            let region = entry.geographic_region.take();
            let mut fresh = HealthMetrics::new(plugin_id);
            fresh.geographic_region = region;
            *entry = fresh;
        }
    }

    /// Seed a plugin's declared region from the plugin registry
    pub fn set_region<T: Into<String>>(&self, plugin_id: &str, region: T) {
        self.get_or_create(plugin_id).geographic_region = Some(region.into());
    }

    /// Number of distinct plugins ever seen
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if the store has seen no plugins yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
