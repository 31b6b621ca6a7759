//! Common types shared across the failover engine
//!
//! Callers hand the engine a [`FailoverContext`] describing one request and
//! get back a [`FailoverResult`] naming the selected plugin, ranked backup
//! alternates, and human-readable selection reasons. Statistics export types
//! are serde-serializable so they can be shipped to logs or metrics sinks
//! without further mapping.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitState;

/// Default request priority (1 = lowest, 10 = highest)
pub const CONTEXT_DEFAULT_PRIORITY: u8 = 5;

/// Default per-request timeout
pub const CONTEXT_DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default retry budget per request
pub const CONTEXT_DEFAULT_MAX_RETRIES: u32 = 3;

/// Selection strategy for picking a plugin from the healthy candidate set
///
/// A closed enum rather than strategy-by-name dispatch: adding a variant
/// forces every `match` in the crate to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// Weighted multi-dimension scoring (success, latency, load,
    /// reliability, geography) with time decay. The default.
    Intelligent,
    /// Weighted random draw, weight = success rate over average latency
    WeightedRoundRobin,
    /// Smallest in-flight reservation counter wins
    LeastConnections,
    /// Smallest average response time wins
    FastestResponse,
    /// Rank by preferred-region affinity; falls back to weighted scoring
    /// when the request has no regional preference
    GeographicAffinity,
}

impl SelectionStrategy {
    /// Canonical lowercase name, stable for configs and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Intelligent => "intelligent",
            Self::WeightedRoundRobin => "weighted_round_robin",
            Self::LeastConnections => "least_connections",
            Self::FastestResponse => "fastest_response",
            Self::GeographicAffinity => "geographic_affinity",
        }
    }

    /// Parse a strategy from its canonical name
    ///
    /// Returns `None` for unknown names so callers with string-typed
    /// configuration can fall back to their own default.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "intelligent" | "weighted_score" => Some(Self::Intelligent),
            "weighted_round_robin" | "round_robin" => Some(Self::WeightedRoundRobin),
            "least_connections" => Some(Self::LeastConnections),
            "fastest_response" => Some(Self::FastestResponse),
            "geographic_affinity" | "geographic" => Some(Self::GeographicAffinity),
            _ => None,
        }
    }
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        Self::Intelligent
    }
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied request context, immutable for the duration of one call
#[derive(Debug, Clone)]
pub struct FailoverContext {
    /// Request identifier, carried through logs and failover events
    pub request_id: String,

    /// Logical data or asset type the caller needs (e.g. "ohlcv", "quotes")
    pub data_type: String,

    /// Optional market the request targets
    pub market: Option<String>,

    /// Priority from 1 (lowest) to 10 (highest)
    pub priority: u8,

    /// Caller-side timeout for the real call
    pub timeout: Duration,

    /// Retries already spent on this request
    pub retry_count: u32,

    /// Retry budget for this request
    pub max_retries: u32,

    /// Regions in descending preference order
    pub preferred_regions: Vec<String>,

    /// Plugins the caller refuses to use for this request
    pub excluded_plugins: HashSet<String>,
}

impl FailoverContext {
    /// Create a context with defaults for everything but identity
    #[must_use]
    pub fn new<T: Into<String>, U: Into<String>>(request_id: T, data_type: U) -> Self {
        Self {
            request_id: request_id.into(),
            data_type: data_type.into(),
            market: None,
            priority: CONTEXT_DEFAULT_PRIORITY,
            timeout: CONTEXT_DEFAULT_TIMEOUT,
            retry_count: 0,
            max_retries: CONTEXT_DEFAULT_MAX_RETRIES,
            preferred_regions: Vec::new(),
            excluded_plugins: HashSet::new(),
        }
    }

    /// Add a market to the context
    #[must_use]
    pub fn with_market<T: Into<String>>(mut self, market: T) -> Self {
        self.market = Some(market.into());
        self
    }

    /// Set the request priority (clamped to 1..=10)
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    /// Set preferred regions in descending preference order
    #[must_use]
    pub fn with_preferred_regions<I, T>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.preferred_regions = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Exclude a plugin from selection for this request
    #[must_use]
    pub fn with_excluded_plugin<T: Into<String>>(mut self, plugin_id: T) -> Self {
        self.excluded_plugins.insert(plugin_id.into());
        self
    }
}

/// Outcome of one selection call
#[derive(Debug, Clone)]
pub struct FailoverResult {
    /// The plugin the caller should use
    pub selected_plugin: String,

    /// Strategy that produced the ranking
    pub strategy_used: SelectionStrategy,

    /// Wall-clock time spent inside the selection call
    pub selection_latency: Duration,

    /// Confidence in the choice (0.0-1.0)
    pub confidence_score: f64,

    /// Next-best alternates in rank order, at most two
    pub backup_plugins: Vec<String>,

    /// Human-readable reasons behind the ranking, in order
    pub selection_reasons: Vec<String>,
}

/// One entry in the bounded failover incident history
#[derive(Debug, Clone)]
pub struct FailoverEvent {
    /// Request that hit the incident
    pub request_id: String,

    /// Half-open plugin offered as a probe, if one was available
    pub plugin_id: Option<String>,

    /// What happened
    pub reason: String,

    /// When the incident was recorded
    pub at: Instant,
}

/// Per-plugin health statistics snapshot for observability sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStats {
    /// Plugin identifier
    pub plugin_id: String,

    /// Circuit breaker state at snapshot time
    pub circuit_state: CircuitState,

    /// Successful requests recorded
    pub success_count: u64,

    /// Failed requests recorded
    pub failure_count: u64,

    /// Total requests recorded
    pub total_requests: u64,

    /// Derived success rate (0.0-1.0)
    pub success_rate: f64,

    /// Exponential moving average of response time in seconds
    pub avg_response_time_secs: f64,

    /// Current failure streak
    pub consecutive_failures: u32,

    /// Current success streak
    pub consecutive_successes: u32,

    /// In-flight reservation counter
    pub current_load: i64,

    /// Stored reliability score (0.0-1.0)
    pub reliability_score: f64,

    /// Declared region, if seeded
    pub geographic_region: Option<String>,

    /// Seconds since the last success, if any
    pub secs_since_last_success: Option<f64>,

    /// Seconds since the last failure, if any
    pub secs_since_last_failure: Option<f64>,

    /// Seconds since the circuit opened; present exactly when the circuit
    /// is open
    pub secs_since_circuit_opened: Option<f64>,
}

/// Engine-level counter snapshot for observability sinks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatsSnapshot {
    /// Successful selection calls
    pub selections: u64,

    /// Selection calls that returned an error
    pub failed_selections: u64,

    /// Selections that fell back to a half-open probe
    pub probe_selections: u64,

    /// Circuit transitions into `Open`
    pub circuit_opens: u64,

    /// Circuit transitions into `Closed`
    pub circuit_closes: u64,

    /// Performance reports recorded
    pub outcomes_recorded: u64,
}
