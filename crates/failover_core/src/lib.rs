//! # Failover Core - Intelligent Plugin Failover Engine
//!
//! Health-aware selection engine for Meridian's pool of redundant
//! market-data plugins. Tracks per-plugin health, quarantines failing
//! plugins behind per-plugin circuit breakers, ranks the survivors with
//! pluggable selection strategies, and paces caller retries with jittered
//! exponential backoff. The engine decides *which* plugin to use next and
//! records the outcomes reported to it; performing the real call is the
//! caller's job.
//!
//! ## Architecture
//! - **Health store**: one mutable record per plugin ID, created lazily,
//!   sharded so unrelated plugins never contend
//! - **Circuit breaker**: Closed → Open → HalfOpen state machine evaluated
//!   lazily on the read path, no timers or background tasks
//! - **Scoring**: pure weighted multi-dimension scores with time decay
//! - **Strategies**: weighted scoring, weighted round robin, least
//!   connections, fastest response, geographic affinity
//! - **Orchestrator**: filter, refresh, rank, reserve, report
//!
//! ## Safety and Performance
//! - Zero `unwrap()`, `expect()`, or `panic!()` in production code
//! - No blocking I/O or sleeps anywhere in the engine
//! - Selection is O(n) over the candidate list
//!
//! ```
//! use failover_core::{FailoverContext, FailoverEngine};
//!
//! let engine = FailoverEngine::default();
//! let pool = vec!["primary-feed".to_string(), "backup-feed".to_string()];
//! let context = FailoverContext::new("req-42", "ohlcv");
//!
//! let choice = engine
//!     .select_optimal_plugin(&pool, &context, None)
//!     .expect("fresh plugins are healthy");
//!
//! // ... perform the real call against choice.selected_plugin ...
//! engine.record_plugin_performance(&choice.selected_plugin, true, 0.12, &context);
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::mem_forget,
    clippy::await_holding_lock
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::missing_docs_in_private_items,
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::str_to_string,
    clippy::float_cmp,
    clippy::suboptimal_flops,
    reason = "Production-ready configuration balancing strictness with practicality"
)]

pub mod backoff;
pub mod circuit_breaker;
pub mod engine;
pub mod error;
pub mod health;
pub mod scoring;
pub mod strategies;
pub mod types;

pub use backoff::{retry_delay, RetryConfig};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitState, CircuitTransition};
pub use engine::{EngineStats, FailoverEngine, FailoverEngineConfig};
pub use error::{FailoverError, Result};
pub use health::{HealthMetrics, HealthStore};
pub use scoring::ScoringConfig;
pub use strategies::{StrategyOutcome, STRATEGY_MAX_BACKUPS};
pub use types::{
    EngineStatsSnapshot, FailoverContext, FailoverEvent, FailoverResult, PluginStats,
    SelectionStrategy,
};
