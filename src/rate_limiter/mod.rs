//! # Rate Limiter Module
//!
//! Internal implementation of the tiered rate limiter.
//!
//! ## Module Structure
//!
//! ```text
//!     rate_limiter/
//!     ├── mod.rs          (You are here - Module organization)
//!     ├── config.rs       (Tiers, tier table, limiter settings)
//!     ├── core.rs         (Lock-free token bucket)
//!     ├── registry.rs     (Identity → bucket map, request outcomes)
//!     ├── scheduler.rs    (Background refill thread)
//!     ├── metrics.rs      (Counter snapshots)
//!     └── utils.rs        (Spin hints, backoff, cache alignment)
//! ```
//!
//! ## Architecture Flow
//!
//! ```text
//!     register / hit_api          RefillScheduler
//!            │                          │ every period
//!            ▼                          ▼
//!     ┌──────────────┐  refill_all ┌──────────────┐
//!     │   Registry   │ ◄────────── │  Scheduler   │
//!     └──────┬───────┘             └──────────────┘
//!            │ per identity
//!            ▼
//!     ┌──────────────┐
//!     │ TokenBucket  │ ◄── packed tier + tokens, CAS only
//!     └──────┬───────┘
//!            ▼
//!     ┌──────────────┐
//!     │  TierTable   │ ◄── static limits per tier
//!     └──────────────┘
//! ```

mod config;
mod core;
mod metrics;
mod registry;
mod scheduler;
mod utils;

/// Tier definitions and limiter settings
pub use config::{
    MemoryOrdering, RateLimiterConfig, Tier, TierLimits, TierTable, DEFAULT_REFILL_INTERVAL_MS,
    MAX_TIER_CAPACITY,
};

/// Per-identity token bucket
pub use self::core::TokenBucket;

/// Identity registry and request outcomes
pub use registry::{BucketRegistry, Outcome, Registration};

/// Background refill driver
pub use scheduler::{RefillScheduler, SchedulerState};

/// Counter snapshots for observability
pub use metrics::{BucketMetrics, RegistryStats};

/// Spin-loop hint
pub use utils::cpu_relax;
