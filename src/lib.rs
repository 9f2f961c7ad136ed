//! # Tierbucket - Tiered Per-Identity Rate Limiting
//!
//! A lock-free token bucket rate limiter that keeps one bucket per identity
//! (API user, tenant, key...) and sizes each bucket by the identity's service
//! tier.
//!
//! ## The Model
//!
//! ```text
//!     Identity "alice" on FREE (capacity 2, +1 per tick):
//!
//!     register:   [🪙🪙]   2/2
//!     request:    [🪙  ]   1/2  ✅ 200
//!     request:    [    ]   0/2  ✅ 200
//!     request:    [    ]   0/2  ❌ 429
//!     tick:       [🪙  ]   1/2
//!     upgrade →   [🪙🪙🪙🪙🪙🪙🪙🪙🪙🪙] 10/10 (ENTERPRISE, balance reset)
//! ```
//!
//! - **TokenBucket** holds one identity's tier and tokens in a single atomic word.
//! - **BucketRegistry** maps identities to buckets and answers requests.
//! - **RefillScheduler** refills every bucket on a background thread.
//!
//! ## Quick Start
//!
//! ```rust
//! use tierbucket::{BucketRegistry, Outcome, Tier};
//!
//! let registry = BucketRegistry::new();
//! registry.register_or_upgrade("alice", Tier::Free);
//!
//! match registry.hit_api("alice") {
//!     Outcome::Admitted { tokens_remaining } => println!("200 OK ({} left)", tokens_remaining),
//!     Outcome::Rejected => println!("429 Too Many Requests"),
//!     Outcome::UnknownIdentity => println!("user not found"),
//! }
//! ```
//!
//! ### With Background Refill
//!
//! ```rust
//! use tierbucket::{RateLimiterBuilder, Tier};
//!
//! let (registry, mut scheduler) = RateLimiterBuilder::new()
//!     .refill_interval_ms(1_000)
//!     .build()?;
//!
//! scheduler.start()?;
//! registry.register_or_upgrade("bob", Tier::Premium);
//! assert!(registry.hit_api("bob").is_admitted());
//! scheduler.stop();
//! # Ok::<(), tierbucket::Error>(())
//! ```
//!
//! ## Thread Safety
//!
//! Every operation takes `&self` and may be called from any number of threads.
//! Consumption, refill and tier changes are compare-and-swap operations on one
//! word per bucket: no operation blocks another, and N racing consumers on a
//! bucket with K tokens admit exactly `min(N, K)`.
//!
//! ## Scope
//!
//! State is in-memory and per process. There is no persistence, no cross-node
//! coordination, no fairness between identities and no sub-tick refill.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

mod error;
mod rate_limiter;

pub use error::Error;
pub use rate_limiter::{
    cpu_relax, BucketMetrics, BucketRegistry, MemoryOrdering, Outcome, RateLimiterConfig,
    RefillScheduler, Registration, RegistryStats, SchedulerState, Tier, TierLimits, TierTable,
    TokenBucket, DEFAULT_REFILL_INTERVAL_MS, MAX_TIER_CAPACITY,
};

/// A registry wrapped in `Arc`, the form the scheduler and request handlers share.
pub type SharedRegistry = std::sync::Arc<BucketRegistry>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports.
///
/// ```rust
/// use tierbucket::prelude::*;
///
/// let registry = BucketRegistry::new();
/// registry.register_or_upgrade("alice", Tier::Free);
/// assert_eq!(registry.hit_api("alice"), Outcome::Admitted { tokens_remaining: 1 });
/// ```
pub mod prelude {
    pub use crate::{
        BucketRegistry, Error, Outcome, RateLimiterBuilder, RateLimiterConfig, RefillScheduler,
        Registration, SharedRegistry, Tier, TierLimits, TierTable, TokenBucket,
    };
}

/// Builder for a registry plus its refill scheduler.
///
/// ```rust
/// use tierbucket::{RateLimiterBuilder, Tier, TierLimits};
///
/// let (registry, scheduler) = RateLimiterBuilder::new()
///     .tier(Tier::Free, TierLimits::new(3, 1))
///     .refill_interval_ms(500)
///     .build()?;
///
/// registry.register_or_upgrade("carol", Tier::Free);
/// assert_eq!(registry.get_bucket("carol").unwrap().available(), 3);
/// assert!(!scheduler.is_running());
///
/// // Invalid settings are reported, not panicked on
/// assert!(RateLimiterBuilder::new().refill_interval_ms(0).build().is_err());
/// # Ok::<(), tierbucket::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RateLimiterBuilder {
    config: RateLimiterConfig,
}

impl RateLimiterBuilder {
    /// Starts from the default tier table and a 5 second refill interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the limits of one tier.
    pub fn tier(mut self, tier: Tier, limits: TierLimits) -> Self {
        self.config.tiers = self.config.tiers.with(tier, limits);
        self
    }

    /// Replaces the whole tier table.
    pub fn tiers(mut self, tiers: TierTable) -> Self {
        self.config.tiers = tiers;
        self
    }

    /// Sets the refill interval in milliseconds.
    pub fn refill_interval_ms(mut self, ms: u64) -> Self {
        self.config.refill_interval_ms = ms;
        self
    }

    /// Sets the memory ordering used by every bucket.
    pub fn memory_ordering(mut self, ordering: MemoryOrdering) -> Self {
        self.config.ordering = ordering;
        self
    }

    /// Validates the settings and returns a shared registry with a stopped
    /// scheduler bound to it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if the configuration does not validate.
    pub fn build(self) -> Result<(SharedRegistry, RefillScheduler), Error> {
        let registry = std::sync::Arc::new(BucketRegistry::with_config(self.config)?);
        let scheduler = RefillScheduler::new(registry.clone());
        Ok((registry, scheduler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_builder_defaults() {
        let (registry, scheduler) = RateLimiterBuilder::new().build().unwrap();
        assert_eq!(registry.config().refill_interval_ms, DEFAULT_REFILL_INTERVAL_MS);
        assert_eq!(registry.config().tiers, TierTable::default());
        assert_eq!(scheduler.period(), std::time::Duration::from_secs(5));
        assert!(Arc::ptr_eq(scheduler.registry(), &registry));
    }

    #[test]
    fn test_builder_chain() {
        let (registry, _scheduler) = RateLimiterBuilder::new()
            .tier(Tier::Premium, TierLimits::new(8, 4))
            .memory_ordering(MemoryOrdering::Sequential)
            .refill_interval_ms(250)
            .build()
            .unwrap();

        registry.register_or_upgrade("p", Tier::Premium);
        assert_eq!(registry.get_bucket("p").unwrap().capacity(), 8);
        assert_eq!(registry.config().ordering, MemoryOrdering::Sequential);
    }

    #[test]
    fn test_builder_validation() {
        let result = RateLimiterBuilder::new()
            .tier(Tier::Enterprise, TierLimits::new(0, 5))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_thread_safety() {
        let registry: SharedRegistry = Arc::new(BucketRegistry::new());
        registry.register_or_upgrade("shared", Tier::Enterprise);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (0..50)
                        .filter(|_| registry.hit_api("shared").is_admitted())
                        .count()
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _registry = BucketRegistry::new();
        let _config = RateLimiterConfig::default();
        let _tier: Tier = "premium".parse().unwrap();
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
