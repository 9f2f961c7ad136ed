//! # Bucket Registry
//!
//! Maps identities to their [`TokenBucket`]s and exposes the request-facing
//! operations: register or upgrade an identity, admit a request, and report
//! status.
//!
//! ## Architecture
//!
//! ```text
//!     register_or_upgrade("alice", FREE) ──┐
//!     hit_api("alice") ────────────────────┤
//!     hit_api("bob") ──────────────────────┼──► DashMap<identity, Arc<TokenBucket>>
//!     snapshot_status() ───────────────────┤        ┌──────────────────────┐
//!     RefillScheduler tick ────────────────┘        │ "alice" → FREE  1/2  │
//!                                                   │ "bob"   → ENT.  7/10 │
//!                                                   └──────────────────────┘
//! ```
//!
//! The map is sharded, so registrations and lookups for unrelated identities
//! do not serialize on a global lock. Each bucket carries its own tier; there
//! is no second identity → tier map to drift out of sync.
//!
//! Entries are never removed. A long-running process keeps one bucket per
//! identity ever registered.

use super::{
    config::{RateLimiterConfig, Tier},
    core::TokenBucket,
    metrics::RegistryStats,
};
use crate::error::Error;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Initial capacity reserved per shard.
const INITIAL_SHARD_CAPACITY: usize = 64;

/// Upper bound on the number of map shards.
const MAX_SHARDS: usize = 64;

/// Result of a request against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A token was consumed; `tokens_remaining` is the count this
    /// consumption left behind.
    Admitted {
        /// Tokens left immediately after this request.
        tokens_remaining: u64,
    },

    /// The identity's bucket was empty.
    Rejected,

    /// The identity was never registered. No bucket was created or touched;
    /// only the registry's `total_unknown` counter moved.
    UnknownIdentity,
}

impl Outcome {
    /// True for [`Outcome::Admitted`].
    #[inline]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Outcome::Admitted { .. })
    }

    /// HTTP-style status for adapters: 200, 429, or 404 for unknown identities.
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Admitted { .. } => 200,
            Outcome::Rejected => 429,
            Outcome::UnknownIdentity => 404,
        }
    }
}

/// What [`BucketRegistry::register_or_upgrade`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new full bucket was created.
    Created,

    /// An existing bucket was moved to the requested tier and reset.
    Updated {
        /// Tier the bucket was on before.
        previous: Tier,
    },
}

/// Identity → bucket map.
///
/// Share it behind an `Arc`; every method takes `&self`.
///
/// ```rust
/// use tierbucket::{BucketRegistry, Outcome, Tier};
///
/// let registry = BucketRegistry::new();
/// registry.register_or_upgrade("alice", Tier::Free);
///
/// assert_eq!(registry.hit_api("alice"), Outcome::Admitted { tokens_remaining: 1 });
/// assert_eq!(registry.hit_api("alice"), Outcome::Admitted { tokens_remaining: 0 });
/// assert_eq!(registry.hit_api("alice"), Outcome::Rejected);
/// assert_eq!(registry.hit_api("mallory"), Outcome::UnknownIdentity);
/// ```
pub struct BucketRegistry {
    buckets: DashMap<String, Arc<TokenBucket>, ahash::RandomState>,

    /// Tier table and ordering handed to every bucket.
    config: RateLimiterConfig,

    total_registrations: AtomicU64,
    total_upgrades: AtomicU64,
    total_admitted: AtomicU64,
    total_rejected: AtomicU64,
    total_unknown: AtomicU64,
    total_refill_ticks: AtomicU64,
}

impl BucketRegistry {
    /// Creates an empty registry with the default tier table.
    pub fn new() -> Self {
        Self::build(RateLimiterConfig::default())
    }

    /// Creates an empty registry with a custom configuration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if the configuration does not validate.
    pub fn with_config(config: RateLimiterConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RateLimiterConfig) -> Self {
        // DashMap requires a power-of-two shard count greater than one
        let num_shards = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .next_power_of_two()
            .clamp(2, MAX_SHARDS);

        Self {
            buckets: DashMap::with_capacity_and_hasher_and_shard_amount(
                INITIAL_SHARD_CAPACITY * num_shards,
                ahash::RandomState::new(),
                num_shards,
            ),
            config,
            total_registrations: AtomicU64::new(0),
            total_upgrades: AtomicU64::new(0),
            total_admitted: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
            total_unknown: AtomicU64::new(0),
            total_refill_ticks: AtomicU64::new(0),
        }
    }

    /// Configuration the registry was built with.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Registers `identity` on `tier`, or moves an existing identity to `tier`.
    ///
    /// Either way the bucket ends up full at the tier's capacity. Concurrent
    /// calls for the same new identity create exactly one bucket; the losers
    /// see it as occupied and reset it instead.
    pub fn register_or_upgrade(&self, identity: &str, tier: Tier) -> Registration {
        // Fast path: existing identity, no key allocation
        if let Some(bucket) = self.get_bucket(identity) {
            return self.upgrade(identity, &bucket, tier);
        }

        match self.buckets.entry(identity.to_owned()) {
            Entry::Occupied(occupied) => {
                let bucket = occupied.get().clone();
                drop(occupied);
                self.upgrade(identity, &bucket, tier)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(TokenBucket::with_ordering(
                    tier,
                    self.config.tiers,
                    self.config.ordering,
                )));
                self.total_registrations.fetch_add(1, Ordering::Relaxed);
                debug!(identity, %tier, "registered identity");
                Registration::Created
            }
        }
    }

    /// Validating form of [`register_or_upgrade`](Self::register_or_upgrade).
    ///
    /// # Errors
    ///
    /// [`Error::EmptyIdentity`] if `identity` is empty or only whitespace.
    pub fn try_register_or_upgrade(
        &self,
        identity: &str,
        tier: Tier,
    ) -> Result<Registration, Error> {
        if identity.trim().is_empty() {
            return Err(Error::EmptyIdentity);
        }
        Ok(self.register_or_upgrade(identity, tier))
    }

    fn upgrade(&self, identity: &str, bucket: &TokenBucket, tier: Tier) -> Registration {
        let previous = bucket.update_tier(tier);
        self.total_upgrades.fetch_add(1, Ordering::Relaxed);
        debug!(identity, from = %previous, to = %tier, "updated identity tier");
        Registration::Updated { previous }
    }

    /// Looks up the bucket for `identity`.
    #[inline]
    pub fn get_bucket(&self, identity: &str) -> Option<Arc<TokenBucket>> {
        self.buckets.get(identity).map(|entry| entry.value().clone())
    }

    /// Snapshot of every registered identity and its bucket.
    ///
    /// Identities registered while the snapshot is being taken may or may not
    /// appear in it.
    pub fn all_buckets(&self) -> Vec<(String, Arc<TokenBucket>)> {
        self.buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Attempts to admit one request for `identity`.
    ///
    /// An unregistered identity leaves every bucket alone and only bumps
    /// [`RegistryStats::total_unknown`].
    pub fn hit_api(&self, identity: &str) -> Outcome {
        let Some(bucket) = self.get_bucket(identity) else {
            self.total_unknown.fetch_add(1, Ordering::Relaxed);
            warn!(identity, "request for unregistered identity");
            return Outcome::UnknownIdentity;
        };

        match bucket.try_consume_remaining() {
            Some(tokens_remaining) => {
                self.total_admitted.fetch_add(1, Ordering::Relaxed);
                Outcome::Admitted { tokens_remaining }
            }
            None => {
                self.total_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(identity, "request rate limited");
                Outcome::Rejected
            }
        }
    }

    /// Identity and available tokens for every bucket, sorted by identity.
    pub fn snapshot_status(&self) -> Vec<(String, u64)> {
        let mut status: Vec<(String, u64)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().available()))
            .collect();
        status.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        status
    }

    /// Refills every bucket once. Returns how many buckets were visited.
    pub fn refill_all(&self) -> usize {
        let buckets = self.all_buckets();
        for (_, bucket) in &buckets {
            bucket.refill();
        }

        self.total_refill_ticks.fetch_add(1, Ordering::Relaxed);
        buckets.len()
    }

    /// Tier currently assigned to `identity`.
    pub fn tier_of(&self, identity: &str) -> Option<Tier> {
        self.buckets.get(identity).map(|entry| entry.value().tier())
    }

    /// True if `identity` has been registered.
    #[inline]
    pub fn contains(&self, identity: &str) -> bool {
        self.buckets.contains_key(identity)
    }

    /// Number of registered identities.
    #[inline]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True if nothing has been registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Registry-wide counters.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            identities: self.len(),
            total_registrations: self.total_registrations.load(Ordering::Relaxed),
            total_upgrades: self.total_upgrades.load(Ordering::Relaxed),
            total_admitted: self.total_admitted.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            total_unknown: self.total_unknown.load(Ordering::Relaxed),
            total_refill_ticks: self.total_refill_ticks.load(Ordering::Relaxed),
        }
    }
}

impl Default for BucketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BucketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRegistry")
            .field("identities", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
