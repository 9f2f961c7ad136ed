//! # Token Bucket
//!
//! One identity's admission state: how many tokens it holds and which tier
//! those tokens are measured against.
//!
//! ## Packed State Word
//!
//! The tier and the token count live together in a single `AtomicU64`:
//!
//! ```text
//!      63        56 55                                             0
//!     ┌───────────┬────────────────────────────────────────────────┐
//!     │ tier ord. │                 token count                    │
//!     └───────────┴────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation is a compare-and-swap (or swap) of the whole word, so the
//! tier and its tokens always change together. A refill can never read the
//! new tier's capacity against the old tier's tokens, and a tier update never
//! waits for consumers.
//!
//! ## Operations
//!
//! ```text
//!     try_consume:  load ──► tokens == 0? ──yes──► ❌ rejected
//!                               │
//!                               no
//!                               ▼
//!                    CAS(word, word - 1) ──lost──► backoff, reload, retry
//!                               │
//!                              won
//!                               ▼
//!                          ✅ admitted
//!
//!     refill:       load ──► next = min(cap, tokens + rate) ──► CAS ──lost──► retry
//!
//!     update_tier:  swap(word, pack(new_tier, new_cap))
//! ```
//!
//! Retries never give up. Under N concurrent consumers against K tokens exactly
//! `min(N, K)` succeed.

use super::{
    config::{MemoryOrdering, Tier, TierLimits, TierTable, MAX_TIER_CAPACITY},
    metrics::BucketMetrics,
    utils::{Backoff, CacheAligned},
};
use crate::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Bit offset of the tier ordinal inside the state word.
const TIER_SHIFT: u32 = 56;

/// Mask selecting the token count.
const TOKEN_MASK: u64 = MAX_TIER_CAPACITY;

#[inline(always)]
fn pack(tier: Tier, tokens: u64) -> u64 {
    debug_assert!(tokens <= TOKEN_MASK, "token count exceeds 56 bits");
    (tier.ordinal() << TIER_SHIFT) | (tokens & TOKEN_MASK)
}

#[inline(always)]
fn unpack(word: u64) -> (Tier, u64) {
    (Tier::from_ordinal(word >> TIER_SHIFT), word & TOKEN_MASK)
}

/// Caps a capacity to what the token field can hold.
#[inline(always)]
fn clamped(limits: TierLimits) -> TierLimits {
    TierLimits::new(limits.capacity.min(TOKEN_MASK), limits.refill_rate)
}

/// Lock-free token bucket for a single identity.
///
/// Created full. Mutated only through [`try_consume`](Self::try_consume),
/// [`refill`](Self::refill) and [`update_tier`](Self::update_tier); none of
/// them block and none of them fail.
///
/// ```rust
/// use tierbucket::{Tier, TierTable, TokenBucket};
///
/// let bucket = TokenBucket::new(Tier::Free, TierTable::default());
/// assert!(bucket.try_consume());
/// assert!(bucket.try_consume());
/// assert!(!bucket.try_consume());
///
/// bucket.refill();
/// assert_eq!(bucket.available(), 1);
///
/// bucket.update_tier(Tier::Enterprise);
/// assert_eq!(bucket.available(), 10);
/// ```
pub struct TokenBucket {
    /// Packed tier ordinal and token count.
    state: CacheAligned<AtomicU64>,

    /// Limits looked up by the tier recorded in `state`.
    tiers: TierTable,

    ordering: MemoryOrdering,

    total_admitted: AtomicU64,
    total_rejected: AtomicU64,
    total_refills: AtomicU64,
    total_tier_updates: AtomicU64,
}

impl TokenBucket {
    /// Creates a full bucket on `tier`.
    ///
    /// `tiers` must pass [`TierTable::validate`]. The registry and the builder
    /// check this before any bucket exists; use [`try_new`](Self::try_new)
    /// for tables that have not been checked.
    ///
    /// # Panics
    ///
    /// In debug builds, if `tiers` is invalid.
    #[inline]
    pub fn new(tier: Tier, tiers: TierTable) -> Self {
        Self::with_ordering(tier, tiers, MemoryOrdering::default())
    }

    /// Creates a full bucket on `tier` after validating `tiers`.
    ///
    /// ```rust
    /// use tierbucket::{Tier, TierLimits, TierTable, TokenBucket};
    ///
    /// let empty = TierTable::default().with(Tier::Free, TierLimits::new(0, 1));
    /// assert!(TokenBucket::try_new(Tier::Free, empty).is_err());
    /// ```
    pub fn try_new(tier: Tier, tiers: TierTable) -> Result<Self, Error> {
        Self::try_with_ordering(tier, tiers, MemoryOrdering::default())
    }

    /// [`try_new`](Self::try_new) with a specific memory ordering.
    pub fn try_with_ordering(
        tier: Tier,
        tiers: TierTable,
        ordering: MemoryOrdering,
    ) -> Result<Self, Error> {
        tiers.validate()?;
        Ok(Self::with_ordering(tier, tiers, ordering))
    }

    /// Creates a full bucket on `tier` using a specific memory ordering.
    ///
    /// Same contract as [`new`](Self::new).
    pub fn with_ordering(tier: Tier, tiers: TierTable, ordering: MemoryOrdering) -> Self {
        debug_assert!(tiers.validate().is_ok(), "unvalidated tier table");
        let capacity = clamped(tiers.limits(tier)).capacity;

        Self {
            state: CacheAligned::new(AtomicU64::new(pack(tier, capacity))),
            tiers,
            ordering,
            total_admitted: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
            total_refills: AtomicU64::new(0),
            total_tier_updates: AtomicU64::new(0),
        }
    }

    /// Attempts to take one token.
    ///
    /// Returns `true` and removes exactly one token if one was available at
    /// the moment of the successful swap, `false` (with no mutation) otherwise.
    #[inline]
    pub fn try_consume(&self) -> bool {
        self.try_consume_remaining().is_some()
    }

    /// Like [`try_consume`](Self::try_consume) but reports the token count
    /// left by this very decrement.
    ///
    /// The returned value is exact for the winning CAS, unlike a separate
    /// [`available`](Self::available) call which may already be stale.
    pub fn try_consume_remaining(&self) -> Option<u64> {
        let state = self.state.get();
        let mut backoff = Backoff::new();
        let mut current = state.load(self.ordering.load());

        loop {
            let (_, tokens) = unpack(current);
            if tokens == 0 {
                self.total_rejected.fetch_add(1, Ordering::Relaxed);
                return None;
            }

            // tokens > 0, so decrementing the word only touches the low bits
            match state.compare_exchange_weak(
                current,
                current - 1,
                self.ordering.rmw(),
                self.ordering.cas_failure(),
            ) {
                Ok(_) => {
                    self.total_admitted.fetch_add(1, Ordering::Relaxed);
                    return Some(tokens - 1);
                }
                Err(actual) => {
                    current = actual;
                    backoff.snooze();
                }
            }
        }
    }

    /// Credits one tick's worth of tokens, clamped to the tier's capacity.
    ///
    /// Sets the count to `min(capacity, tokens + refill_rate)` using the tier
    /// read in the same atomic load, so a concurrent tier change can never
    /// mix scales.
    pub fn refill(&self) {
        let state = self.state.get();
        let mut backoff = Backoff::new();
        let mut current = state.load(self.ordering.load());

        loop {
            let (tier, tokens) = unpack(current);
            let limits = clamped(self.tiers.limits(tier));
            let next = tokens.saturating_add(limits.refill_rate).min(limits.capacity);

            if next == tokens {
                break;
            }

            match state.compare_exchange_weak(
                current,
                pack(tier, next),
                self.ordering.rmw(),
                self.ordering.cas_failure(),
            ) {
                Ok(_) => {
                    trace!(%tier, from = tokens, to = next, "bucket refilled");
                    break;
                }
                Err(actual) => {
                    current = actual;
                    backoff.snooze();
                }
            }
        }

        self.total_refills.fetch_add(1, Ordering::Relaxed);
    }

    /// Moves the bucket to `new_tier` and resets it to that tier's capacity.
    ///
    /// Tokens accumulated under the previous tier are discarded. Returns the
    /// tier that was replaced.
    pub fn update_tier(&self, new_tier: Tier) -> Tier {
        let capacity = clamped(self.tiers.limits(new_tier)).capacity;
        let previous = self
            .state
            .get()
            .swap(pack(new_tier, capacity), self.ordering.rmw());

        self.total_tier_updates.fetch_add(1, Ordering::Relaxed);

        let (old_tier, old_tokens) = unpack(previous);
        debug!(from = %old_tier, to = %new_tier, old_tokens, capacity, "bucket tier updated");
        old_tier
    }

    /// Current token count. Advisory only; may be stale on return.
    #[inline]
    pub fn available(&self) -> u64 {
        unpack(self.state.get().load(self.ordering.load())).1
    }

    /// Current tier.
    #[inline]
    pub fn tier(&self) -> Tier {
        unpack(self.state.get().load(self.ordering.load())).0
    }

    /// Tier and token count read from one atomic load.
    #[inline]
    pub fn snapshot(&self) -> (Tier, u64) {
        unpack(self.state.get().load(self.ordering.load()))
    }

    /// Limits of the current tier, as enforced on the token count.
    #[inline]
    pub fn limits(&self) -> TierLimits {
        clamped(self.tiers.limits(self.tier()))
    }

    /// Capacity of the current tier.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.limits().capacity
    }

    /// Snapshot of state and lifetime counters.
    pub fn metrics(&self) -> BucketMetrics {
        let (tier, current_tokens) = self.snapshot();
        BucketMetrics {
            tier,
            current_tokens,
            capacity: clamped(self.tiers.limits(tier)).capacity,
            total_admitted: self.total_admitted.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            total_refills: self.total_refills.load(Ordering::Relaxed),
            total_tier_updates: self.total_tier_updates.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (tier, tokens) = self.snapshot();
        f.debug_struct("TokenBucket")
            .field("tier", &tier)
            .field("tokens", &tokens)
            .field("capacity", &clamped(self.tiers.limits(tier)).capacity)
            .finish()
    }
}
