//! # Tier and Limiter Configuration
//!
//! Everything that shapes a bucket's behaviour lives here: the closed set of
//! service tiers, the limits attached to each tier, and the process-wide
//! settings (refill interval, atomic ordering strategy).
//!
//! ## Tier Table
//!
//! ```text
//!     Default tier table:
//!
//!     ┌────────────┬──────────┬─────────────┐
//!     │ Tier       │ Capacity │ Refill/tick │
//!     ├────────────┼──────────┼─────────────┤
//!     │ FREE       │    2     │      1      │
//!     │ PREMIUM    │    5     │      3      │
//!     │ ENTERPRISE │   10     │      5      │
//!     └────────────┴──────────┴─────────────┘
//!
//!     One tick every 5 seconds.
//! ```
//!
//! Tiers are plain data. A bucket records *which* tier it is on and reads the
//! limits from the [`TierTable`] it was built with; there is no per-tier logic.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::Ordering;

/// Largest capacity a tier may declare.
///
/// A bucket packs its tier ordinal into the top byte of a 64-bit word and its
/// token count into the remaining 56 bits, so token counts must fit in 56 bits.
pub const MAX_TIER_CAPACITY: u64 = (1 << 56) - 1;

/// Default interval between refill ticks, in milliseconds.
pub const DEFAULT_REFILL_INTERVAL_MS: u64 = 5_000;

/// Memory ordering strategy for the bucket's atomic word.
///
/// `AcquireRelease` is the default and the right choice for nearly everyone.
/// `Relaxed` is still correct for the conservation property (every CAS is on
/// the same word) but gives no happens-before edges to surrounding code.
///
/// ```rust
/// use tierbucket::{MemoryOrdering, RateLimiterConfig};
///
/// let config = RateLimiterConfig::default().with_ordering(MemoryOrdering::Sequential);
/// assert_eq!(config.ordering, MemoryOrdering::Sequential);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryOrdering {
    /// Relaxed ordering on every access.
    Relaxed,

    /// Acquire on loads, Release on stores, AcqRel on read-modify-write.
    #[default]
    AcquireRelease,

    /// Sequential consistency everywhere.
    Sequential,
}

impl MemoryOrdering {
    /// Ordering for plain loads of the bucket word.
    #[inline(always)]
    pub(crate) fn load(&self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcquireRelease => Ordering::Acquire,
            Self::Sequential => Ordering::SeqCst,
        }
    }

    /// Ordering for a successful compare-and-swap.
    #[inline(always)]
    pub(crate) fn rmw(&self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcquireRelease => Ordering::AcqRel,
            Self::Sequential => Ordering::SeqCst,
        }
    }

    /// Ordering for the reload performed when a compare-and-swap loses.
    #[inline(always)]
    pub(crate) fn cas_failure(&self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcquireRelease => Ordering::Acquire,
            Self::Sequential => Ordering::SeqCst,
        }
    }
}

/// Service tier assigned to an identity.
///
/// A closed enumeration: the set of tiers is fixed at compile time and each
/// variant maps to one row of the [`TierTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// Entry-level tier with the smallest burst.
    Free,
    /// Paid tier.
    Premium,
    /// Highest tier with the largest burst and fastest refill.
    Enterprise,
}

impl Tier {
    /// All tiers in ascending order.
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Premium, Tier::Enterprise];

    /// Stable ordinal used when packing a tier into the bucket word.
    #[inline(always)]
    pub(crate) const fn ordinal(self) -> u64 {
        match self {
            Tier::Free => 0,
            Tier::Premium => 1,
            Tier::Enterprise => 2,
        }
    }

    /// Inverse of [`Tier::ordinal`]. Only ever fed values produced by `ordinal`.
    #[inline(always)]
    pub(crate) const fn from_ordinal(ordinal: u64) -> Tier {
        match ordinal {
            0 => Tier::Free,
            1 => Tier::Premium,
            _ => Tier::Enterprise,
        }
    }

    /// Upper-case display name (`FREE`, `PREMIUM`, `ENTERPRISE`).
    pub const fn name(self) -> &'static str {
        match self {
            Tier::Free => "FREE",
            Tier::Premium => "PREMIUM",
            Tier::Enterprise => "ENTERPRISE",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = Error;

    /// Accepts tier names in any case, or the console menu digits `1`/`2`/`3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "1" | "free" => Ok(Tier::Free),
            "2" | "premium" => Ok(Tier::Premium),
            "3" | "enterprise" => Ok(Tier::Enterprise),
            _ => Err(Error::UnknownTier(trimmed.to_string())),
        }
    }
}

/// Limits attached to one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    /// Burst size and refill ceiling.
    pub capacity: u64,

    /// Tokens credited per refill tick. May exceed `capacity`; the refill
    /// clamps either way.
    pub refill_rate: u64,
}

impl TierLimits {
    /// Creates a limits record.
    pub const fn new(capacity: u64, refill_rate: u64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }
}

/// Lookup table from [`Tier`] to [`TierLimits`].
///
/// `Copy` so every bucket can carry its own copy without sharing.
///
/// ```rust
/// use tierbucket::{Tier, TierLimits, TierTable};
///
/// let table = TierTable::default().with(Tier::Free, TierLimits::new(3, 1));
/// assert_eq!(table.limits(Tier::Free).capacity, 3);
/// assert_eq!(table.limits(Tier::Enterprise).capacity, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTable {
    rows: [TierLimits; 3],
}

impl TierTable {
    /// Builds a table from explicit rows.
    pub const fn new(free: TierLimits, premium: TierLimits, enterprise: TierLimits) -> Self {
        Self {
            rows: [free, premium, enterprise],
        }
    }

    /// Limits for `tier`.
    #[inline(always)]
    pub fn limits(&self, tier: Tier) -> TierLimits {
        self.rows[tier.ordinal() as usize]
    }

    /// Returns a copy of the table with `tier` remapped to `limits`.
    pub fn with(mut self, tier: Tier, limits: TierLimits) -> Self {
        self.rows[tier.ordinal() as usize] = limits;
        self
    }

    /// Checks every row.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if a capacity is zero or does not fit in the
    /// bucket's 56-bit token field.
    pub fn validate(&self) -> Result<(), Error> {
        for tier in Tier::ALL {
            let limits = self.limits(tier);
            if limits.capacity == 0 {
                return Err(Error::InvalidConfig("tier capacity must be greater than 0"));
            }
            if limits.capacity > MAX_TIER_CAPACITY {
                return Err(Error::InvalidConfig("tier capacity exceeds 2^56 - 1"));
            }
        }
        Ok(())
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::new(
            TierLimits::new(2, 1),
            TierLimits::new(5, 3),
            TierLimits::new(10, 5),
        )
    }
}

/// Process-wide limiter settings.
///
/// Loaded once at startup and never mutated afterwards.
///
/// ```rust
/// use tierbucket::RateLimiterConfig;
///
/// let config = RateLimiterConfig::default().with_refill_interval_ms(1_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Limits for each tier.
    pub tiers: TierTable,

    /// Milliseconds between refill ticks.
    pub refill_interval_ms: u64,

    /// Atomic ordering used by every bucket.
    pub ordering: MemoryOrdering,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            tiers: TierTable::default(),
            refill_interval_ms: DEFAULT_REFILL_INTERVAL_MS,
            ordering: MemoryOrdering::default(),
        }
    }
}

impl RateLimiterConfig {
    /// Replaces the tier table.
    pub fn with_tiers(mut self, tiers: TierTable) -> Self {
        self.tiers = tiers;
        self
    }

    /// Sets the refill interval.
    pub fn with_refill_interval_ms(mut self, ms: u64) -> Self {
        self.refill_interval_ms = ms;
        self
    }

    /// Sets the memory ordering strategy.
    pub fn with_ordering(mut self, ordering: MemoryOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Validates the tier table and the refill interval.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        self.tiers.validate()?;
        if self.refill_interval_ms == 0 {
            return Err(Error::InvalidConfig("refill_interval_ms must be greater than 0"));
        }
        Ok(())
    }
}
