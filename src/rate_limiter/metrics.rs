//! # Bucket and Registry Metrics
//!
//! Point-in-time snapshots of the counters kept by buckets and the registry.
//! Snapshots are plain values: they are assembled from independent relaxed
//! loads and may be slightly inconsistent with each other under load.
//!
//! ```text
//!     Bucket "alice" (FREE):
//!     ├─ Tokens: 1/2
//!     ├─ Admitted: 14   Rejected: 3
//!     └─ Refills: 9     Tier updates: 1
//! ```

use super::config::Tier;
use std::fmt;

/// Snapshot of one bucket's state and lifetime counters.
///
/// ```rust
/// use tierbucket::{Tier, TierTable, TokenBucket};
///
/// let bucket = TokenBucket::new(Tier::Premium, TierTable::default());
/// bucket.try_consume();
///
/// let metrics = bucket.metrics();
/// assert_eq!(metrics.total_admitted, 1);
/// assert_eq!(metrics.current_tokens, 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMetrics {
    /// Tier at the time of the snapshot.
    pub tier: Tier,

    /// Tokens available at the time of the snapshot.
    pub current_tokens: u64,

    /// Capacity of `tier`.
    pub capacity: u64,

    /// Successful consumptions.
    pub total_admitted: u64,

    /// Consumptions refused because the bucket was empty.
    pub total_rejected: u64,

    /// Refill calls applied to this bucket.
    pub total_refills: u64,

    /// Tier updates applied after creation.
    pub total_tier_updates: u64,
}

impl BucketMetrics {
    /// Fraction of consumptions that were admitted; `1.0` before any traffic.
    #[inline]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            1.0
        } else {
            self.total_admitted as f64 / total as f64
        }
    }

    /// Admitted plus rejected.
    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.total_admitted + self.total_rejected
    }

    /// Share of the capacity currently consumed, `0.0` (full) to `1.0` (empty).
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            1.0 - (self.current_tokens as f64 / self.capacity as f64)
        }
    }

    /// Multi-line human-readable report.
    pub fn summary(&self) -> String {
        format!(
            "Bucket Metrics ({}):\n\
             ├─ Tokens: {}/{}\n\
             ├─ Admitted: {}   Rejected: {}\n\
             ├─ Success Rate: {:.2}%\n\
             └─ Refills: {}   Tier updates: {}",
            self.tier,
            self.current_tokens,
            self.capacity,
            self.total_admitted,
            self.total_rejected,
            self.success_rate() * 100.0,
            self.total_refills,
            self.total_tier_updates
        )
    }
}

impl fmt::Display for BucketMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Registry-wide counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    /// Identities currently registered.
    pub identities: usize,

    /// Buckets created by first registration.
    pub total_registrations: u64,

    /// Registrations that hit an existing bucket and reset its tier.
    pub total_upgrades: u64,

    /// `hit_api` calls that were admitted.
    pub total_admitted: u64,

    /// `hit_api` calls rejected for lack of tokens.
    pub total_rejected: u64,

    /// `hit_api` calls naming an unregistered identity.
    pub total_unknown: u64,

    /// Refill sweeps over the whole registry.
    pub total_refill_ticks: u64,
}

impl RegistryStats {
    /// Every `hit_api` call, including unknown identities.
    pub fn total_requests(&self) -> u64 {
        self.total_admitted + self.total_rejected + self.total_unknown
    }

    /// Multi-line human-readable report.
    pub fn summary(&self) -> String {
        format!(
            "Bucket Registry Stats:\n\
             ├─ Identities: {}\n\
             ├─ Lifecycle:\n\
             │  ├─ Registrations: {}\n\
             │  └─ Upgrades: {}\n\
             ├─ Requests: {}\n\
             │  ├─ Admitted: {}\n\
             │  ├─ Rejected: {}\n\
             │  └─ Unknown identity: {}\n\
             └─ Refill ticks: {}",
            self.identities,
            self.total_registrations,
            self.total_upgrades,
            self.total_requests(),
            self.total_admitted,
            self.total_rejected,
            self.total_unknown,
            self.total_refill_ticks
        )
    }
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BucketMetrics {
        BucketMetrics {
            tier: Tier::Premium,
            current_tokens: 2,
            capacity: 5,
            total_admitted: 3,
            total_rejected: 1,
            total_refills: 4,
            total_tier_updates: 0,
        }
    }

    #[test]
    fn test_success_rate() {
        let metrics = sample();
        assert_eq!(metrics.total_requests(), 4);
        assert!((metrics.success_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_success_rate_without_traffic() {
        let metrics = BucketMetrics {
            total_admitted: 0,
            total_rejected: 0,
            ..sample()
        };
        assert_eq!(metrics.success_rate(), 1.0);
    }

    #[test]
    fn test_utilization() {
        let metrics = sample();
        assert!((metrics.utilization() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_summary() {
        let summary = sample().summary();
        assert!(summary.contains("PREMIUM"));
        assert!(summary.contains("Tokens: 2/5"));
        assert!(summary.contains("75.00%"));
        assert_eq!(format!("{}", sample()), summary);
    }

    #[test]
    fn test_registry_summary() {
        let stats = RegistryStats {
            identities: 2,
            total_registrations: 2,
            total_upgrades: 1,
            total_admitted: 5,
            total_rejected: 2,
            total_unknown: 1,
            total_refill_ticks: 3,
        };
        assert_eq!(stats.total_requests(), 8);

        let summary = stats.summary();
        assert!(summary.contains("Identities: 2"));
        assert!(summary.contains("Unknown identity: 1"));
        assert!(summary.contains("Refill ticks: 3"));
    }
}
