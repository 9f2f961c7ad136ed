//! # Spin and Layout Helpers
//!
//! Small low-level pieces shared by the bucket's compare-and-swap loops:
//! a CPU spin hint, a growing backoff for contended retries, and a
//! cache-line aligned wrapper that keeps each bucket's hot word on its own line.
//!
//! ```text
//!     CAS retry with backoff:
//!
//!     attempt 1 ──► lost ──► spin x1
//!     attempt 2 ──► lost ──► spin x2
//!     attempt 3 ──► lost ──► spin x4
//!     attempt 4 ──► lost ──► spin x8
//!     attempt 5+ ─► lost ──► yield to the OS scheduler
//! ```

/// Number of spinning steps before [`Backoff`] starts yielding the thread.
const SPIN_LIMIT: u32 = 4;

/// CPU relaxation hint for spin loops.
///
/// Emits PAUSE on x86_64 and YIELD on ARM64 through [`std::hint::spin_loop`].
///
/// ```rust
/// use tierbucket::cpu_relax;
///
/// for _ in 0..4 {
///     cpu_relax();
/// }
/// ```
#[inline(always)]
pub fn cpu_relax() {
    std::hint::spin_loop();
}

/// Cache-aligned wrapper that gives its value a cache line of its own.
///
/// Buckets for different identities are allocated independently; aligning the
/// packed word stops two busy identities from invalidating each other's line.
#[cfg(target_arch = "x86_64")]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(pub T);
#[cfg(target_arch = "aarch64")]
#[repr(C, align(128))]
pub(crate) struct CacheAligned<T>(pub T);
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(pub T);

impl<T> CacheAligned<T> {
    #[inline(always)]
    pub(crate) const fn new(value: T) -> Self {
        Self(value)
    }

    #[inline(always)]
    pub(crate) fn get(&self) -> &T {
        &self.0
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CacheAligned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Exponential backoff for a lost compare-and-swap.
///
/// Never gives up: callers loop until their CAS commits, this only decides how
/// long to wait between attempts.
#[derive(Debug, Clone, Default)]
pub(crate) struct Backoff {
    step: u32,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self { step: 0 }
    }

    /// Spins `2^step` times, or yields once the spin limit is reached.
    #[inline]
    pub(crate) fn snooze(&mut self) {
        if self.step < SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                cpu_relax();
            }
            self.step += 1;
        } else {
            std::thread::yield_now();
        }
    }

    /// True once spinning has been abandoned in favour of yielding.
    #[cfg(test)]
    pub(crate) fn is_yielding(&self) -> bool {
        self.step >= SPIN_LIMIT
    }
}
