//! Counters describing channel registry activity
//!
//! Provides registration and purge statistics so that operators can tell a
//! healthy registry from one whose purge cycles are blocked.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for registry observability
///
/// # Example
///
/// ```
/// use rust_log_channel_system::RegistryStats;
///
/// let stats = RegistryStats::new();
/// stats.record_registration();
/// stats.record_purged(3);
///
/// assert_eq!(stats.registrations(), 1);
/// assert_eq!(stats.purged_objects(), 3);
/// ```
#[derive(Debug)]
pub struct RegistryStats {
    /// Sources that received a freshly minted channel id
    registrations: AtomicU64,

    /// Registrations answered with an existing id
    reused_registrations: AtomicU64,

    /// Completed purge cycles
    purge_cycles: AtomicU64,

    /// Records removed by purge cycles, cumulative
    purged_objects: AtomicU64,

    /// Candidates deferred because a file writer buffer protected them
    blocked_candidates: AtomicU64,

    /// Records removed through `remove_including_children`
    cascade_removals: AtomicU64,
}

impl RegistryStats {
    pub const fn new() -> Self {
        Self {
            registrations: AtomicU64::new(0),
            reused_registrations: AtomicU64::new(0),
            purge_cycles: AtomicU64::new(0),
            purged_objects: AtomicU64::new(0),
            blocked_candidates: AtomicU64::new(0),
            cascade_removals: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reused_registrations(&self) -> u64 {
        self.reused_registrations.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn purge_cycles(&self) -> u64 {
        self.purge_cycles.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn purged_objects(&self) -> u64 {
        self.purged_objects.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn blocked_candidates(&self) -> u64 {
        self.blocked_candidates.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn cascade_removals(&self) -> u64 {
        self.cascade_removals.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_registration(&self) -> u64 {
        self.registrations.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_reused(&self) -> u64 {
        self.reused_registrations.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_purge_cycle(&self) -> u64 {
        self.purge_cycles.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_purged(&self, count: u64) -> u64 {
        self.purged_objects.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_blocked(&self, count: u64) -> u64 {
        self.blocked_candidates.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_cascade_removed(&self, count: u64) -> u64 {
        self.cascade_removals.fetch_add(count, Ordering::Relaxed)
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.registrations.store(0, Ordering::Relaxed);
        self.reused_registrations.store(0, Ordering::Relaxed);
        self.purge_cycles.store(0, Ordering::Relaxed);
        self.purged_objects.store(0, Ordering::Relaxed);
        self.blocked_candidates.store(0, Ordering::Relaxed);
        self.cascade_removals.store(0, Ordering::Relaxed);
    }
}

impl Default for RegistryStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RegistryStats {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            registrations: AtomicU64::new(self.registrations()),
            reused_registrations: AtomicU64::new(self.reused_registrations()),
            purge_cycles: AtomicU64::new(self.purge_cycles()),
            purged_objects: AtomicU64::new(self.purged_objects()),
            blocked_candidates: AtomicU64::new(self.blocked_candidates()),
            cascade_removals: AtomicU64::new(self.cascade_removals()),
        }
    }
}
