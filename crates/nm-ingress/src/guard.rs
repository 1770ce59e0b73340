//! # Packet Guard
//!
//! A cheap fixed-capacity limiter evaluated ahead of the rolling-window
//! check: one token bucket per source plus a shared global bucket. Its job
//! is to shed trivially abusive senders before they ever touch the sliding
//! history, and to cap the aggregate intake rate of the whole process.
//!
//! Backed by `governor` token buckets, one quota refill per configured
//! per-second capacity.

use std::net::IpAddr;
use std::num::NonZeroU32;

use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Packet guard configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketGuardConfig {
    /// Per-source capacity, packets per second.
    pub packets_per_second: u32,
    /// Global capacity as a multiple of the per-source capacity.
    pub global_multiplier: u32,
}

impl Default for PacketGuardConfig {
    fn default() -> Self {
        Self {
            packets_per_second: 20,
            global_multiplier: 50,
        }
    }
}

/// Fixed-capacity per-second limiter, per source and global.
pub struct PacketGuard {
    per_source: DashMap<IpAddr, DirectLimiter>,
    global: DirectLimiter,
    quota: Quota,
}

impl PacketGuard {
    /// Build from config. Returns `None` if either capacity resolves to
    /// zero, in which case the guard is simply not installed.
    #[must_use]
    pub fn new(config: PacketGuardConfig) -> Option<Self> {
        let per_source = NonZeroU32::new(config.packets_per_second)?;
        let global = NonZeroU32::new(
            config.packets_per_second.saturating_mul(config.global_multiplier),
        )?;

        Some(Self {
            per_source: DashMap::new(),
            global: RateLimiter::direct(Quota::per_second(global)),
            quota: Quota::per_second(per_source),
        })
    }

    /// Whether this packet passes both the per-source and global buckets.
    #[must_use]
    pub fn check(&self, source: IpAddr) -> bool {
        let per_source_ok = self
            .per_source
            .entry(source)
            .or_insert_with(|| RateLimiter::direct(self.quota))
            .check()
            .is_ok();

        per_source_ok && self.global.check().is_ok()
    }

    /// Drop per-source buckets for sources no longer tracked elsewhere.
    pub fn retain_sources(&self, keep: impl Fn(&IpAddr) -> bool) {
        self.per_source.retain(|ip, _| keep(ip));
    }

    /// Number of tracked sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.per_source.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_zero_capacity_is_no_guard() {
        assert!(PacketGuard::new(PacketGuardConfig {
            packets_per_second: 0,
            global_multiplier: 10,
        })
        .is_none());
        assert!(PacketGuard::new(PacketGuardConfig {
            packets_per_second: 10,
            global_multiplier: 0,
        })
        .is_none());
    }

    #[test]
    fn test_per_source_capacity_enforced() {
        let guard = PacketGuard::new(PacketGuardConfig {
            packets_per_second: 5,
            global_multiplier: 100,
        })
        .unwrap();

        for _ in 0..5 {
            assert!(guard.check(ip(1)));
        }
        assert!(!guard.check(ip(1)));

        // A different source has its own bucket.
        assert!(guard.check(ip(2)));
    }

    #[test]
    fn test_global_capacity_enforced() {
        let guard = PacketGuard::new(PacketGuardConfig {
            packets_per_second: 10,
            global_multiplier: 1,
        })
        .unwrap();

        // Ten sources, one packet each, exhausts the global bucket.
        for i in 0..10 {
            assert!(guard.check(ip(i)));
        }
        assert!(!guard.check(ip(100)));
    }

    #[test]
    fn test_retain_sources() {
        let guard = PacketGuard::new(PacketGuardConfig::default()).unwrap();
        guard.check(ip(1));
        guard.check(ip(2));
        assert_eq!(guard.source_count(), 2);

        guard.retain_sources(|source| *source == ip(1));
        assert_eq!(guard.source_count(), 1);
    }
}
