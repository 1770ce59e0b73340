//! # Dual-Threshold Rolling Rate Limiter
//!
//! Per-source admission control over a sliding 10-second history of
//! admission instants. Two thresholds are checked on every request:
//!
//! - **burst**: admissions within the most recent 1-second slice, limited
//!   to 3x the configured sustained rate;
//! - **sustained**: admissions across the full window divided by the window
//!   length, limited to the configured sustained rate.
//!
//! A fixed window or a single token bucket would either block legitimate
//! short bursts from store-and-forward nodes or miss sustained low-grade
//! abuse; the pair catches both, and there is no permanent penalty: state
//! self-heals as timestamps age out of the window.
//!
//! Buckets idle for longer than the configured period are purged by a
//! periodic sweep so the map stays bounded. Removal goes through the map's
//! per-shard locking, so it cannot race an in-flight check on the same
//! source, and the idle margin is far larger than any check's duration.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cidr::PrefixList;
use crate::guard::{PacketGuard, PacketGuardConfig};

/// Full rolling window over which admission history is kept.
pub const ROLLING_WINDOW: Duration = Duration::from_secs(10);

/// The most recent slice used for the burst check.
pub const BURST_SLICE: Duration = Duration::from_secs(1);

/// Burst limit as a multiple of the sustained limit.
pub const BURST_MULTIPLIER: u32 = 3;

/// Default idle period after which a source's bucket is purged.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default interval between sweep passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Why a datagram was refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Source matches a blacklist entry. Permanent.
    Blacklist,
    /// Refused by the fixed-capacity packet guard.
    PacketRateLimit,
    /// Too many admissions within the burst slice.
    BurstLimit,
    /// Rolling average exceeds the sustained limit.
    SustainedRateLimit,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::Blacklist => "blacklist",
            RejectReason::PacketRateLimit => "packet_rate_limit",
            RejectReason::BurstLimit => "burst_limit",
            RejectReason::SustainedRateLimit => "sustained_rate_limit",
        };
        f.write_str(s)
    }
}

/// One admission decision, carrying the rates computed while making it so
/// rejections can be published with full context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Option<RejectReason>,
    /// Admissions within the most recent burst slice.
    pub burst_rate: u32,
    /// Admissions across the window divided by the window length.
    pub average_rate: f64,
    pub burst_limit: u32,
    pub sustained_limit: u32,
}

/// Admission configuration, supplied at startup.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Sustained admissions per second per source.
    pub sustained_limit: u32,
    /// Blacklist entries: bare addresses or CIDR prefixes. Malformed
    /// entries are skipped at load.
    pub blacklist: Vec<String>,
    /// Optional packet guard ahead of the rolling window.
    pub guard: Option<PacketGuardConfig>,
    /// Idle period after which a source bucket is purged.
    pub idle_timeout: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            sustained_limit: 10,
            blacklist: Vec::new(),
            guard: Some(PacketGuardConfig::default()),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Admission errors. Only configuration problems are surfaced; per-request
/// checks never fail.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("no admission policy: sustained limit is zero and no packet guard is configured")]
    NoAdmissionPolicy,
}

/// Observable admission counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Sources currently holding a bucket.
    pub active_sources: usize,
    pub total_admitted: u64,
    pub total_blacklisted: u64,
    pub total_rate_limited: u64,
}

/// Per-source admission state.
struct SourceBucket {
    /// Admission instants within the rolling window, oldest first.
    history: VecDeque<Instant>,
    /// Used by the idle sweep.
    last_activity: Instant,
}

impl SourceBucket {
    fn new(now: Instant) -> Self {
        Self {
            history: VecDeque::new(),
            last_activity: now,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.history.front() {
            if now.saturating_duration_since(*front) >= ROLLING_WINDOW {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admissions within the most recent burst slice.
    fn burst_rate(&self, now: Instant) -> u32 {
        self.history
            .iter()
            .rev()
            .take_while(|t| now.saturating_duration_since(**t) < BURST_SLICE)
            .count() as u32
    }

    fn average_rate(&self) -> f64 {
        self.history.len() as f64 / ROLLING_WINDOW.as_secs_f64()
    }
}

/// Per-source admission control: blacklist, packet guard, rolling window.
pub struct AdmissionControl {
    blacklist: PrefixList,
    sustained_limit: u32,
    burst_limit: u32,
    guard: Option<PacketGuard>,
    buckets: DashMap<IpAddr, SourceBucket>,
    idle_timeout: Duration,
    total_admitted: AtomicU64,
    total_blacklisted: AtomicU64,
    total_rate_limited: AtomicU64,
}

impl AdmissionControl {
    /// Build the admission policy.
    ///
    /// Fails only if no policy can be established at all (zero sustained
    /// limit and no guard); malformed blacklist entries are logged and
    /// skipped rather than propagated.
    pub fn new(config: AdmissionConfig) -> Result<Self, AdmissionError> {
        let guard = config.guard.and_then(PacketGuard::new);
        if config.sustained_limit == 0 && guard.is_none() {
            return Err(AdmissionError::NoAdmissionPolicy);
        }

        let blacklist = PrefixList::parse_lenient(&config.blacklist);
        if blacklist.len() < config.blacklist.len() {
            warn!(
                configured = config.blacklist.len(),
                accepted = blacklist.len(),
                "Some blacklist entries were malformed and skipped"
            );
        }

        Ok(Self {
            blacklist,
            sustained_limit: config.sustained_limit,
            burst_limit: config.sustained_limit.saturating_mul(BURST_MULTIPLIER),
            guard,
            buckets: DashMap::new(),
            idle_timeout: config.idle_timeout,
            total_admitted: AtomicU64::new(0),
            total_blacklisted: AtomicU64::new(0),
            total_rate_limited: AtomicU64::new(0),
        })
    }

    /// Decide admission for one datagram from `source`.
    #[must_use]
    pub fn check(&self, source: IpAddr) -> Decision {
        self.check_at(source, Instant::now())
    }

    /// Snapshot of the observable counters.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            active_sources: self.buckets.len(),
            total_admitted: self.total_admitted.load(Ordering::Relaxed),
            total_blacklisted: self.total_blacklisted.load(Ordering::Relaxed),
            total_rate_limited: self.total_rate_limited.load(Ordering::Relaxed),
        }
    }

    /// Purge buckets idle for longer than the configured period.
    pub fn purge_idle(&self) {
        let now = Instant::now();
        let idle_timeout = self.idle_timeout;
        self.buckets.retain(|ip, bucket| {
            let idle = now.saturating_duration_since(bucket.last_activity);
            if idle > idle_timeout {
                debug!(source = %ip, idle_secs = idle.as_secs(), "Purging idle admission bucket");
                false
            } else {
                true
            }
        });
        if let Some(guard) = &self.guard {
            // Snapshot live keys first: taking bucket locks from inside the
            // guard's retain would invert the order used by check_at.
            let live: std::collections::HashSet<IpAddr> =
                self.buckets.iter().map(|entry| *entry.key()).collect();
            guard.retain_sources(|ip| live.contains(ip));
        }
    }

    /// Clock-injectable form of [`check`](Self::check), used by tests to
    /// drive the window deterministically.
    pub(crate) fn check_at(&self, source: IpAddr, now: Instant) -> Decision {
        // The blacklist gate precedes and never touches rate accounting.
        if self.blacklist.contains(source) {
            self.total_blacklisted.fetch_add(1, Ordering::Relaxed);
            debug!(source = %source, "Rejected: blacklisted");
            return self.reject(RejectReason::Blacklist, 0, 0.0);
        }

        let mut bucket = self
            .buckets
            .entry(source)
            .or_insert_with(|| SourceBucket::new(now));
        bucket.last_activity = now;
        bucket.prune(now);

        let burst_rate = bucket.burst_rate(now);
        let average_rate = bucket.average_rate();

        if let Some(guard) = &self.guard {
            if !guard.check(source) {
                self.total_rate_limited.fetch_add(1, Ordering::Relaxed);
                return self.reject(RejectReason::PacketRateLimit, burst_rate, average_rate);
            }
        }

        if self.sustained_limit > 0 {
            if burst_rate >= self.burst_limit {
                self.total_rate_limited.fetch_add(1, Ordering::Relaxed);
                debug!(source = %source, burst_rate, "Rejected: burst limit");
                return self.reject(RejectReason::BurstLimit, burst_rate, average_rate);
            }
            if average_rate >= f64::from(self.sustained_limit) {
                self.total_rate_limited.fetch_add(1, Ordering::Relaxed);
                debug!(source = %source, average_rate, "Rejected: sustained rate limit");
                return self.reject(RejectReason::SustainedRateLimit, burst_rate, average_rate);
            }
        }

        bucket.history.push_back(now);
        self.total_admitted.fetch_add(1, Ordering::Relaxed);
        Decision {
            allowed: true,
            reason: None,
            burst_rate,
            average_rate,
            burst_limit: self.burst_limit,
            sustained_limit: self.sustained_limit,
        }
    }

    fn reject(&self, reason: RejectReason, burst_rate: u32, average_rate: f64) -> Decision {
        Decision {
            allowed: false,
            reason: Some(reason),
            burst_rate,
            average_rate,
            burst_limit: self.burst_limit,
            sustained_limit: self.sustained_limit,
        }
    }
}

/// Background task purging idle buckets at a fixed interval.
pub async fn sweep_task(control: Arc<AdmissionControl>, interval: Duration) {
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        control.purge_idle();
    }
}
