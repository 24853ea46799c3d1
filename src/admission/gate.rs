//! Per-route admission gate.

use super::bucket::{BucketConfig, TokenBucket};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Admission rule for one route.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionRule {
    /// Burst capacity.
    pub capacity: u64,

    /// Refill rate in tokens per second.
    pub refill_rate: f64,
}

impl Default for AdmissionRule {
    fn default() -> Self {
        let bucket = BucketConfig::default();
        Self {
            capacity: bucket.capacity,
            refill_rate: bucket.refill_rate,
        }
    }
}

impl AdmissionRule {
    fn bucket_config(&self) -> BucketConfig {
        BucketConfig::new(self.capacity, self.refill_rate)
    }
}

/// Admission gate configuration.
///
/// Each route gets its own bucket, configurable under
/// `[admission.routes."<route>"]`; routes without an explicit rule use
/// `default_rule`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Whether admission control is active. When disabled every request
    /// is admitted.
    pub enabled: bool,

    /// Rule applied to routes without an explicit entry in `routes`.
    pub default_rule: AdmissionRule,

    /// Per-route rules, keyed by route name.
    pub routes: HashMap<String, AdmissionRule>,
}

impl AdmissionConfig {
    /// Configuration with admission control enabled and default rules.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone)]
pub struct AdmissionDecision {
    /// Whether the request may proceed.
    pub allowed: bool,

    /// Time until the route's bucket holds a full token again.
    pub retry_after: Duration,

    /// Route the decision applies to.
    pub route: String,
}

impl AdmissionDecision {
    /// Value for the `Retry-After` response header, in whole seconds.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after.as_secs().max(1)
    }
}

/// Counters kept by the gate.
#[derive(Debug, Default)]
pub struct AdmissionStats {
    /// Total admission checks.
    pub checks: AtomicU64,
    /// Requests admitted.
    pub admitted: AtomicU64,
    /// Requests rejected.
    pub rejected: AtomicU64,
}

/// Token-bucket admission gate shared by all in-flight requests.
///
/// One bucket per route, created on first use. The check-and-decrement
/// itself happens inside [`TokenBucket::try_admit`], so two simultaneous
/// requests can never both win the last token.
#[derive(Debug)]
pub struct AdmissionGate {
    config: AdmissionConfig,
    buckets: RwLock<HashMap<String, Arc<TokenBucket>>>,
    stats: AdmissionStats,
}

impl AdmissionGate {
    /// Create a gate from configuration.
    #[must_use]
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
            stats: AdmissionStats::default(),
        }
    }

    /// Check whether a request on `route` is admitted.
    pub fn check(&self, route: &str) -> AdmissionDecision {
        self.stats.checks.fetch_add(1, Ordering::Relaxed);

        if !self.config.enabled {
            self.stats.admitted.fetch_add(1, Ordering::Relaxed);
            return AdmissionDecision {
                allowed: true,
                retry_after: Duration::ZERO,
                route: route.to_string(),
            };
        }

        let bucket = self.bucket_for(route);
        if bucket.try_admit() {
            self.stats.admitted.fetch_add(1, Ordering::Relaxed);
            AdmissionDecision {
                allowed: true,
                retry_after: Duration::ZERO,
                route: route.to_string(),
            }
        } else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            AdmissionDecision {
                allowed: false,
                retry_after: bucket.time_until_token(),
                route: route.to_string(),
            }
        }
    }

    /// Gate counters.
    #[must_use]
    pub fn stats(&self) -> &AdmissionStats {
        &self.stats
    }

    /// Drain the bucket for `route`, forcing the next check to reject.
    pub fn drain_route(&self, route: &str) {
        self.bucket_for(route).drain();
    }

    /// Get or create the bucket for a route.
    fn bucket_for(&self, route: &str) -> Arc<TokenBucket> {
        if let Some(bucket) = self
            .buckets
            .read()
            .expect("buckets lock poisoned")
            .get(route)
        {
            return Arc::clone(bucket);
        }

        let mut buckets = self.buckets.write().expect("buckets lock poisoned");
        // Re-check: another request may have created it between locks.
        if let Some(bucket) = buckets.get(route) {
            return Arc::clone(bucket);
        }

        let rule = self
            .config
            .routes
            .get(route)
            .copied()
            .unwrap_or(self.config.default_rule);
        let bucket = Arc::new(TokenBucket::new(rule.bucket_config()));
        buckets.insert(route.to_string(), Arc::clone(&bucket));
        bucket
    }
}
