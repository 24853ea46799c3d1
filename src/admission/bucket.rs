//! Token bucket used by the admission gate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Fixed-point scale for fractional token counts.
const TOKEN_SCALE: u64 = 1000;

/// Configuration for a single token bucket.
#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    /// Maximum tokens the bucket can hold (burst capacity).
    pub capacity: u64,

    /// Refill rate in tokens per second.
    pub refill_rate: f64,
}

impl Default for BucketConfig {
    /// One request per 30 seconds, no burst beyond the initial token.
    fn default() -> Self {
        Self {
            capacity: 1,
            refill_rate: 1.0 / 30.0,
        }
    }
}

impl BucketConfig {
    /// Create a new bucket configuration.
    #[must_use]
    pub fn new(capacity: u64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }
}

/// A thread-safe token bucket.
///
/// Tokens refill continuously at `refill_rate` per second up to `capacity`
/// and are drawn one at a time by [`TokenBucket::try_admit`]. Fractional
/// token state is kept as fixed-point (actual * 1000) so the whole
/// check-and-decrement sequence can run as a compare-and-swap loop without
/// a lock. The invariant `0 <= tokens <= capacity` holds at all times.
#[derive(Debug)]
pub struct TokenBucket {
    config: BucketConfig,

    /// Current tokens, fixed-point.
    tokens_scaled: AtomicU64,

    /// Last refill time, nanoseconds since `epoch`.
    refilled_at_nanos: AtomicU64,

    /// Reference instant for timestamp arithmetic.
    epoch: Instant,
}

impl TokenBucket {
    /// Create a bucket, initially full.
    #[must_use]
    pub fn new(config: BucketConfig) -> Self {
        Self {
            tokens_scaled: AtomicU64::new(config.capacity * TOKEN_SCALE),
            refilled_at_nanos: AtomicU64::new(0),
            epoch: Instant::now(),
            config,
        }
    }

    /// Create a bucket with the given capacity and refill rate.
    #[must_use]
    pub fn with_rate(capacity: u64, refill_rate: f64) -> Self {
        Self::new(BucketConfig::new(capacity, refill_rate))
    }

    /// Try to draw one token.
    ///
    /// Returns `true` if a token was available (request admitted). On
    /// `false` the bucket is left unchanged apart from the refill.
    pub fn try_admit(&self) -> bool {
        self.refill();

        loop {
            let current = self.tokens_scaled.load(Ordering::Acquire);
            if current < TOKEN_SCALE {
                return false;
            }

            match self.tokens_scaled.compare_exchange_weak(
                current,
                current - TOKEN_SCALE,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue, // lost the race, re-check
            }
        }
    }

    /// Current token count, after refill.
    #[must_use]
    pub fn available_tokens(&self) -> f64 {
        self.refill();
        self.tokens_scaled.load(Ordering::Acquire) as f64 / TOKEN_SCALE as f64
    }

    /// Burst capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.config.capacity
    }

    /// Refill rate in tokens per second.
    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        self.config.refill_rate
    }

    /// Time until one full token is available.
    ///
    /// Returns [`Duration::ZERO`] when a request would be admitted now.
    #[must_use]
    pub fn time_until_token(&self) -> Duration {
        self.refill();

        let current = self.tokens_scaled.load(Ordering::Acquire) as f64 / TOKEN_SCALE as f64;
        if current >= 1.0 {
            return Duration::ZERO;
        }

        Duration::from_secs_f64((1.0 - current) / self.config.refill_rate)
    }

    /// Reset the bucket to full capacity.
    pub fn reset(&self) {
        self.tokens_scaled
            .store(self.config.capacity * TOKEN_SCALE, Ordering::Release);
        self.refilled_at_nanos
            .store(self.epoch.elapsed().as_nanos() as u64, Ordering::Release);
    }

    /// Drain the bucket to zero tokens. Used by tests and manual overrides.
    pub fn drain(&self) {
        self.tokens_scaled.store(0, Ordering::Release);
        self.refilled_at_nanos
            .store(self.epoch.elapsed().as_nanos() as u64, Ordering::Release);
    }

    /// Add elapsed-time-proportional tokens, capped at capacity.
    fn refill(&self) {
        let now_nanos = self.epoch.elapsed().as_nanos() as u64;
        let last_nanos = self.refilled_at_nanos.load(Ordering::Acquire);

        if now_nanos <= last_nanos {
            return;
        }

        let elapsed_secs = (now_nanos - last_nanos) as f64 / 1_000_000_000.0;
        let earned = (elapsed_secs * self.config.refill_rate * TOKEN_SCALE as f64) as u64;
        if earned == 0 {
            return;
        }

        // Claim the refill window; another thread already handling it is fine.
        if self
            .refilled_at_nanos
            .compare_exchange(last_nanos, now_nanos, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let cap = self.config.capacity * TOKEN_SCALE;
        loop {
            let current = self.tokens_scaled.load(Ordering::Acquire);
            let next = (current + earned).min(cap);
            if current == next {
                break;
            }

            match self.tokens_scaled.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }
    }
}
