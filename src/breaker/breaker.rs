//! Circuit breaker state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// State of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls go through.
    Closed,
    /// Tripped; calls are short-circuited to the fallback.
    Open,
    /// Cooldown elapsed; a single trial call probes recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the circuit.
    pub failure_threshold: u32,

    /// Time the circuit stays open before a trial call, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 5000,
        }
    }
}

impl BreakerConfig {
    /// Cooldown window as a [`Duration`].
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Counters kept by the breaker.
#[derive(Debug, Default)]
pub struct BreakerStats {
    /// Total calls (including short-circuited ones).
    pub calls: AtomicU64,
    /// Operations that completed successfully.
    pub successes: AtomicU64,
    /// Operations that failed.
    pub failures: AtomicU64,
    /// Calls answered by the fallback without invoking the operation.
    pub short_circuits: AtomicU64,
    /// Transitions into the open state.
    pub opened: AtomicU64,
}

/// Mutable circuit state, guarded by one mutex so transitions serialize.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Permission to run the wrapped operation.
#[derive(Debug, Clone, Copy)]
enum Permit {
    /// Regular closed-state call.
    Normal,
    /// The single half-open trial call.
    Trial,
}

/// Failure-isolating wrapper around a remote operation.
///
/// Closed calls run normally; `failure_threshold` consecutive failures trip
/// the circuit. While open every call returns the fallback immediately.
/// Once the cooldown elapses exactly one trial call goes through; callers
/// arriving while the trial is outstanding are still short-circuited. A
/// successful trial closes the circuit, a failed one reopens it and
/// restarts the cooldown.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    circuit: Mutex<Circuit>,
    stats: BreakerStats,
}

impl CircuitBreaker {
    /// Create a breaker in the closed state.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            stats: BreakerStats::default(),
        }
    }

    /// Create a breaker with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BreakerConfig::default())
    }

    /// Execute `operation` under the breaker, falling back on failure.
    ///
    /// The fallback is infallible: whatever happens to the operation, the
    /// caller always receives a value of type `T`. Any `Err` from the
    /// operation counts as a breaker failure; so does never being allowed
    /// to run (short circuit), though that leaves the failure count
    /// untouched.
    pub async fn call<T, E, F, Fut>(&self, operation: F, fallback: impl FnOnce() -> T) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.stats.calls.fetch_add(1, Ordering::Relaxed);

        let Some(permit) = self.try_acquire() else {
            self.stats.short_circuits.fetch_add(1, Ordering::Relaxed);
            debug!("circuit open, serving fallback");
            return fallback();
        };

        match operation().await {
            Ok(value) => {
                self.record_success();
                value
            },
            Err(err) => {
                warn!(error = %err, "wrapped call failed, serving fallback");
                self.record_failure(permit);
                fallback()
            },
        }
    }

    /// Current circuit state.
    ///
    /// An open circuit whose cooldown has elapsed still reports `Open`;
    /// the transition to half-open happens on the next call.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.circuit.lock().expect("circuit lock poisoned").state
    }

    /// Breaker counters.
    #[must_use]
    pub fn stats(&self) -> &BreakerStats {
        &self.stats
    }

    /// Decide whether a call may proceed, transitioning open -> half-open
    /// when the cooldown window has elapsed.
    fn try_acquire(&self) -> Option<Permit> {
        let mut circuit = self.circuit.lock().expect("circuit lock poisoned");

        match circuit.state {
            CircuitState::Closed => Some(Permit::Normal),
            CircuitState::Open => {
                let cooled_down = circuit
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.cooldown());

                if cooled_down && !circuit.trial_in_flight {
                    circuit.state = CircuitState::HalfOpen;
                    circuit.trial_in_flight = true;
                    debug!("cooldown elapsed, probing with trial call");
                    Some(Permit::Trial)
                } else {
                    None
                }
            },
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight {
                    None
                } else {
                    circuit.trial_in_flight = true;
                    Some(Permit::Trial)
                }
            },
        }
    }

    fn record_success(&self) {
        self.stats.successes.fetch_add(1, Ordering::Relaxed);

        let mut circuit = self.circuit.lock().expect("circuit lock poisoned");
        if circuit.state != CircuitState::Closed {
            debug!(from = %circuit.state, "circuit closed");
        }
        circuit.state = CircuitState::Closed;
        circuit.consecutive_failures = 0;
        circuit.opened_at = None;
        circuit.trial_in_flight = false;
    }

    fn record_failure(&self, permit: Permit) {
        self.stats.failures.fetch_add(1, Ordering::Relaxed);

        let mut circuit = self.circuit.lock().expect("circuit lock poisoned");
        match permit {
            Permit::Trial => {
                // Failed probe: reopen and restart the cooldown.
                circuit.state = CircuitState::Open;
                circuit.opened_at = Some(Instant::now());
                circuit.trial_in_flight = false;
                self.stats.opened.fetch_add(1, Ordering::Relaxed);
                warn!("trial call failed, circuit reopened");
            },
            Permit::Normal => {
                circuit.consecutive_failures += 1;
                if circuit.state == CircuitState::Closed
                    && circuit.consecutive_failures >= self.config.failure_threshold
                {
                    circuit.state = CircuitState::Open;
                    circuit.opened_at = Some(Instant::now());
                    self.stats.opened.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        failures = circuit.consecutive_failures,
                        "failure threshold crossed, circuit opened"
                    );
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn fast_breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            cooldown_ms,
        })
    }

    async fn fail_call(breaker: &CircuitBreaker, attempts: &AtomicU32) -> &'static str {
        breaker
            .call(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<&'static str, _>("boom")
                },
                || "fallback",
            )
            .await
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let breaker = CircuitBreaker::with_defaults();

        let out = breaker
            .call(|| async { Ok::<_, &str>("value") }, || "fallback")
            .await;

        assert_eq!(out, "value");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failure_below_threshold_stays_closed() {
        let breaker = fast_breaker(3, 1000);
        let attempts = AtomicU32::new(0);

        assert_eq!(fail_call(&breaker, &attempts).await, "fallback");
        assert_eq!(fail_call(&breaker, &attempts).await, "fallback");

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_threshold_trips_and_freezes_operation() {
        let breaker = fast_breaker(5, 10_000);
        let attempts = AtomicU32::new(0);

        for _ in 0..5 {
            fail_call(&breaker, &attempts).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(attempts.load(Ordering::SeqCst), 5);

        // Before the cooldown every call is short-circuited; the
        // operation count must not move.
        for _ in 0..10 {
            assert_eq!(fail_call(&breaker, &attempts).await, "fallback");
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        assert_eq!(breaker.stats().short_circuits.load(Ordering::Relaxed), 10);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let breaker = fast_breaker(3, 1000);
        let attempts = AtomicU32::new(0);

        fail_call(&breaker, &attempts).await;
        fail_call(&breaker, &attempts).await;

        breaker
            .call(|| async { Ok::<_, &str>(()) }, || ())
            .await;

        // The streak restarted, so two more failures do not trip.
        fail_call(&breaker, &attempts).await;
        fail_call(&breaker, &attempts).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_trial_success_closes_circuit() {
        let breaker = fast_breaker(1, 20);
        let attempts = AtomicU32::new(0);

        fail_call(&breaker, &attempts).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;

        let out = breaker
            .call(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, &str>("recovered")
                },
                || "fallback",
            )
            .await;
        assert_eq!(out, "recovered");
        assert_eq!(breaker.state(), CircuitState::Closed);
        // Exactly one trial ran after the trip.
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        // Closed again: operations are invoked normally.
        let out = breaker
            .call(|| async { Ok::<_, &str>("normal") }, || "fallback")
            .await;
        assert_eq!(out, "normal");
    }

    #[tokio::test]
    async fn test_trial_failure_reopens_circuit() {
        let breaker = fast_breaker(1, 20);
        let attempts = AtomicU32::new(0);

        fail_call(&breaker, &attempts).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        fail_call(&breaker, &attempts).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        // Cooldown restarted by the failed trial.
        fail_call(&breaker, &attempts).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_trial_while_probe_outstanding() {
        let breaker = Arc::new(fast_breaker(1, 10));
        let attempts = Arc::new(AtomicU32::new(0));

        breaker
            .call(|| async { Err::<(), _>("boom") }, || ())
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Hold the trial open while other callers arrive.
        let trial_breaker = Arc::clone(&breaker);
        let trial_attempts = Arc::clone(&attempts);
        let trial = tokio::spawn(async move {
            trial_breaker
                .call(
                    || async move {
                        trial_attempts.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, &str>("slow trial")
                    },
                    || "fallback",
                )
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Concurrent caller is treated as still-open.
        let out = breaker
            .call(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, &str>("should not run")
                },
                || "fallback",
            )
            .await;
        assert_eq!(out, "fallback");

        assert_eq!(trial.await.unwrap(), "slow trial");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
