//! # Circuit Breaker
//!
//! Failure isolation for downstream calls. The breaker wraps an operation
//! together with an infallible fallback, so read-path callers always get a
//! well-formed response even while the downstream dependency is down.

mod breaker;

pub use breaker::{BreakerConfig, BreakerStats, CircuitBreaker, CircuitState};
