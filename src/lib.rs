//! # Reservation Gateway
//!
//! An API gateway that fronts the reservation service registry. Inbound
//! requests pass through admission control (token-bucket rate limiting),
//! logical service names are resolved to live backend instances, and
//! downstream calls are wrapped in a circuit breaker with a fixed fallback
//! payload. Write-type requests hand their payload to a best-effort event
//! publisher instead of calling the backend directly.
//!
//! ## Request flow
//!
//! ```text
//! inbound -> AdmissionGate -> (429 on deny)
//!         -> read:  ServiceResolver -> CircuitBreaker(downstream GET) -> names | fallback
//!         -> write: EventPublisher.publish(topic, name) -> accepted
//! ```
//!
//! ## Modules
//!
//! - [`admission`] — token bucket and per-route admission gate
//! - [`breaker`] — circuit breaker state machine
//! - [`discovery`] — service registry and round-robin resolver
//! - [`events`] — fire-and-forget event publication
//! - [`gateway`] — HTTP surface, downstream client, and the dispatcher
//! - [`config`] — TOML configuration loading

pub mod admission;
pub mod breaker;
pub mod config;
pub mod discovery;
pub mod events;
pub mod gateway;
