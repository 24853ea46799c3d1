//! Request dispatch: admission, resolution, resilient invocation.

use super::downstream::DownstreamClient;
use super::error::DispatchError;
use crate::admission::AdmissionGate;
use crate::breaker::CircuitBreaker;
use crate::discovery::ServiceResolver;
use crate::events::EventPublisher;
use tracing::{debug, info};

/// Admission route for the read path.
pub const READ_ROUTE: &str = "reservations:read";

/// Admission route for the write path.
pub const WRITE_ROUTE: &str = "reservations:write";

/// Terminal outcome of a read dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Admission denied; no downstream call was made.
    RateLimited {
        /// Seconds after which a retry may be admitted.
        retry_after_secs: u64,
    },

    /// Downstream answered; the real record names.
    Succeeded(Vec<String>),

    /// Circuit open or call failed; the degraded payload.
    ServedFallback(Vec<String>),
}

/// Terminal outcome of a write dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Admission denied; nothing was published.
    RateLimited {
        /// Seconds after which a retry may be admitted.
        retry_after_secs: u64,
    },

    /// Record handed to the event channel. Publish failures are
    /// recorded internally and do not change this outcome.
    Accepted,
}

/// The single entry point composing gate, resolver, breaker, and
/// publisher for every inbound request.
///
/// Read path: admit, resolve, fetch through the breaker, fall back on
/// failure. Write path: admit, hand the record to the publisher; the
/// publish result never affects the response.
#[derive(Debug)]
pub struct GatewayDispatcher {
    gate: AdmissionGate,
    breaker: CircuitBreaker,
    resolver: ServiceResolver,
    client: DownstreamClient,
    publisher: EventPublisher,
    service: String,
    fallback_message: String,
}

impl GatewayDispatcher {
    /// Assemble a dispatcher from its injected components.
    #[must_use]
    pub fn new(
        gate: AdmissionGate,
        breaker: CircuitBreaker,
        resolver: ServiceResolver,
        client: DownstreamClient,
        publisher: EventPublisher,
        service: impl Into<String>,
        fallback_message: impl Into<String>,
    ) -> Self {
        Self {
            gate,
            breaker,
            resolver,
            client,
            publisher,
            service: service.into(),
            fallback_message: fallback_message.into(),
        }
    }

    /// Dispatch a read request: the collection of reservation names.
    pub async fn read_names(&self) -> ReadOutcome {
        let decision = self.gate.check(READ_ROUTE);
        if !decision.allowed {
            info!(route = READ_ROUTE, "request rejected by admission gate");
            return ReadOutcome::RateLimited {
                retry_after_secs: decision.retry_after_secs(),
            };
        }

        self.breaker
            .call(
                || async {
                    let instance = self.resolver.resolve(&self.service)?;
                    let names = self.client.fetch_names(&instance).await?;
                    Ok::<_, DispatchError>(ReadOutcome::Succeeded(names))
                },
                || ReadOutcome::ServedFallback(vec![self.fallback_message.clone()]),
            )
            .await
    }

    /// Dispatch a write request: submit a named record.
    ///
    /// Fire-and-forget: the record is handed to the event channel and
    /// the request is acknowledged regardless of the publish outcome.
    pub fn write_reservation(&self, reservation_name: &str) -> WriteOutcome {
        let decision = self.gate.check(WRITE_ROUTE);
        if !decision.allowed {
            info!(route = WRITE_ROUTE, "request rejected by admission gate");
            return WriteOutcome::RateLimited {
                retry_after_secs: decision.retry_after_secs(),
            };
        }

        debug!(name = reservation_name, "handing record to event channel");
        self.publisher.publish(reservation_name);
        WriteOutcome::Accepted
    }

    /// The admission gate (for metrics and tests).
    #[must_use]
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// The circuit breaker (for metrics and tests).
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The event publisher (for metrics and tests).
    #[must_use]
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }
}
