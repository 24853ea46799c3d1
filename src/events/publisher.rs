//! Best-effort event publication for the write path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Errors raised by an event sink.
#[derive(Debug)]
pub enum PublishError {
    /// The transport's buffer is full.
    ChannelFull(String),

    /// The transport is no longer accepting messages.
    ChannelClosed(String),

    /// Transport-specific failure.
    Transport(String),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelFull(topic) => write!(f, "channel full for topic '{topic}'"),
            Self::ChannelClosed(topic) => write!(f, "channel closed for topic '{topic}'"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for PublishError {}

/// Event channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Topic write-path records are published to.
    pub topic: String,

    /// Channel buffer size before hand-off starts failing.
    pub buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            topic: "reservations".to_string(),
            buffer: 256,
        }
    }
}

/// Outbound event handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Topic name.
    pub topic: String,
    /// Serialized payload.
    pub payload: String,
}

/// Contract the gateway needs from the external event channel.
pub trait EventSink: Send + Sync {
    /// Hand a payload to the transport.
    fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

/// Sink backed by a bounded in-process channel.
///
/// The hand-off is non-blocking: the inbound request never waits on the
/// consumer, it only enqueues. Whoever drains the receiver (broker
/// bridge, test harness) runs outside the request path.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let event = Event {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };

        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(PublishError::ChannelFull(topic.to_string()))
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(PublishError::ChannelClosed(topic.to_string()))
            },
        }
    }
}

/// Counters kept by the publisher.
#[derive(Debug, Default)]
pub struct PublisherStats {
    /// Payloads accepted by the sink.
    pub published: AtomicU64,
    /// Payloads the sink rejected.
    pub failed: AtomicU64,
}

/// Fire-and-forget wrapper over an [`EventSink`].
///
/// Publish failures are logged and counted, never re-raised: once a write
/// request is admitted the caller gets success-of-acceptance regardless
/// of what the transport does. No retry.
pub struct EventPublisher {
    sink: Box<dyn EventSink>,
    topic: String,
    stats: PublisherStats,
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("topic", &self.topic)
            .field("stats", &self.stats)
            .finish()
    }
}

impl EventPublisher {
    /// Create a publisher for a fixed topic.
    #[must_use]
    pub fn new(sink: Box<dyn EventSink>, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
            stats: PublisherStats::default(),
        }
    }

    /// Publish `payload`, absorbing any sink error.
    pub fn publish(&self, payload: &str) {
        match self.sink.publish(&self.topic, payload) {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                debug!(topic = %self.topic, "event published");
            },
            Err(err) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %self.topic, error = %err, "event publish failed, dropping");
            },
        }
    }

    /// The topic this publisher writes to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publisher counters.
    #[must_use]
    pub fn stats(&self) -> &PublisherStats {
        &self.stats
    }
}
