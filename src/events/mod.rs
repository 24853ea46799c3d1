//! # Event Publication
//!
//! Write-path records leave the gateway through an event channel instead
//! of a synchronous backend call. Publication is best-effort: errors are
//! recorded, never surfaced to the inbound request.

mod publisher;

pub use publisher::{
    ChannelSink, Event, EventPublisher, EventSink, EventsConfig, PublishError, PublisherStats,
};
