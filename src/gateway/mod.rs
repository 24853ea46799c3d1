//! # Gateway Core
//!
//! The HTTP surface and the dispatch path behind it. Inbound requests are
//! parsed, admitted (or rejected with 429), and routed: reads proxy to a
//! resolved backend instance through the circuit breaker, writes hand
//! their record to the event channel.

mod dispatcher;
mod downstream;
mod error;
mod request;
mod response;
mod server;

pub use dispatcher::{GatewayDispatcher, ReadOutcome, WriteOutcome, READ_ROUTE, WRITE_ROUTE};
pub use downstream::{
    DownstreamClient, DownstreamConfig, Reservation, ReservationPage,
};
pub use error::{DispatchError, DownstreamError, HttpError, HttpResult};
pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseBuilder};
pub use server::GatewayServer;
