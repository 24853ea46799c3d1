//! Downstream HTTP client for the proxied read path.

use super::error::DownstreamError;
use super::request::Request;
use super::response::Response;
use crate::discovery::InstanceAddress;
use bytes::BytesMut;
use http::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Resource path the reservation service exposes.
const RESERVATIONS_PATH: &str = "/reservations";

/// Reservation record DTO.
///
/// Deliberately decoupled from the downstream service's own type; only
/// the name field is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Record name.
    #[serde(rename = "reservationName")]
    pub reservation_name: String,
}

/// Collection envelope the downstream service answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationPage {
    /// The records; paging metadata, if any, is ignored.
    pub content: Vec<Reservation>,
}

/// Downstream call configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Logical service name to resolve.
    pub service: String,

    /// TCP connect deadline, milliseconds.
    pub connect_timeout_ms: u64,

    /// Response read deadline, milliseconds.
    pub read_timeout_ms: u64,

    /// Degraded-mode payload served when the circuit is open or the
    /// call fails.
    pub fallback_message: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            service: "reservation-service".to_string(),
            connect_timeout_ms: 1000,
            read_timeout_ms: 2000,
            fallback_message: "Downstream service is down".to_string(),
        }
    }
}

impl DownstreamConfig {
    /// Connect deadline as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read deadline as a [`Duration`].
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Minimal HTTP/1.1 client for the resolved backend instance.
///
/// One connection per call; the address is recomputed by the resolver
/// every dispatch, so there is nothing to pool against. Both phases of
/// the call carry a deadline — an unresponsive backend is a breaker
/// failure, never an indefinite hang.
#[derive(Debug, Clone)]
pub struct DownstreamClient {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl DownstreamClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: &DownstreamConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
        }
    }

    /// Fetch all reservation names from `instance`.
    ///
    /// # Errors
    ///
    /// Connect failure, timeout, non-2xx status, and an undecodable body
    /// are all [`DownstreamError`]s; the circuit breaker treats each of
    /// them as a failure.
    pub async fn fetch_names(
        &self,
        instance: &InstanceAddress,
    ) -> Result<Vec<String>, DownstreamError> {
        let authority = instance.authority();

        let mut stream = timeout(self.connect_timeout, TcpStream::connect(&authority))
            .await
            .map_err(|_| DownstreamError::Timeout(authority.clone()))?
            .map_err(|e| DownstreamError::Connect {
                authority: authority.clone(),
                reason: e.to_string(),
            })?;

        let request = Request::builder()
            .method(Method::GET)
            .path(RESERVATIONS_PATH)
            .header("Host", &authority)
            .header("Accept", "application/json")
            .header("Connection", "close")
            .build();
        stream.write_all(&request.serialize()).await?;

        let response = timeout(self.read_timeout, read_response(&mut stream))
            .await
            .map_err(|_| DownstreamError::Timeout(authority.clone()))??;

        if !response.status().is_success() {
            return Err(DownstreamError::BadStatus(response.status().as_u16()));
        }

        let page: ReservationPage = serde_json::from_slice(response.body())
            .map_err(|e| DownstreamError::MalformedResponse(e.to_string()))?;

        let names: Vec<String> = page
            .content
            .into_iter()
            .map(|r| r.reservation_name)
            .collect();
        debug!(instance = %instance, count = names.len(), "fetched reservation names");
        Ok(names)
    }
}

/// Read a full response (headers + body) from the stream.
///
/// The body is complete at Content-Length bytes when the header is
/// present, otherwise at EOF (we request `Connection: close`).
async fn read_response(stream: &mut TcpStream) -> Result<Response, DownstreamError> {
    let mut buf = BytesMut::with_capacity(8192);

    let (mut response, body_offset) = loop {
        let n = stream.read_buf(&mut buf).await?;
        if let Some(parsed) = Response::parse(&buf)
            .map_err(|e| DownstreamError::MalformedResponse(e.to_string()))?
        {
            break parsed;
        }
        if n == 0 {
            return Err(DownstreamError::MalformedResponse(
                "connection closed before headers were complete".to_string(),
            ));
        }
    };

    match response.content_length() {
        Some(length) => {
            while buf.len() < body_offset + length {
                let n = stream.read_buf(&mut buf).await?;
                if n == 0 {
                    return Err(DownstreamError::MalformedResponse(
                        "connection closed mid-body".to_string(),
                    ));
                }
            }
            response.set_body(buf.freeze().slice(body_offset..body_offset + length));
        },
        None => {
            // No length header: drain to EOF.
            loop {
                let n = stream.read_buf(&mut buf).await?;
                if n == 0 {
                    break;
                }
            }
            response.set_body(buf.freeze().slice(body_offset..));
        },
    }

    Ok(response)
}
