//! HTTP server surface of the gateway.

use super::dispatcher::{GatewayDispatcher, ReadOutcome, WriteOutcome};
use super::downstream::Reservation;
use super::error::{HttpError, HttpResult};
use super::request::Request;
use super::response::Response;
use bytes::BytesMut;
use http::Method;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Largest request the gateway will buffer.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Idle read deadline per request.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests served on one connection before it is closed.
const MAX_KEEP_ALIVE_REQUESTS: u32 = 100;

/// Accepting loop plus per-connection tasks.
///
/// One task per connection; each request on it runs the full dispatch
/// and is answered before the next is read. If the client disconnects
/// mid-dispatch the in-flight downstream work completes and its result
/// is discarded with the task.
pub struct GatewayServer {
    listener: TcpListener,
    dispatcher: Arc<GatewayDispatcher>,
}

impl GatewayServer {
    /// Bind to `addr` and prepare to serve.
    ///
    /// # Errors
    ///
    /// Returns the bind error when the address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: Arc<GatewayDispatcher>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher,
        })
    }

    /// The address actually bound (useful with port 0).
    ///
    /// # Errors
    ///
    /// Propagates the socket error.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the task is dropped.
    pub async fn run(self) {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, "gateway listening");
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    tokio::spawn(async move {
                        serve_connection(stream, peer, dispatcher).await;
                    });
                },
                Err(e) => {
                    warn!(error = %e, "accept failed");
                },
            }
        }
    }
}

/// Handle one client connection, keep-alive aware.
async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<GatewayDispatcher>,
) {
    let mut buf = BytesMut::with_capacity(8192);
    let mut served = 0u32;

    loop {
        if served >= MAX_KEEP_ALIVE_REQUESTS {
            debug!(%peer, "keep-alive request cap reached");
            break;
        }

        let request = match read_request(&mut stream, &mut buf).await {
            Ok(Some(mut request)) => {
                request.set_peer_addr(peer.to_string());
                request
            },
            Ok(None) => break, // clean disconnect between requests
            Err(e) => {
                debug!(%peer, error = %e, "bad request");
                let response = Response::bad_request().text("Bad Request").build();
                let _ = stream.write_all(&response.serialize()).await;
                break;
            },
        };
        served += 1;

        let keep_alive = request.is_keep_alive();
        let response = route(&request, &dispatcher).await;

        debug!(
            %peer,
            method = %request.method(),
            path = request.path(),
            status = response.status().as_u16(),
            "request served"
        );

        if let Err(e) = stream.write_all(&response.serialize()).await {
            debug!(%peer, error = %e, "write failed");
            break;
        }
        if !keep_alive {
            break;
        }
    }
}

/// Read one full request (headers and body) from the stream.
///
/// `Ok(None)` means the client closed the connection before sending
/// anything — the normal end of a keep-alive exchange.
async fn read_request(stream: &mut TcpStream, buf: &mut BytesMut) -> HttpResult<Option<Request>> {
    loop {
        if let Some((mut request, body_offset)) = Request::parse(buf)? {
            let body_len = request.content_length().unwrap_or(0);
            let total = body_offset + body_len;
            if total > MAX_REQUEST_BYTES {
                return Err(HttpError::RequestTooLarge {
                    size: total,
                    max: MAX_REQUEST_BYTES,
                });
            }

            if buf.len() >= total {
                let frame = buf.split_to(total).freeze();
                request.set_body(frame.slice(body_offset..));
                return Ok(Some(request));
            }
        } else if buf.len() > MAX_REQUEST_BYTES {
            return Err(HttpError::RequestTooLarge {
                size: buf.len(),
                max: MAX_REQUEST_BYTES,
            });
        }

        let n = match timeout(READ_TIMEOUT, stream.read_buf(buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(HttpError::Io(e)),
            Err(_) => return Err(HttpError::ReadTimeout),
        };
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(HttpError::ConnectionClosed);
        }
    }
}

/// Map a request to its dispatch path and render the outcome.
async fn route(request: &Request, dispatcher: &GatewayDispatcher) -> Response {
    match (request.method(), request.path()) {
        (&Method::GET, "/reservations/names") => match dispatcher.read_names().await {
            ReadOutcome::RateLimited { retry_after_secs } => Response::too_many_requests()
                .header("Retry-After", retry_after_secs.to_string())
                .build(),
            ReadOutcome::Succeeded(names) | ReadOutcome::ServedFallback(names) => {
                Response::ok().json(&names).build()
            },
        },
        (&Method::POST, "/reservations") => {
            let reservation: Reservation = match serde_json::from_slice(request.body()) {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "unreadable reservation body");
                    return Response::bad_request()
                        .text("expected body {\"reservationName\": string}")
                        .build();
                },
            };

            match dispatcher.write_reservation(&reservation.reservation_name) {
                WriteOutcome::RateLimited { retry_after_secs } => Response::too_many_requests()
                    .header("Retry-After", retry_after_secs.to_string())
                    .build(),
                WriteOutcome::Accepted => Response::accepted().build(),
            }
        },
        _ => Response::not_found().text("no such route").build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{AdmissionConfig, AdmissionGate};
    use crate::breaker::CircuitBreaker;
    use crate::discovery::{ServiceResolver, StaticRegistry};
    use crate::events::{ChannelSink, EventPublisher};
    use crate::gateway::downstream::{DownstreamClient, DownstreamConfig};

    fn test_dispatcher() -> Arc<GatewayDispatcher> {
        let (sink, _rx) = ChannelSink::new(16);
        let downstream = DownstreamConfig::default();
        Arc::new(GatewayDispatcher::new(
            AdmissionGate::new(AdmissionConfig::default()),
            CircuitBreaker::with_defaults(),
            ServiceResolver::new(Arc::new(StaticRegistry::new())),
            DownstreamClient::new(&downstream),
            EventPublisher::new(Box::new(sink), "reservations"),
            downstream.service.clone(),
            downstream.fallback_message.clone(),
        ))
    }

    async fn roundtrip(raw: &str) -> Response {
        let server = GatewayServer::bind("127.0.0.1:0".parse().unwrap(), test_dispatcher())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();

        let mut buf = BytesMut::new();
        loop {
            let n = stream.read_buf(&mut buf).await.unwrap();
            if let Some((mut response, offset)) = Response::parse(&buf).unwrap() {
                let len = response.content_length().unwrap_or(0);
                if buf.len() >= offset + len {
                    response.set_body(buf.freeze().slice(offset..offset + len));
                    return response;
                }
            }
            if n == 0 {
                panic!("connection closed before response was complete");
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = roundtrip("GET /nowhere HTTP/1.1\r\nConnection: close\r\n\r\n").await;
        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_read_route_serves_fallback_when_no_backend() {
        let response =
            roundtrip("GET /reservations/names HTTP/1.1\r\nConnection: close\r\n\r\n").await;

        assert_eq!(response.status().as_u16(), 200);
        let names: Vec<String> = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(names, vec!["Downstream service is down"]);
    }

    #[tokio::test]
    async fn test_write_route_accepts_record() {
        let body = r#"{"reservationName":"room-7"}"#;
        let raw = format!(
            "POST /reservations HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let response = roundtrip(&raw).await;
        assert_eq!(response.status().as_u16(), 202);
    }

    #[tokio::test]
    async fn test_write_route_rejects_malformed_body() {
        let raw = "POST /reservations HTTP/1.1\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot json!";
        let response = roundtrip(raw).await;
        assert_eq!(response.status().as_u16(), 400);
    }
}
