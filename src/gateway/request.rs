//! HTTP request parsing and serialization.

use super::error::{HttpError, HttpResult};
use bytes::{Bytes, BytesMut};
use http::Method;
use std::collections::HashMap;
use std::str::FromStr;

/// Maximum number of headers accepted on a request.
const MAX_HEADERS: usize = 64;

/// A parsed inbound (or outbound) HTTP/1.1 request.
///
/// This is the request context of one dispatch: created when the bytes
/// arrive, dropped when the response goes out. Nothing persists it.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: HashMap<String, String>,
    body: Bytes,
    peer_addr: Option<String>,
}

impl Request {
    /// Create a request builder.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path (no query handling; the gateway surface has none).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Header value, name case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Content-Length header, if present and numeric.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    /// Request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Attach the body once it has been fully read.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Peer address, when known.
    #[must_use]
    pub fn peer_addr(&self) -> Option<&str> {
        self.peer_addr.as_deref()
    }

    /// Record the peer address.
    pub fn set_peer_addr(&mut self, addr: impl Into<String>) {
        self.peer_addr = Some(addr.into());
    }

    /// Whether the connection should stay open after this exchange.
    #[must_use]
    pub fn is_keep_alive(&self) -> bool {
        self.header("connection")
            .map(|v| !v.eq_ignore_ascii_case("close"))
            .unwrap_or(true)
    }

    /// Try to parse request headers from `data`.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// header block; the caller reads more and retries. On success the
    /// returned offset is where the body starts. The body itself is not
    /// consumed here.
    pub fn parse(data: &[u8]) -> HttpResult<Option<(Self, usize)>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);

        match parsed.parse(data)? {
            httparse::Status::Partial => Ok(None),
            httparse::Status::Complete(body_offset) => {
                let method = Method::from_str(parsed.method.unwrap_or("GET"))?;
                let path = parsed.path.unwrap_or("/").to_string();

                let mut header_map = HashMap::new();
                for header in parsed.headers.iter() {
                    header_map.insert(
                        header.name.to_lowercase(),
                        String::from_utf8_lossy(header.value).to_string(),
                    );
                }

                Ok(Some((
                    Self {
                        method,
                        path,
                        headers: header_map,
                        body: Bytes::new(),
                        peer_addr: None,
                    },
                    body_offset,
                )))
            },
        }
    }

    /// Serialize to wire bytes (used by the downstream client).
    #[must_use]
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(format!("{} {} HTTP/1.1\r\n", self.method, self.path).as_bytes());

        for (name, value) in &self.headers {
            buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if !self.body.is_empty() && !self.headers.contains_key("content-length") {
            buf.extend_from_slice(format!("content-length: {}\r\n", self.body.len()).as_bytes());
        }

        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(&self.body);
        buf
    }
}

/// Builder for outbound requests.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl RequestBuilder {
    /// Set the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the request path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Build the request.
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            method: self.method.unwrap_or(Method::GET),
            path: self.path.unwrap_or_else(|| "/".to_string()),
            headers: self.headers,
            body: self.body,
            peer_addr: None,
        }
    }
}
