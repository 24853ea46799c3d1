//! HTTP response building, serialization, and client-side parsing.

use super::error::{HttpError, HttpResult};
use bytes::{Bytes, BytesMut};
use http::StatusCode;
use serde::Serialize;
use std::collections::HashMap;

/// Maximum number of headers accepted on a response.
const MAX_HEADERS: usize = 64;

/// An HTTP/1.1 response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl Response {
    /// Create a response builder.
    #[must_use]
    pub fn builder(status: StatusCode) -> ResponseBuilder {
        ResponseBuilder::new(status)
    }

    /// 200 OK.
    #[must_use]
    pub fn ok() -> ResponseBuilder {
        Self::builder(StatusCode::OK)
    }

    /// 202 Accepted — the write path's success-of-acceptance.
    #[must_use]
    pub fn accepted() -> ResponseBuilder {
        Self::builder(StatusCode::ACCEPTED)
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request() -> ResponseBuilder {
        Self::builder(StatusCode::BAD_REQUEST)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found() -> ResponseBuilder {
        Self::builder(StatusCode::NOT_FOUND)
    }

    /// 429 Too Many Requests — admission denied.
    #[must_use]
    pub fn too_many_requests() -> ResponseBuilder {
        Self::builder(StatusCode::TOO_MANY_REQUESTS)
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal_error() -> ResponseBuilder {
        Self::builder(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
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

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Attach the body once it has been fully read.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Serialize to wire bytes.
    #[must_use]
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );

        for (name, value) in &self.headers {
            buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if !self.headers.contains_key("content-length") {
            buf.extend_from_slice(format!("content-length: {}\r\n", self.body.len()).as_bytes());
        }

        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(&self.body);
        buf
    }

    /// Try to parse response headers from `data` (downstream client side).
    ///
    /// Returns `Ok(None)` while the header block is incomplete. On
    /// success the offset is where the body starts.
    pub fn parse(data: &[u8]) -> HttpResult<Option<(Self, usize)>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut headers);

        match parsed.parse(data)? {
            httparse::Status::Partial => Ok(None),
            httparse::Status::Complete(body_offset) => {
                let code = parsed.code.unwrap_or(0);
                let status = StatusCode::from_u16(code)
                    .map_err(|_| HttpError::Parse(format!("invalid status code {code}")))?;

                let mut header_map = HashMap::new();
                for header in parsed.headers.iter() {
                    header_map.insert(
                        header.name.to_lowercase(),
                        String::from_utf8_lossy(header.value).to_string(),
                    );
                }

                Ok(Some((
                    Self {
                        status,
                        headers: header_map,
                        body: Bytes::new(),
                    },
                    body_offset,
                )))
            },
        }
    }
}

/// Builder for responses.
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl ResponseBuilder {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Set a plain-text body.
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.headers
            .insert("content-type".to_string(), "text/plain".to_string());
        self.body = Bytes::from(body.into());
        self
    }

    /// Set a JSON body from any serializable value.
    ///
    /// Serialization of gateway-owned payloads cannot fail; a failure
    /// here would be a programming error, so it degrades to an empty
    /// object rather than panicking on the request path.
    #[must_use]
    pub fn json(mut self, value: &impl Serialize) -> Self {
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        self.body = Bytes::from(serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec()));
        self
    }

    /// Build the response.
    #[must_use]
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}
