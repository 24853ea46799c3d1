//! Gateway error types.

use crate::discovery::ResolveError;
use std::io;
use thiserror::Error;

/// Errors from the hand-rolled HTTP surface.
#[derive(Debug, Error)]
pub enum HttpError {
    /// IO error on the connection.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed HTTP data.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid HTTP method.
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// Request exceeded the size limit.
    #[error("request too large: {size} bytes (max: {max})")]
    RequestTooLarge {
        /// Actual size.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// The peer went away mid-request.
    #[error("connection closed")]
    ConnectionClosed,

    /// Read deadline exceeded.
    #[error("read timed out")]
    ReadTimeout,
}

impl From<httparse::Error> for HttpError {
    fn from(err: httparse::Error) -> Self {
        HttpError::Parse(err.to_string())
    }
}

impl From<http::method::InvalidMethod> for HttpError {
    fn from(err: http::method::InvalidMethod) -> Self {
        HttpError::InvalidMethod(err.to_string())
    }
}

/// Result type for HTTP surface operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors from the proxied downstream call.
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// TCP connect failed.
    #[error("connect to {authority} failed: {reason}")]
    Connect {
        /// Target authority.
        authority: String,
        /// Failure detail.
        reason: String,
    },

    /// The call exceeded its deadline.
    #[error("call to {0} timed out")]
    Timeout(String),

    /// Downstream answered with a non-2xx status.
    #[error("downstream returned status {0}")]
    BadStatus(u16),

    /// Response could not be parsed or deserialized.
    #[error("malformed downstream response: {0}")]
    MalformedResponse(String),

    /// IO error mid-call.
    #[error("downstream IO error: {0}")]
    Io(#[from] io::Error),
}

/// A read-path failure inside the breaker-wrapped operation.
///
/// Both variants are classified identically: the breaker records a
/// failure and the caller receives the fallback payload.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No live instance for the logical service name.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The downstream call itself failed.
    #[error(transparent)]
    Downstream(#[from] DownstreamError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downstream_error_display() {
        let err = DownstreamError::BadStatus(503);
        assert_eq!(err.to_string(), "downstream returned status 503");

        let err = DownstreamError::Timeout("10.0.0.1:8081".to_string());
        assert_eq!(err.to_string(), "call to 10.0.0.1:8081 timed out");
    }

    #[test]
    fn test_dispatch_error_wraps_resolution() {
        let err: DispatchError = ResolveError::NoInstances("svc".to_string()).into();
        assert_eq!(err.to_string(), "no instances available for service 'svc'");
    }

    #[test]
    fn test_http_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err = HttpError::from(io_err);
        assert!(matches!(err, HttpError::Io(_)));
    }
}
