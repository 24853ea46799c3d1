//! Discovery error types.

use thiserror::Error;

/// Errors that can occur while resolving a logical service name.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The service name is not registered at all.
    #[error("service '{0}' is not registered")]
    UnknownService(String),

    /// The service is registered but has no live instances.
    #[error("no instances available for service '{0}'")]
    NoInstances(String),
}

/// Result type for discovery operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
