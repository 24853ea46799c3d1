//! # Service Discovery
//!
//! Maps logical service names to reachable instances. The gateway only
//! consumes the registry's resolution result; instance health and
//! registration protocols belong to the registry itself.

mod error;
mod registry;
mod resolver;

pub use error::{ResolveError, ResolveResult};
pub use registry::{InstanceAddress, ServiceRegistry, StaticRegistry};
pub use resolver::ServiceResolver;
