//! Service registry abstraction and the static in-process registry.

use super::error::{ResolveError, ResolveResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// A concrete network address for one instance of a logical service.
///
/// Ephemeral: produced per resolution and discarded after the dispatch
/// that consumed it. Nothing in the gateway caches addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAddress {
    /// Logical service name this instance belongs to.
    pub service: String,

    /// Host name or IP address.
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl InstanceAddress {
    /// Create a new instance address.
    #[must_use]
    pub fn new(service: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            service: service.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port` authority for HTTP requests.
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for InstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.service, self.host, self.port)
    }
}

/// Lookup interface the gateway consumes from the external registry.
///
/// Implementations return the currently-live instances for a logical
/// service name; liveness tracking itself is the registry's concern.
pub trait ServiceRegistry: Send + Sync {
    /// All live instances registered for `service`.
    fn lookup(&self, service: &str) -> ResolveResult<Vec<InstanceAddress>>;
}

/// Registry backed by an in-process table.
///
/// Used both for static deployments (seeded from configuration) and as
/// the registry double in tests. Lookup never mutates the table.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    instances: RwLock<HashMap<String, Vec<InstanceAddress>>>,
}

impl StaticRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the given instances.
    #[must_use]
    pub fn with_instances(instances: impl IntoIterator<Item = InstanceAddress>) -> Self {
        let registry = Self::new();
        for instance in instances {
            registry.register(instance);
        }
        registry
    }

    /// Register an instance under its service name.
    pub fn register(&self, instance: InstanceAddress) {
        let mut table = self.instances.write().expect("registry lock poisoned");
        table
            .entry(instance.service.clone())
            .or_default()
            .push(instance);
    }

    /// Remove a previously registered instance. Returns `true` if it
    /// was present.
    pub fn deregister(&self, instance: &InstanceAddress) -> bool {
        let mut table = self.instances.write().expect("registry lock poisoned");
        if let Some(list) = table.get_mut(&instance.service) {
            let before = list.len();
            list.retain(|i| i != instance);
            return list.len() != before;
        }
        false
    }

    /// Number of instances registered for `service`.
    #[must_use]
    pub fn instance_count(&self, service: &str) -> usize {
        self.instances
            .read()
            .expect("registry lock poisoned")
            .get(service)
            .map_or(0, Vec::len)
    }
}

impl ServiceRegistry for StaticRegistry {
    fn lookup(&self, service: &str) -> ResolveResult<Vec<InstanceAddress>> {
        let table = self.instances.read().expect("registry lock poisoned");
        match table.get(service) {
            None => Err(ResolveError::UnknownService(service.to_string())),
            Some(list) if list.is_empty() => {
                Err(ResolveError::NoInstances(service.to_string()))
            },
            Some(list) => Ok(list.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_address_authority() {
        let addr = InstanceAddress::new("reservation-service", "10.0.0.7", 8081);
        assert_eq!(addr.authority(), "10.0.0.7:8081");
        assert_eq!(addr.to_string(), "reservation-service@10.0.0.7:8081");
    }

    #[test]
    fn test_lookup_unknown_service() {
        let registry = StaticRegistry::new();
        let err = registry.lookup("reservation-service").unwrap_err();
        assert!(matches!(err, ResolveError::UnknownService(_)));
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = StaticRegistry::new();
        registry.register(InstanceAddress::new("svc", "10.0.0.1", 8081));
        registry.register(InstanceAddress::new("svc", "10.0.0.2", 8081));

        let instances = registry.lookup("svc").unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(registry.instance_count("svc"), 2);
    }

    #[test]
    fn test_deregister_last_instance_empties_service() {
        let registry = StaticRegistry::new();
        let addr = InstanceAddress::new("svc", "10.0.0.1", 8081);
        registry.register(addr.clone());

        assert!(registry.deregister(&addr));
        assert!(!registry.deregister(&addr));

        let err = registry.lookup("svc").unwrap_err();
        assert!(matches!(err, ResolveError::NoInstances(_)));
    }

    #[test]
    fn test_lookup_does_not_mutate_registry() {
        let registry = StaticRegistry::with_instances([
            InstanceAddress::new("svc", "10.0.0.1", 8081),
            InstanceAddress::new("svc", "10.0.0.2", 8081),
        ]);

        for _ in 0..10 {
            let instances = registry.lookup("svc").unwrap();
            assert_eq!(instances.len(), 2);
        }
    }
}
