//! Logical-name-to-instance resolution.

use super::error::ResolveResult;
use super::registry::{InstanceAddress, ServiceRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Resolves a logical service name to a single reachable instance.
///
/// Selection is round-robin across whatever the registry returns; the
/// resolver holds no instance state of its own beyond the rotation
/// counter, so registry changes take effect on the next call.
pub struct ServiceResolver {
    registry: Arc<dyn ServiceRegistry>,
    next: AtomicUsize,
}

impl std::fmt::Debug for ServiceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceResolver")
            .field("next", &self.next)
            .finish()
    }
}

impl ServiceResolver {
    /// Create a resolver over the given registry.
    #[must_use]
    pub fn new(registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            registry,
            next: AtomicUsize::new(0),
        }
    }

    /// Pick one live instance for `service`.
    ///
    /// # Errors
    ///
    /// Returns a [`super::ResolveError`] when the registry has no live
    /// instance for the name. Inside a breaker-wrapped call that error is
    /// classified as a breaker failure.
    pub fn resolve(&self, service: &str) -> ResolveResult<InstanceAddress> {
        let instances = self.registry.lookup(service)?;

        let index = self.next.fetch_add(1, Ordering::Relaxed) % instances.len();
        let chosen = instances[index].clone();
        debug!(service, instance = %chosen, "resolved service");
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{ResolveError, StaticRegistry};
    use std::collections::HashSet;

    fn resolver_with(instances: Vec<InstanceAddress>) -> ServiceResolver {
        ServiceResolver::new(Arc::new(StaticRegistry::with_instances(instances)))
    }

    #[test]
    fn test_resolve_single_instance() {
        let resolver = resolver_with(vec![InstanceAddress::new("svc", "10.0.0.1", 8081)]);

        let addr = resolver.resolve("svc").unwrap();
        assert_eq!(addr.authority(), "10.0.0.1:8081");
    }

    #[test]
    fn test_resolve_rotates_over_instances() {
        let resolver = resolver_with(vec![
            InstanceAddress::new("svc", "10.0.0.1", 8081),
            InstanceAddress::new("svc", "10.0.0.2", 8081),
            InstanceAddress::new("svc", "10.0.0.3", 8081),
        ]);

        let picks: Vec<String> = (0..3)
            .map(|_| resolver.resolve("svc").unwrap().host)
            .collect();
        let unique: HashSet<_> = picks.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_resolve_is_idempotent_over_registry() {
        let registry = Arc::new(StaticRegistry::with_instances([
            InstanceAddress::new("svc", "10.0.0.1", 8081),
            InstanceAddress::new("svc", "10.0.0.2", 8081),
        ]));
        let resolver = ServiceResolver::new(Arc::clone(&registry) as Arc<dyn ServiceRegistry>);

        let registered: HashSet<String> = registry
            .lookup("svc")
            .unwrap()
            .into_iter()
            .map(|a| a.host)
            .collect();

        // Repeated resolution only ever returns registered addresses and
        // leaves the registry untouched.
        for _ in 0..20 {
            let addr = resolver.resolve("svc").unwrap();
            assert!(registered.contains(&addr.host));
        }
        assert_eq!(registry.instance_count("svc"), 2);
    }

    #[test]
    fn test_resolve_empty_service_fails() {
        let registry = Arc::new(StaticRegistry::new());
        let addr = InstanceAddress::new("svc", "10.0.0.1", 8081);
        registry.register(addr.clone());
        registry.deregister(&addr);

        let resolver = ServiceResolver::new(registry);
        let err = resolver.resolve("svc").unwrap_err();
        assert!(matches!(err, ResolveError::NoInstances(_)));
    }
}
