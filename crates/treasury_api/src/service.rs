//! # Service registry
//!
//! Plugins publish implementations of a contract (for instance `dyn EconomyProvider`) under
//! their own name and a [`ServicePriority`]; consumers ask for the best implementation
//! available. When several plugins provide the same contract, the highest priority wins and
//! the earliest registration breaks ties.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Errors produced by the [`ServiceRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The registrar already provides a service of this type
    #[error("{registrar} already registered a {service} service")]
    DuplicateRegistration {
        /// Name of the registering plugin
        registrar: String,
        /// Type name of the service contract
        service: &'static str,
    },
}

/// How strongly a registration should be preferred over others of the same type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ServicePriority {
    Low,
    #[default]
    Normal,
    High,
}

/// A registered implementation of the service contract `T`.
pub struct Service<T: ?Sized> {
    registrar: String,
    priority: ServicePriority,
    service: Arc<T>,
}

impl<T: ?Sized> Service<T> {
    /// Name of the plugin that registered the service.
    pub fn registrar(&self) -> &str {
        &self.registrar
    }

    pub fn priority(&self) -> ServicePriority {
        self.priority
    }

    /// The implementation itself.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.service)
    }
}

impl<T: ?Sized> Clone for Service<T> {
    fn clone(&self) -> Self {
        Self {
            registrar: self.registrar.clone(),
            priority: self.priority,
            service: Arc::clone(&self.service),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Service<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("type", &type_name::<T>())
            .field("registrar", &self.registrar)
            .field("priority", &self.priority)
            .finish()
    }
}

struct Registration {
    registrar: String,
    priority: ServicePriority,
    sequence: u64,
    /// `Service<T>` for the `T` this registration is keyed under
    service: Arc<dyn Any + Send + Sync>,
}

/// Thread-safe registry of services, keyed by contract type.
#[derive(Default)]
pub struct ServiceRegistry {
    services: DashMap<TypeId, Vec<Registration>>,
    next_sequence: AtomicU64,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` as an implementation of `T` on behalf of `registrar`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::DuplicateRegistration`] if `registrar` already provides a `T`.
    pub fn register<T>(
        &self,
        registrar: impl Into<String>,
        priority: ServicePriority,
        service: Arc<T>,
    ) -> Result<(), ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let registrar = registrar.into();
        let mut registrations = self.services.entry(TypeId::of::<T>()).or_default();

        if registrations
            .iter()
            .any(|registration| registration.registrar == registrar)
        {
            return Err(ServiceError::DuplicateRegistration {
                registrar,
                service: type_name::<T>(),
            });
        }

        info!(
            "🔌 {} registered a {} service at {:?} priority",
            registrar,
            type_name::<T>(),
            priority
        );

        registrations.push(Registration {
            registrar: registrar.clone(),
            priority,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            service: Arc::new(Service {
                registrar,
                priority,
                service,
            }),
        });
        registrations.sort_by_key(|registration| {
            (std::cmp::Reverse(registration.priority), registration.sequence)
        });
        Ok(())
    }

    /// Removes every service `registrar` provides; returns how many were removed.
    pub fn unregister(&self, registrar: &str) -> usize {
        let mut removed = 0;
        for mut entry in self.services.iter_mut() {
            let before = entry.len();
            entry.retain(|registration| registration.registrar != registrar);
            removed += before - entry.len();
        }
        self.services.retain(|_, registrations| !registrations.is_empty());

        debug!("🔌 Unregistered {} service(s) of {}", removed, registrar);
        removed
    }

    /// The preferred implementation of `T`, if any.
    pub fn service_for<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Service<T>> {
        let registrations = self.services.get(&TypeId::of::<T>())?;
        registrations.iter().find_map(typed::<T>)
    }

    /// Every implementation of `T`, preferred first.
    pub fn all_services_for<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Service<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .map(|registrations| registrations.iter().filter_map(typed::<T>).collect())
            .unwrap_or_default()
    }
}

fn typed<T: ?Sized + Send + Sync + 'static>(registration: &Registration) -> Option<Service<T>> {
    registration.service.downcast_ref::<Service<T>>().cloned()
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("service_types", &self.services.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EconomyProvider;

    struct StaticProvider {
        name: &'static str,
    }

    impl EconomyProvider for StaticProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn primary_currency_id(&self) -> &str {
            "coins"
        }
    }

    fn provider(name: &'static str) -> Arc<dyn EconomyProvider> {
        Arc::new(StaticProvider { name })
    }

    #[test]
    fn test_highest_priority_wins() {
        let registry = ServiceRegistry::new();
        registry
            .register("basic-eco", ServicePriority::Low, provider("basic"))
            .unwrap();
        registry
            .register("fancy-eco", ServicePriority::High, provider("fancy"))
            .unwrap();
        registry
            .register("plain-eco", ServicePriority::Normal, provider("plain"))
            .unwrap();

        let service = registry.service_for::<dyn EconomyProvider>().unwrap();
        assert_eq!(service.registrar(), "fancy-eco");
        assert_eq!(service.priority(), ServicePriority::High);
        assert_eq!(service.get().name(), "fancy");
        assert!(!service.get().supports_negative_balances());

        let names: Vec<String> = registry
            .all_services_for::<dyn EconomyProvider>()
            .iter()
            .map(|service| service.get().name().to_string())
            .collect();
        assert_eq!(names, vec!["fancy", "plain", "basic"]);
    }

    #[test]
    fn test_earliest_registration_breaks_ties() {
        let registry = ServiceRegistry::new();
        registry
            .register("first", ServicePriority::Normal, provider("one"))
            .unwrap();
        registry
            .register("second", ServicePriority::Normal, provider("two"))
            .unwrap();

        let service = registry.service_for::<dyn EconomyProvider>().unwrap();
        assert_eq!(service.registrar(), "first");
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = ServiceRegistry::new();
        registry
            .register("eco", ServicePriority::Normal, provider("one"))
            .unwrap();

        let result = registry.register("eco", ServicePriority::High, provider("two"));
        assert!(matches!(
            result,
            Err(ServiceError::DuplicateRegistration { ref registrar, .. }) if registrar == "eco"
        ));

        // The same registrar may still provide a different contract.
        registry
            .register("eco", ServicePriority::Normal, Arc::new(42_u32))
            .unwrap();
        assert_eq!(*registry.service_for::<u32>().unwrap().get(), 42);
    }

    #[test]
    fn test_unregister_removes_all_services_of_registrar() {
        let registry = ServiceRegistry::new();
        registry
            .register("eco", ServicePriority::High, provider("eco"))
            .unwrap();
        registry
            .register("eco", ServicePriority::Normal, Arc::new(String::from("extra")))
            .unwrap();
        registry
            .register("backup", ServicePriority::Low, provider("backup"))
            .unwrap();

        assert_eq!(registry.unregister("eco"), 2);
        assert_eq!(
            registry.service_for::<dyn EconomyProvider>().unwrap().registrar(),
            "backup"
        );
        assert!(registry.service_for::<String>().is_none());
        assert_eq!(registry.unregister("nobody"), 0);
    }

    #[test]
    fn test_missing_service() {
        let registry = ServiceRegistry::new();
        assert!(registry.service_for::<dyn EconomyProvider>().is_none());
        assert!(registry.all_services_for::<dyn EconomyProvider>().is_empty());
    }
}
