//! Dependency resolution boundary.
//!
//! The pipeline only ever asks a [`Resolver`] for an instance of a type; it
//! never inspects how the container is organised. [`ServiceMap`] is a small
//! type-keyed map for applications without a container of their own.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PipelineError, Result};

/// Shared instance handed out by a resolver.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Resolves collaborators and command handlers by type.
pub trait Resolver: Send + Sync {
    /// Returns the instance registered for `type_id`, if any.
    fn try_resolve_any(&self, type_id: TypeId) -> Option<Service>;
}

impl dyn Resolver {
    /// Typed lookup.
    pub fn try_resolve<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.try_resolve_any(TypeId::of::<T>())
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Typed lookup that fails when nothing is registered.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] naming the missing type.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.try_resolve::<T>().ok_or_else(|| {
            PipelineError::Configuration(format!("no service registered for {}", type_name::<T>()))
        })
    }
}

/// Type-keyed instance map.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cmdpipe_runtime::{Resolver, ServiceMap};
///
/// struct Clock(u64);
///
/// let services: Arc<dyn Resolver> = Arc::new(ServiceMap::new().with(Clock(42)));
/// assert_eq!(services.resolve::<Clock>().unwrap().0, 42);
/// assert!(services.try_resolve::<String>().is_none());
/// ```
#[derive(Default, Clone)]
pub struct ServiceMap {
    services: HashMap<TypeId, Service>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `instance`, replacing any previous instance of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, instance: T) {
        self.services.insert(TypeId::of::<T>(), Arc::new(instance));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T: Any + Send + Sync>(mut self, instance: T) -> Self {
        self.insert(instance);
        self
    }
}

impl Resolver for ServiceMap {
    fn try_resolve_any(&self, type_id: TypeId) -> Option<Service> {
        self.services.get(&type_id).cloned()
    }
}

impl std::fmt::Debug for ServiceMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMap")
            .field("len", &self.services.len())
            .finish()
    }
}
