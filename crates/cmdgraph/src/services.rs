//! Service and function resolvers.
//!
//! Constructor, method and function parameters that are not symbols are
//! filled from resolvers. A resolver is anything that maps a [`TypeKey`] to
//! an [`Instance`]: a [`ServiceMap`], a closure, or a container of your own.
//!
//! ```rust
//! use cmdgraph::{ServiceMap, ServiceResolver, TypeKey};
//!
//! struct Database { url: String }
//!
//! let mut services = ServiceMap::new();
//! services.insert(Database { url: "sqlite::memory:".into() });
//!
//! let db = services.resolve(TypeKey::of::<Database>()).unwrap();
//! assert_eq!(db.downcast_ref::<Database>().unwrap().url, "sqlite::memory:");
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::{Instance, TypeKey};

/// Supplies service instances by type.
pub trait ServiceResolver: Send + Sync {
    fn resolve(&self, key: TypeKey) -> Option<Instance>;
}

/// Supplies callable instances for function-typed parameters and function
/// commands.
pub trait FunctionResolver: Send + Sync {
    fn resolve_function(&self, key: TypeKey) -> Option<Instance>;
}

impl<F> ServiceResolver for F
where
    F: Fn(TypeKey) -> Option<Instance> + Send + Sync,
{
    fn resolve(&self, key: TypeKey) -> Option<Instance> {
        self(key)
    }
}

/// Type-keyed map of shared instances.
///
/// Inserting a value of a type already present replaces it.
#[derive(Clone, Default)]
pub struct ServiceMap {
    map: HashMap<TypeId, Instance>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.insert_arc(Arc::new(value))
    }

    /// Inserts an already shared value.
    pub fn insert_arc<T: Any + Send + Sync>(&mut self, value: Arc<T>) -> &mut Self {
        self.map.insert(TypeId::of::<T>(), value);
        self
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.clone().downcast::<T>().ok())
    }

    /// Like [`get`](Self::get), but fails with a message naming the type.
    pub fn get_required<T: Any + Send + Sync>(&self) -> anyhow::Result<Arc<T>> {
        self.get::<T>().ok_or_else(|| {
            anyhow::anyhow!("service missing: type {} not registered", type_name::<T>())
        })
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for ServiceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMap")
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

impl ServiceResolver for ServiceMap {
    fn resolve(&self, key: TypeKey) -> Option<Instance> {
        self.map.get(&key.id).cloned()
    }
}

/// Type-keyed map of callables.
///
/// `F` is usually a struct implementing the behaviour, or a boxed closure
/// type such as `Box<dyn Fn(&str) -> String + Send + Sync>`.
#[derive(Clone, Default)]
pub struct FunctionMap {
    map: HashMap<TypeId, Instance>,
}

impl FunctionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F: Any + Send + Sync>(&mut self, function: F) -> &mut Self {
        self.map.insert(TypeId::of::<F>(), Arc::new(function));
        self
    }

    pub fn with<F: Any + Send + Sync>(mut self, function: F) -> Self {
        self.insert(function);
        self
    }

    pub fn contains<F: Any>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<F>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for FunctionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionMap")
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

impl FunctionResolver for FunctionMap {
    fn resolve_function(&self, key: TypeKey) -> Option<Instance> {
        self.map.get(&key.id).cloned()
    }
}

/// Tries several service resolvers in order; the first hit wins.
#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ServiceResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R: ServiceResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverChain")
            .field("len", &self.resolvers.len())
            .finish()
    }
}

impl ServiceResolver for ResolverChain {
    fn resolve(&self, key: TypeKey) -> Option<Instance> {
        self.resolvers.iter().find_map(|r| r.resolve(key))
    }
}

/// Serves functions out of a service resolver.
pub(crate) struct ServicesAsFunctions(pub(crate) Arc<dyn ServiceResolver>);

impl FunctionResolver for ServicesAsFunctions {
    fn resolve_function(&self, key: TypeKey) -> Option<Instance> {
        self.0.resolve(key)
    }
}
