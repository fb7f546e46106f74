//! Dynamic node resolution
//!
//! Some relocations cannot be expressed as a static mapping: the target node
//! depends on the execution being migrated. Such a mapping points at a
//! dynamic identifier (`dynamic://<resolver>`) and the named resolver is
//! looked up when a pointer actually needs it, so a missing resolver only
//! fails the migrations that reach it.

use std::collections::HashMap;
use std::sync::Arc;

use process_graph::ProcessExecution;

use crate::constants::identifiers::DYNAMIC_PREFIX;
use crate::error::ResolverError;

/// Computes a current node identifier from runtime context
pub trait DynamicResolver: Send + Sync {
    /// Current identifier for a pointer resting on `deprecated` in `execution`
    fn resolve(&self, deprecated: &str, execution: &ProcessExecution) -> String;
}

impl<F> DynamicResolver for F
where
    F: Fn(&str, &ProcessExecution) -> String + Send + Sync,
{
    fn resolve(&self, deprecated: &str, execution: &ProcessExecution) -> String {
        self(deprecated, execution)
    }
}

/// Build the dynamic identifier naming a resolver
pub fn dynamic_id(resolver: &str) -> String {
    format!("{}{}", DYNAMIC_PREFIX, resolver)
}

/// Whether an identifier is resolved at runtime
pub fn is_dynamic(id: &str) -> bool {
    id.starts_with(DYNAMIC_PREFIX)
}

/// The resolver named by a dynamic identifier
pub fn resolver_name(id: &str) -> Result<&str, ResolverError> {
    match id.strip_prefix(DYNAMIC_PREFIX).map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(ResolverError::MalformedReference(id.to_string())),
    }
}

/// Link-time registration of a dynamic resolver.
///
/// ```ignore
/// inventory::submit!(instance_migrator::ResolverDescriptor {
///     name: "reviewRouter",
///     create: || Ok(Box::new(ReviewRouter)),
/// });
/// ```
pub struct ResolverDescriptor {
    /// Name referenced by `dynamic://<name>`
    pub name: &'static str,
    /// Factory function that creates the resolver
    pub create: fn() -> Result<Box<dyn DynamicResolver>, String>,
}

inventory::collect!(ResolverDescriptor);

/// Factory for creating or returning a shared resolver
pub type ResolverFactory =
    Arc<dyn Fn() -> Result<Arc<dyn DynamicResolver>, String> + Send + Sync>;

/// Registry of dynamic resolvers by name
#[derive(Default)]
pub struct ResolverRegistry {
    factories: HashMap<String, ResolverFactory>,
}

impl ResolverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every `ResolverDescriptor` submitted at link time
    pub fn discover() -> Self {
        let mut registry = Self::new();
        for descriptor in inventory::iter::<ResolverDescriptor> {
            let create = descriptor.create;
            registry.register_factory(descriptor.name, move || create().map(Arc::from));
        }
        registry
    }

    /// Register a shared resolver instance
    pub fn register(&mut self, name: impl Into<String>, resolver: impl DynamicResolver + 'static) {
        let shared: Arc<dyn DynamicResolver> = Arc::new(resolver);
        self.register_factory(name, move || Ok(shared.clone()));
    }

    /// Register a factory, invoked each time the resolver is needed
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn DynamicResolver>, String> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Instantiate the resolver registered under `name`
    pub fn instantiate(&self, name: &str) -> Result<Arc<dyn DynamicResolver>, ResolverError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ResolverError::NotRegistered(name.to_string()))?;
        factory().map_err(|reason| ResolverError::Instantiation {
            name: name.to_string(),
            reason,
        })
    }

    /// Instantiate the resolver named by a dynamic identifier
    pub fn for_reference(&self, id: &str) -> Result<Arc<dyn DynamicResolver>, ResolverError> {
        self.instantiate(resolver_name(id)?)
    }

    /// Check if a resolver is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered resolver names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl DynamicResolver for Upper {
        fn resolve(&self, deprecated: &str, _execution: &ProcessExecution) -> String {
            deprecated.to_uppercase()
        }
    }

    fn create_upper() -> Result<Box<dyn DynamicResolver>, String> {
        Ok(Box::new(Upper))
    }

    inventory::submit!(ResolverDescriptor {
        name: "linkedUpper",
        create: create_upper,
    });

    #[test]
    fn test_dynamic_identifiers() {
        let id = dynamic_id("nodeResolver");
        assert_eq!(id, "dynamic://nodeResolver");
        assert!(is_dynamic(&id));
        assert!(!is_dynamic("review/first"));
        assert_eq!(resolver_name(&id), Ok("nodeResolver"));
        assert_eq!(
            resolver_name("dynamic://"),
            Err(ResolverError::MalformedReference("dynamic://".to_string()))
        );
        assert!(resolver_name("first").is_err());
    }

    #[test]
    fn test_registered_closure_resolves() {
        let mut registry = ResolverRegistry::new();
        registry.register("nodeResolver", |_: &str, _: &ProcessExecution| "first".to_string());

        let execution = ProcessExecution::new("order", 1, "A");
        let resolver = registry.for_reference("dynamic://nodeResolver").unwrap();
        assert_eq!(resolver.resolve("A", &execution), "first");
    }

    #[test]
    fn test_lookup_failures() {
        let mut registry = ResolverRegistry::new();
        registry.register_factory("broken", || Err("missing configuration".to_string()));

        assert!(matches!(
            registry.instantiate("absent"),
            Err(ResolverError::NotRegistered(name)) if name == "absent"
        ));
        assert!(matches!(
            registry.instantiate("broken"),
            Err(ResolverError::Instantiation { reason, .. }) if reason == "missing configuration"
        ));
    }

    #[test]
    fn test_discover_collects_linked_resolvers() {
        let registry = ResolverRegistry::discover();
        let execution = ProcessExecution::new("order", 1, "a");
        let resolver = registry.instantiate("linkedUpper").unwrap();
        assert_eq!(resolver.resolve("a", &execution), "A");
    }
}
