use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lockgate_lock::LockProvider;
use lockgate_lock_memory::MemoryLockProvider;

use crate::error::CoordinatorError;

/// Error type returned by provider constructors.
pub type ConstructorError = Box<dyn std::error::Error + Send + Sync>;

/// Builds a provider from the `options` table of a backend entry.
pub type ProviderConstructor =
    dyn Fn(&toml::Table) -> Result<Arc<dyn LockProvider>, ConstructorError> + Send + Sync;

/// Registry mapping provider-type identifiers to constructors.
///
/// Configuration refers to providers by name (`provider = "redis"`); the
/// factory turns that name plus the entry's `options` into an instance.
pub struct ProviderFactory {
    constructors: HashMap<String, Box<ProviderConstructor>>,
}

impl ProviderFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Create a factory with the built-in `memory` provider registered.
    ///
    /// The memory provider accepts an optional `lease_ttl_ms` option.
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register("memory", |options| {
            let mut provider = MemoryLockProvider::new();
            if let Some(ttl) = options.get("lease_ttl_ms") {
                let ttl = ttl
                    .as_integer()
                    .and_then(|ms| u64::try_from(ms).ok())
                    .ok_or("lease_ttl_ms must be a non-negative integer")?;
                provider = provider.with_lease_ttl(Duration::from_millis(ttl));
            }
            Ok(Arc::new(provider) as Arc<dyn LockProvider>)
        });
        factory
    }

    /// Register (or replace) the constructor for a provider type.
    pub fn register<F>(&mut self, provider_type: impl Into<String>, constructor: F)
    where
        F: Fn(&toml::Table) -> Result<Arc<dyn LockProvider>, ConstructorError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(provider_type.into(), Box::new(constructor));
    }

    pub fn contains(&self, provider_type: &str) -> bool {
        self.constructors.contains_key(provider_type)
    }

    /// Registered provider types, sorted.
    pub fn provider_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate a provider of the given type.
    pub fn create(
        &self,
        provider_type: &str,
        options: &toml::Table,
    ) -> Result<Arc<dyn LockProvider>, CoordinatorError> {
        let constructor = self.constructors.get(provider_type).ok_or_else(|| {
            CoordinatorError::config(format!(
                "unknown provider type '{provider_type}' (registered: {})",
                self.provider_types().join(", ")
            ))
        })?;

        constructor(options).map_err(|e| {
            CoordinatorError::config(format!("cannot build '{provider_type}' provider: {e}"))
        })
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("providers", &self.provider_types())
            .finish()
    }
}
