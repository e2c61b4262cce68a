use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use heck::ToUpperCamelCase;

use crate::container::{FactoryRegistry, ResolvedArguments, ServiceInstance};
use crate::extension::provider::ServiceProvider;
use crate::kernel::error::Result;

/// Builds a provider instance
pub type ProviderConstructor = Arc<dyn Fn() -> Arc<dyn ServiceProvider> + Send + Sync>;

/// Provider class name a module is expected to ship: `node` ->
/// `NodeServiceProvider`, `content_moderation` -> `ContentModerationServiceProvider`
pub fn provider_class_name(module: &str) -> String {
    format!("{}ServiceProvider", module.to_upper_camel_case())
}

/// Everything compiled into the binary that the kernel may instantiate by
/// name: provider classes and service factories.
///
/// Module providers are found through [`provider_class_name`]; site
/// providers are named explicitly in settings.
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    classes: BTreeMap<String, ProviderConstructor>,
    factories: FactoryRegistry,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider class under an explicit class name
    pub fn register_class<F>(&mut self, class: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn ServiceProvider> + Send + Sync + 'static,
    {
        self.classes.insert(class.into(), Arc::new(constructor));
        self
    }

    /// Register the provider of `module` under its conventional class name
    pub fn register_module<F>(&mut self, module: &str, constructor: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn ServiceProvider> + Send + Sync + 'static,
    {
        self.register_class(provider_class_name(module), constructor)
    }

    /// Register a service factory referenced by definitions
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ResolvedArguments) -> Result<ServiceInstance> + Send + Sync + 'static,
    {
        self.factories.register(name, factory);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Instantiate the provider registered under `class`
    pub fn instantiate(&self, class: &str) -> Option<Arc<dyn ServiceProvider>> {
        self.classes.get(class).map(|constructor| constructor())
    }

    /// Instantiate the provider of `module`, if it ships one
    pub fn module_provider(&self, module: &str) -> Option<Arc<dyn ServiceProvider>> {
        self.instantiate(&provider_class_name(module))
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub fn factories_mut(&mut self) -> &mut FactoryRegistry {
        &mut self.factories
    }
}

impl fmt::Debug for ProviderCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCatalog")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .field("factories", &self.factories)
            .finish()
    }
}
