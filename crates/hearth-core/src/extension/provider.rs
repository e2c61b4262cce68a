use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::container::{ContainerBuilder, YamlFileLoader};
use crate::extension::error::ExtensionError;
use crate::kernel::error::{Error, Result};
use crate::storage::StorageProvider;

/// A unit contributing service definitions to the container
pub trait ServiceProvider: Send + Sync {
    /// Registered name, unique within a partition
    fn name(&self) -> &str;

    /// Add definitions and parameters
    fn register(&self, container: &mut ContainerBuilder) -> Result<()>;

    /// Modify definitions registered by anyone, after every provider of both
    /// partitions has registered
    fn alter(&self, _container: &mut ContainerBuilder) -> Result<()> {
        Ok(())
    }
}

impl fmt::Debug for dyn ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider").field("name", &self.name()).finish()
    }
}

/// Which partition a provider belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOrigin {
    /// Contributed by enabled modules (and core)
    App,
    /// Deployment-specific overrides from settings; processed last
    Site,
}

impl ProviderOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderOrigin::App => "app",
            ProviderOrigin::Site => "site",
        }
    }
}

impl fmt::Display for ProviderOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderOrigin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "app" => Ok(ProviderOrigin::App),
            "site" => Ok(ProviderOrigin::Site),
            other => Err(ExtensionError::UnknownOrigin(other.to_string()).into()),
        }
    }
}

/// Ordered providers and definition files of one origin
#[derive(Debug)]
pub struct ProviderPartition {
    origin: ProviderOrigin,
    providers: IndexMap<String, Arc<dyn ServiceProvider>>,
    yamls: Vec<PathBuf>,
}

impl ProviderPartition {
    pub fn new(origin: ProviderOrigin) -> Self {
        Self {
            origin,
            providers: IndexMap::new(),
            yamls: Vec::new(),
        }
    }

    pub fn origin(&self) -> ProviderOrigin {
        self.origin
    }

    /// Append a provider under `name`; a second provider with the same name
    /// is a configuration error
    pub fn insert(&mut self, name: impl Into<String>, provider: Arc<dyn ServiceProvider>) -> Result<()> {
        let name = name.into();
        if self.providers.contains_key(&name) {
            return Err(ExtensionError::DuplicateProvider {
                origin: self.origin.to_string(),
                name,
            }
            .into());
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn add_yaml(&mut self, path: PathBuf) {
        self.yamls.push(path);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ServiceProvider>> {
        self.providers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn providers(&self) -> impl Iterator<Item = (&str, &Arc<dyn ServiceProvider>)> {
        self.providers.iter().map(|(name, provider)| (name.as_str(), provider))
    }

    pub fn yamls(&self) -> &[PathBuf] {
        &self.yamls
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty() && self.yamls.is_empty()
    }
}

/// Discovery result: the `app` partition followed by the `site` partition
#[derive(Debug)]
pub struct ServiceProviderRegistry {
    app: ProviderPartition,
    site: ProviderPartition,
}

impl Default for ServiceProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceProviderRegistry {
    pub fn new() -> Self {
        Self {
            app: ProviderPartition::new(ProviderOrigin::App),
            site: ProviderPartition::new(ProviderOrigin::Site),
        }
    }

    pub fn partition(&self, origin: ProviderOrigin) -> &ProviderPartition {
        match origin {
            ProviderOrigin::App => &self.app,
            ProviderOrigin::Site => &self.site,
        }
    }

    pub fn partition_mut(&mut self, origin: ProviderOrigin) -> &mut ProviderPartition {
        match origin {
            ProviderOrigin::App => &mut self.app,
            ProviderOrigin::Site => &mut self.site,
        }
    }

    /// Provider names of both partitions, for the `container.service_providers`
    /// parameter
    pub fn names_by_origin(&self) -> IndexMap<&'static str, Vec<String>> {
        [&self.app, &self.site]
            .into_iter()
            .map(|partition| (partition.origin.as_str(), partition.names().map(String::from).collect()))
            .collect()
    }

    /// Load definition files and run providers into `container`: for each
    /// partition (app, then site) its files then its providers, followed by
    /// the alter pass in the same order. The first failure aborts.
    pub fn apply(&self, container: &mut ContainerBuilder, storage: &dyn StorageProvider) -> Result<()> {
        let loader = YamlFileLoader::new(storage);
        for partition in [&self.app, &self.site] {
            for yaml in &partition.yamls {
                loader.load(container, yaml)?;
            }
            for (name, provider) in &partition.providers {
                log::debug!("Registering services of {} provider '{}'", partition.origin, name);
                provider.register(container).map_err(|e| provider_failed(name, "register", e))?;
            }
        }
        for partition in [&self.app, &self.site] {
            for (name, provider) in &partition.providers {
                provider.alter(container).map_err(|e| provider_failed(name, "alter", e))?;
            }
        }
        Ok(())
    }
}

fn provider_failed(name: &str, operation: &'static str, source: Error) -> Error {
    ExtensionError::ProviderFailed {
        provider: name.to_string(),
        operation,
        source: Box::new(source),
    }
    .into()
}
