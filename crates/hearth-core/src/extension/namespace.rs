use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::container::ContainerError;
use crate::kernel::error::Result;

/// Maps code namespaces of enabled modules to their source directories.
///
/// Registered on the container as the synthetic `class_loader` service.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    namespaces: RwLock<BTreeMap<String, PathBuf>>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace a module's code lives under
    pub fn module_namespace(module: &str) -> String {
        format!("hearth::{}", module)
    }

    /// Add or replace namespace roots
    pub fn register<I>(&self, namespaces: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        let mut map = self.namespaces.write().map_err(|_| ContainerError::LockPoisoned)?;
        for (namespace, path) in namespaces {
            map.insert(namespace, path);
        }
        Ok(())
    }

    pub fn resolve(&self, namespace: &str) -> Option<PathBuf> {
        self.namespaces.read().ok()?.get(namespace).cloned()
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.resolve(namespace).is_some()
    }

    /// Snapshot of all registered namespaces
    pub fn namespaces(&self) -> BTreeMap<String, PathBuf> {
        self.namespaces.read().map(|map| map.clone()).unwrap_or_default()
    }

    pub fn source_dir(&self, module: &str) -> Option<PathBuf> {
        self.resolve(&Self::module_namespace(module))
    }
}

/// Namespace map for the given modules, `hearth::<module>` -> `<module dir>/src`
pub fn namespaces_for<'a, I>(modules: I) -> BTreeMap<String, PathBuf>
where
    I: IntoIterator<Item = (&'a str, &'a Path)>,
{
    modules
        .into_iter()
        .map(|(name, dir)| (NamespaceRegistry::module_namespace(name), dir.join("src")))
        .collect()
}
