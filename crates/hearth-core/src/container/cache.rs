use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::container::container::CompiledContainer;
use crate::container::error::ContainerError;
use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::storage::StorageProvider;

/// Name of the compiled container artifact for an environment
pub fn cache_name(environment: &str) -> String {
    format!("{}{}", constants::CONTAINER_CACHE_PREFIX, environment)
}

/// Backend storing compiled container artifacts.
///
/// Reads are optimistic and writes are last-writer-wins; callers treat any
/// unreadable artifact as absent.
pub trait ContainerStorage: Send + Sync + Debug {
    /// Raw artifact content, `None` when nothing is stored under `name`
    fn load(&self, name: &str) -> Result<Option<String>>;

    fn save(&self, name: &str, content: &str) -> Result<()>;

    /// Remove an artifact; returns whether one existed
    fn delete(&self, name: &str) -> Result<bool>;

    /// Whether `save` can be expected to succeed
    fn writeable(&self) -> bool;
}

/// Stores artifacts as `<directory>/<name>.json` through a storage provider
#[derive(Debug)]
pub struct FileContainerStorage {
    provider: Arc<dyn StorageProvider>,
    directory: PathBuf,
}

impl FileContainerStorage {
    pub fn new(provider: Arc<dyn StorageProvider>, directory: PathBuf) -> Self {
        Self { provider, directory }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{}.json", name))
    }
}

impl ContainerStorage for FileContainerStorage {
    fn load(&self, name: &str) -> Result<Option<String>> {
        let path = self.path_for(name);
        if !self.provider.is_file(&path) {
            return Ok(None);
        }
        self.provider.read_to_string(&path).map(Some)
    }

    fn save(&self, name: &str, content: &str) -> Result<()> {
        if !self.provider.is_dir(&self.directory) {
            self.provider.create_dir_all(&self.directory)?;
        }
        self.provider.write_string(&self.path_for(name), content)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name);
        if !self.provider.is_file(&path) {
            return Ok(false);
        }
        self.provider.remove_file(&path)?;
        Ok(true)
    }

    fn writeable(&self) -> bool {
        self.provider.is_writable(&self.directory)
    }
}

/// In-process artifact store, mostly useful in tests
#[derive(Debug, Default)]
pub struct MemoryContainerStorage {
    artifacts: RwLock<HashMap<String, String>>,
    read_only: bool,
}

impl MemoryContainerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `save` always fails
    pub fn read_only() -> Self {
        Self {
            artifacts: RwLock::new(HashMap::new()),
            read_only: true,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts
            .read()
            .map(|artifacts| artifacts.contains_key(name))
            .unwrap_or(false)
    }

    /// Overwrite an artifact with arbitrary content
    pub fn insert_raw(&self, name: &str, content: &str) -> Result<()> {
        let mut artifacts = self.artifacts.write().map_err(|_| ContainerError::LockPoisoned)?;
        artifacts.insert(name.to_string(), content.to_string());
        Ok(())
    }
}

impl ContainerStorage for MemoryContainerStorage {
    fn load(&self, name: &str) -> Result<Option<String>> {
        let artifacts = self.artifacts.read().map_err(|_| ContainerError::LockPoisoned)?;
        Ok(artifacts.get(name).cloned())
    }

    fn save(&self, name: &str, content: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::Other(format!("container storage is read-only, cannot save '{}'", name)));
        }
        self.insert_raw(name, content)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let mut artifacts = self.artifacts.write().map_err(|_| ContainerError::LockPoisoned)?;
        Ok(artifacts.remove(name).is_some())
    }

    fn writeable(&self) -> bool {
        !self.read_only
    }
}

/// Serialize an artifact for storage
pub fn encode_artifact(artifact: &CompiledContainer) -> Result<String> {
    serde_json::to_string(artifact).map_err(|e| {
        ContainerError::InvalidArtifact {
            name: cache_name(&artifact.environment),
            message: e.to_string(),
        }
        .into()
    })
}

/// Parse stored artifact content
pub fn decode_artifact(name: &str, content: &str) -> Result<CompiledContainer> {
    serde_json::from_str(content).map_err(|e| {
        ContainerError::InvalidArtifact {
            name: name.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}
