use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::kernel::error::{Error, Result};
use crate::storage::StorageProvider;
use crate::storage::error::StorageSystemError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yml, .yaml)
    Yaml,
    /// TOML format (.toml)
    Toml,
}

impl ConfigFormat {
    /// Extensions tried, in order, when looking a configuration object up by name
    pub const LOOKUP_ORDER: [ConfigFormat; 3] = [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml];

    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yml",
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// In-memory representation of one configuration object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(flatten)]
    values: HashMap<String, serde_json::Value>,
}

impl ConfigData {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self { values: HashMap::new() }
    }

    /// Create a configuration from a HashMap
    pub fn from_hashmap(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    /// Get a top-level configuration value
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get a value by dotted path, e.g. `cache.page.use_internal`
    pub fn get_nested<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Option<T> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.values.get(first)?;
        for part in parts {
            current = current.get(part)?;
        }
        serde_json::from_value(current.clone()).ok()
    }

    /// Get a configuration value with default
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Set a configuration value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| StorageSystemError::serialization("json", e))?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Check if key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        let serialized = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&self)
                .map_err(|e| StorageSystemError::serialization("json", e)),
            ConfigFormat::Yaml => serde_yaml::to_string(&self)
                .map_err(|e| StorageSystemError::serialization("yaml", e)),
            ConfigFormat::Toml => toml::to_string_pretty(&self)
                .map_err(|e| StorageSystemError::serialization("toml", e)),
        };
        Ok(serialized?)
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let parsed = match format {
            ConfigFormat::Json => serde_json::from_str(data)
                .map_err(|e| StorageSystemError::deserialization("json", e)),
            ConfigFormat::Yaml => serde_yaml::from_str::<Option<ConfigData>>(data)
                .map(Option::unwrap_or_default)
                .map_err(|e| StorageSystemError::deserialization("yaml", e)),
            ConfigFormat::Toml => toml::from_str(data)
                .map_err(|e| StorageSystemError::deserialization("toml", e)),
        };
        Ok(parsed?)
    }
}

/// Read access to the active configuration, keyed by object name (`core.extension`)
pub trait ConfigStorage: Send + Sync + Debug {
    /// Read a configuration object, `None` when it does not exist
    fn read(&self, name: &str) -> Result<Option<ConfigData>>;

    /// Write a configuration object
    fn write(&self, name: &str, data: &ConfigData) -> Result<()>;

    /// Whether a configuration object exists
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.read(name)?.is_some())
    }
}

/// Configuration storage backed by a directory of files
#[derive(Debug, Clone)]
pub struct FileConfigStorage<P: StorageProvider + ?Sized> {
    provider: Arc<P>,
    directory: PathBuf,
    default_format: ConfigFormat,
}

impl<P: StorageProvider + ?Sized> FileConfigStorage<P> {
    pub fn new(provider: Arc<P>, directory: PathBuf) -> Self {
        Self {
            provider,
            directory,
            default_format: ConfigFormat::Yaml,
        }
    }

    /// Directory holding the configuration files, relative to the provider root
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn existing_path(&self, name: &str) -> Option<PathBuf> {
        ConfigFormat::LOOKUP_ORDER
            .iter()
            .map(|format| self.directory.join(format!("{}.{}", name, format.extension())))
            .find(|path| self.provider.is_file(path))
    }
}

impl<P: StorageProvider + ?Sized> ConfigStorage for FileConfigStorage<P> {
    fn read(&self, name: &str) -> Result<Option<ConfigData>> {
        let Some(path) = self.existing_path(name) else {
            return Ok(None);
        };
        let format = ConfigFormat::from_path(&path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let content = self.provider.read_to_string(&path)?;
        ConfigData::deserialize(&content, format).map(Some)
    }

    fn write(&self, name: &str, data: &ConfigData) -> Result<()> {
        let path = self
            .existing_path(name)
            .unwrap_or_else(|| self.directory.join(format!("{}.{}", name, self.default_format.extension())));
        let format = ConfigFormat::from_path(&path).unwrap_or(self.default_format);
        let content = data.serialize(format)?;
        self.provider.write_string(&path, &content)
    }
}

/// Storage used before any configuration directory exists (e.g. during install)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConfigStorage;

impl ConfigStorage for NullConfigStorage {
    fn read(&self, _name: &str) -> Result<Option<ConfigData>> {
        Ok(None)
    }

    fn write(&self, name: &str, _data: &ConfigData) -> Result<()> {
        Err(StorageSystemError::ReadOnly(PathBuf::from(name)).into())
    }
}

/// Process-local configuration storage
#[derive(Debug, Default)]
pub struct MemoryConfigStorage {
    objects: RwLock<HashMap<String, ConfigData>>,
}

impl MemoryConfigStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStorage for MemoryConfigStorage {
    fn read(&self, name: &str) -> Result<Option<ConfigData>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| Error::Other("configuration storage lock poisoned".to_string()))?;
        Ok(objects.get(name).cloned())
    }

    fn write(&self, name: &str, data: &ConfigData) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| Error::Other("configuration storage lock poisoned".to_string()))?;
        objects.insert(name.to_string(), data.clone());
        Ok(())
    }
}

/// Container-storable handle around a [`ConfigStorage`], the `config.storage` service
#[derive(Debug, Clone)]
pub struct ConfigStorageHandle(pub Arc<dyn ConfigStorage>);
