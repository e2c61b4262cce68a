use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::storage::{StorageProvider, StorageSystemError};

/// Read-only site settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Typed lookup; `None` when absent or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.values
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Typed lookup with a fallback. Never fails.
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        self.get_as(name).unwrap_or(default)
    }

    /// Truthiness of a flag setting
    pub fn is_enabled(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty() && s != "0",
            _ => false,
        }
    }

    /// All values; meant for tests and diagnostics
    pub fn get_all(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The site's hash salt
    pub fn hash_salt(&self) -> Result<String> {
        match self.get_as::<String>("hash_salt") {
            Some(salt) if !salt.is_empty() => Ok(salt),
            _ => Err(Error::Other(
                "Missing 'hash_salt' in the [settings] table of settings.toml".to_string(),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    settings: Map<String, Value>,
    #[serde(default)]
    databases: BTreeMap<String, Value>,
    base_url: Option<String>,
    cookie_domain: Option<String>,
    #[serde(default)]
    config_directories: BTreeMap<String, PathBuf>,
}

/// Everything a site's `settings.toml` defines
#[derive(Debug, Clone, Default)]
pub struct SiteBootstrap {
    pub site_path: PathBuf,
    pub settings: Settings,
    /// Database connection info; empty means the site is not installed
    pub databases: BTreeMap<String, Value>,
    pub base_url: Option<String>,
    pub cookie_domain: Option<String>,
    pub config_directories: BTreeMap<String, PathBuf>,
    /// Whether the bootstrap file existed
    pub loaded: bool,
}

impl SiteBootstrap {
    /// Read `<site_path>/settings.toml`. A missing file yields empty settings
    /// rather than an error.
    pub fn load(provider: &dyn StorageProvider, site_path: &Path) -> Result<Self> {
        let path = site_path.join(constants::SETTINGS_FILE);
        if !provider.is_file(&path) {
            log::debug!("No settings file at {}, using empty settings", path.display());
            return Ok(Self {
                site_path: site_path.to_path_buf(),
                ..Self::default()
            });
        }
        let contents = provider.read_to_string(&path)?;
        let file: SettingsFile =
            toml::from_str(&contents).map_err(|e| StorageSystemError::deserialization("toml", e))?;
        log::debug!("Loaded {} settings from {}", file.settings.len(), path.display());
        Ok(Self {
            site_path: site_path.to_path_buf(),
            settings: Settings::new(file.settings),
            databases: file.databases,
            base_url: file.base_url,
            cookie_domain: file.cookie_domain,
            config_directories: file.config_directories,
            loaded: true,
        })
    }

    pub fn has_database(&self) -> bool {
        !self.databases.is_empty()
    }

    /// Active configuration directory, relative to the application root
    pub fn active_config_directory(&self) -> Option<&Path> {
        self.config_directories.get("active").map(PathBuf::as_path)
    }
}
