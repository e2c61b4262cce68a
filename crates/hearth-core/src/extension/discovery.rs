use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::extension::error::ExtensionError;
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::StorageProvider;

const INFO_SUFFIX: &str = ".info.yml";
const SERVICES_SUFFIX: &str = ".services.yml";
const SKIPPED_DIRS: [&str; 3] = ["tests", "node_modules", "vendor"];

/// Kind of extension declared by an info file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionType {
    #[default]
    Module,
    Profile,
}

/// Contents of a `<name>.info.yml` file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtensionInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: ExtensionType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub core_version_requirement: Option<String>,
}

/// A module or profile found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Machine name, taken from the info file name
    pub name: String,
    pub kind: ExtensionType,
    /// Info file, relative to the application root
    pub pathname: PathBuf,
}

impl Extension {
    /// An extension located by its info file path
    pub fn from_info_path(name: impl Into<String>, pathname: PathBuf) -> Self {
        Self {
            name: name.into(),
            kind: ExtensionType::Module,
            pathname,
        }
    }

    /// Directory holding the info file
    pub fn path(&self) -> PathBuf {
        self.pathname.parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// File name of the info file
    pub fn filename(&self) -> String {
        self.pathname
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `<dir>/<name>.services.yml`, whether or not it exists
    pub fn services_file(&self) -> PathBuf {
        self.path().join(format!("{}{}", self.name, SERVICES_SUFFIX))
    }

    /// Root of the extension's code namespace
    pub fn source_dir(&self) -> PathBuf {
        self.path().join("src")
    }
}

/// Scans the extension roots of an application for info files
#[derive(Debug)]
pub struct ExtensionDiscovery<'a> {
    provider: &'a dyn StorageProvider,
    site_path: Option<PathBuf>,
    api_version: Version,
}

impl<'a> ExtensionDiscovery<'a> {
    pub fn new(provider: &'a dyn StorageProvider, site_path: Option<PathBuf>) -> Result<Self> {
        let api_version = Version::parse(constants::API_VERSION).map_err(|e| ExtensionError::InvalidInfoFile {
            path: PathBuf::from(constants::API_VERSION),
            message: format!("kernel API version does not parse: {}", e),
        })?;
        Ok(Self {
            provider,
            site_path,
            api_version,
        })
    }

    /// Override the API version info files are checked against
    pub fn with_api_version(mut self, version: Version) -> Self {
        self.api_version = version;
        self
    }

    /// All compatible extensions keyed by name. Roots are scanned in order
    /// `core/modules`, `profiles`, `modules`, `<site>/modules`; an extension
    /// found in a later root replaces an earlier one of the same name.
    pub fn scan(&self) -> Result<IndexMap<String, Extension>> {
        let mut roots: Vec<PathBuf> = constants::EXTENSION_ROOTS.iter().map(PathBuf::from).collect();
        if let Some(site_path) = &self.site_path {
            roots.push(site_path.join("modules"));
        }

        let mut found: IndexMap<String, Extension> = IndexMap::new();
        for root in roots {
            if !self.provider.is_dir(&root) {
                continue;
            }
            let mut info_files = Vec::new();
            self.collect_info_files(&root, &mut info_files)?;
            for pathname in info_files {
                if let Some(extension) = self.load(&pathname)? {
                    if let Some(previous) = found.get(&extension.name) {
                        log::debug!(
                            "Extension '{}' at {} overrides {}",
                            extension.name,
                            extension.pathname.display(),
                            previous.pathname.display()
                        );
                    }
                    found.insert(extension.name.clone(), extension);
                }
            }
        }
        log::debug!("Discovered {} extensions", found.len());
        Ok(found)
    }

    /// Parse one info file. Incompatible extensions are skipped with a warning.
    pub fn load(&self, pathname: &Path) -> Result<Option<Extension>> {
        let file_name = pathname
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(name) = file_name.strip_suffix(INFO_SUFFIX) else {
            return Err(ExtensionError::InvalidInfoFile {
                path: pathname.to_path_buf(),
                message: format!("info files must end in '{}'", INFO_SUFFIX),
            }
            .into());
        };

        let contents = self.provider.read_to_string(pathname)?;
        let info: ExtensionInfo = if contents.trim().is_empty() {
            ExtensionInfo::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ExtensionError::InvalidInfoFile {
                path: pathname.to_path_buf(),
                message: e.to_string(),
            })?
        };

        if let Some(requirement) = &info.core_version_requirement {
            match VersionReq::parse(requirement) {
                Ok(req) if req.matches(&self.api_version) => {}
                Ok(_) => {
                    log::warn!(
                        "Skipping extension '{}': requires core {}, running {}",
                        name,
                        requirement,
                        self.api_version
                    );
                    return Ok(None);
                }
                Err(e) => {
                    return Err(ExtensionError::InvalidInfoFile {
                        path: pathname.to_path_buf(),
                        message: format!("core_version_requirement '{}': {}", requirement, e),
                    }
                    .into());
                }
            }
        }

        Ok(Some(Extension {
            name: name.to_string(),
            kind: info.kind,
            pathname: pathname.to_path_buf(),
        }))
    }

    fn collect_info_files(&self, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in self.provider.read_dir(dir)? {
            let skipped = entry
                .file_name()
                .map(|name| SKIPPED_DIRS.iter().any(|skip| name == *skip))
                .unwrap_or(false);
            if self.provider.is_dir(&entry) {
                if !skipped {
                    self.collect_info_files(&entry, out)?;
                }
            } else if entry.to_string_lossy().ends_with(INFO_SUFFIX) {
                out.push(entry);
            }
        }
        Ok(())
    }
}
