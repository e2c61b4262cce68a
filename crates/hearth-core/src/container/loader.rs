use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::container::builder::ContainerBuilder;
use crate::container::definition::{Argument, ServiceDefinition, Tag};
use crate::container::error::ContainerError;
use crate::kernel::error::Result;
use crate::storage::StorageProvider;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServicesFile {
    #[serde(default)]
    parameters: BTreeMap<String, Value>,
    #[serde(default)]
    services: BTreeMap<String, Option<ServiceEntry>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceEntry {
    factory: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    tags: Vec<TagEntry>,
    #[serde(default)]
    synthetic: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagEntry {
    Name(String),
    Full {
        name: String,
        #[serde(flatten)]
        attributes: BTreeMap<String, Value>,
    },
}

impl From<TagEntry> for Tag {
    fn from(entry: TagEntry) -> Self {
        match entry {
            TagEntry::Name(name) => Tag::new(name),
            TagEntry::Full { name, attributes } => Tag { name, attributes },
        }
    }
}

/// Loads `*.services.yml` definition files into a [`ContainerBuilder`]
pub struct YamlFileLoader<'a> {
    provider: &'a dyn StorageProvider,
}

impl<'a> YamlFileLoader<'a> {
    pub fn new(provider: &'a dyn StorageProvider) -> Self {
        Self { provider }
    }

    /// Parse `path` and register its parameters and services. Definitions
    /// replace earlier ones with the same id.
    pub fn load(&self, builder: &mut ContainerBuilder, path: &Path) -> Result<()> {
        let contents = self.provider.read_to_string(path)?;
        let origin = path.display().to_string();
        let file = parse(&contents).map_err(|message| ContainerError::InvalidDefinitionFile {
            path: path.to_path_buf(),
            message,
        })?;

        log::debug!(
            "Loading {} services and {} parameters from {}",
            file.services.len(),
            file.parameters.len(),
            origin
        );
        for (name, value) in file.parameters {
            builder.set_parameter(name, value);
        }
        for (id, entry) in file.services {
            let entry = entry.unwrap_or_default();
            if entry.factory.is_none() && !entry.synthetic {
                return Err(ContainerError::InvalidDefinitionFile {
                    path: path.to_path_buf(),
                    message: format!("service '{}' needs a factory or synthetic: true", id),
                }
                .into());
            }
            let definition = ServiceDefinition {
                factory: entry.factory,
                arguments: entry.arguments.into_iter().map(Argument::parse).collect(),
                tags: entry.tags.into_iter().map(Tag::from).collect(),
                synthetic: entry.synthetic,
                origin: Some(origin.clone()),
            };
            builder.register(id, definition);
        }
        Ok(())
    }
}

fn parse(contents: &str) -> std::result::Result<ServicesFile, String> {
    if contents.trim().is_empty() {
        return Ok(ServicesFile::default());
    }
    serde_yaml::from_str(contents).map_err(|e| e.to_string())
}
