use std::any::{Any, type_name};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::container::definition::{Argument, ServiceDefinition};
use crate::container::error::ContainerError;
use crate::container::factory::{FactoryRegistry, ResolvedArgument, ResolvedArguments, ServiceInstance};
use crate::kernel::constants;
use crate::kernel::error::Result;

/// Non-owning handle to a container, registered as `service_container`
#[derive(Debug, Clone)]
pub struct ContainerRef(Weak<Container>);

impl ContainerRef {
    pub fn upgrade(&self) -> Option<Arc<Container>> {
        self.0.upgrade()
    }
}

/// Serializable form of a compiled container, written to the container cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledContainer {
    pub format_version: u32,
    pub environment: String,
    pub definitions: BTreeMap<String, ServiceDefinition>,
    pub parameters: BTreeMap<String, Value>,
}

impl CompiledContainer {
    pub const FORMAT_VERSION: u32 = 1;
}

/// The compiled dependency graph.
///
/// Definitions and parameters are frozen at compile time; instances are
/// created lazily on first [`Container::get`] and shared afterwards.
pub struct Container {
    definitions: BTreeMap<String, ServiceDefinition>,
    parameters: BTreeMap<String, Value>,
    factories: Arc<FactoryRegistry>,
    instances: RwLock<HashMap<String, ServiceInstance>>,
}

impl Container {
    pub(crate) fn new(
        definitions: BTreeMap<String, ServiceDefinition>,
        parameters: BTreeMap<String, Value>,
        factories: Arc<FactoryRegistry>,
        instances: HashMap<String, ServiceInstance>,
    ) -> Result<Arc<Self>> {
        validate(&definitions, &parameters, &factories)?;
        Ok(Arc::new_cyclic(|weak: &Weak<Container>| {
            let mut instances = instances;
            instances.insert(
                constants::SERVICE_CONTAINER.to_string(),
                Arc::new(ContainerRef(weak.clone())) as ServiceInstance,
            );
            Container {
                definitions,
                parameters,
                factories,
                instances: RwLock::new(instances),
            }
        }))
    }

    /// Rehydrate a container from a cache artifact. Fails when the artifact
    /// references factories this process does not know about.
    pub fn from_artifact(artifact: CompiledContainer, factories: Arc<FactoryRegistry>) -> Result<Arc<Self>> {
        if artifact.format_version != CompiledContainer::FORMAT_VERSION {
            return Err(ContainerError::InvalidArtifact {
                name: artifact.environment,
                message: format!("unsupported format version {}", artifact.format_version),
            }
            .into());
        }
        Self::new(artifact.definitions, artifact.parameters, factories, HashMap::new())
    }

    /// Snapshot of the definitions and parameters for the container cache
    pub fn to_artifact(&self, environment: &str) -> CompiledContainer {
        CompiledContainer {
            format_version: CompiledContainer::FORMAT_VERSION,
            environment: environment.to_string(),
            definitions: self.definitions.clone(),
            parameters: self.parameters.clone(),
        }
    }

    /// Get (and construct on first use) a service instance
    pub fn get(&self, id: &str) -> Result<ServiceInstance> {
        if let Some(instance) = self.instance(id)? {
            return Ok(instance);
        }
        let definition = self
            .definitions
            .get(id)
            .ok_or_else(|| ContainerError::ServiceNotFound { id: id.to_string() })?;
        if definition.synthetic {
            return Err(ContainerError::SyntheticNotSet { id: id.to_string() }.into());
        }
        let factory_name = definition
            .factory
            .as_deref()
            .ok_or_else(|| ContainerError::MissingFactory { id: id.to_string() })?;
        let factory = self.factories.get(factory_name).ok_or_else(|| ContainerError::FactoryNotFound {
            id: id.to_string(),
            factory: factory_name.to_string(),
        })?;

        let mut resolved = Vec::with_capacity(definition.arguments.len());
        for argument in &definition.arguments {
            resolved.push(match argument {
                Argument::Service(reference) => ResolvedArgument::Service {
                    id: reference.clone(),
                    instance: self.get(reference)?,
                },
                Argument::Parameter(name) => ResolvedArgument::Value(self.require_parameter(name)?.clone()),
                Argument::Value(value) => ResolvedArgument::Value(value.clone()),
            });
        }

        log::debug!("Instantiating service '{}' via factory '{}'", id, factory_name);
        let instance = factory(&ResolvedArguments::new(id, resolved))?;
        let mut instances = self.instances.write().map_err(|_| ContainerError::LockPoisoned)?;
        Ok(instances.entry(id.to_string()).or_insert(instance).clone())
    }

    /// Get a service downcast to its concrete type
    pub fn get_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        self.get(id)?.downcast::<T>().map_err(|_| {
            ContainerError::TypeMismatch {
                id: id.to_string(),
                expected: type_name::<T>(),
            }
            .into()
        })
    }

    /// Inject an instance, typically for a synthetic service
    pub fn set(&self, id: &str, instance: ServiceInstance) -> Result<()> {
        let mut instances = self.instances.write().map_err(|_| ContainerError::LockPoisoned)?;
        instances.insert(id.to_string(), instance);
        Ok(())
    }

    /// Whether an instance for `id` already exists
    pub fn initialized(&self, id: &str) -> bool {
        self.instance(id).ok().flatten().is_some()
    }

    /// Whether `id` is defined or has an instance
    pub fn has(&self, id: &str) -> bool {
        self.definitions.contains_key(id) || self.initialized(id)
    }

    pub fn definition(&self, id: &str) -> Option<&ServiceDefinition> {
        self.definitions.get(id)
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Ids of services carrying `tag`, in id order
    pub fn tagged(&self, tag: &str) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|(_, definition)| definition.has_tag(tag))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn parameter_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.parameters
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    fn require_parameter(&self, name: &str) -> Result<&Value> {
        self.parameters
            .get(name)
            .ok_or_else(|| ContainerError::ParameterNotFound { name: name.to_string() }.into())
    }

    /// Service ids whose live instances must be carried into a rebuilt container
    pub fn persist_ids(&self) -> Vec<String> {
        self.parameter_as(constants::PARAM_PERSIST_IDS).unwrap_or_default()
    }

    fn instance(&self, id: &str) -> Result<Option<ServiceInstance>> {
        let instances = self.instances.read().map_err(|_| ContainerError::LockPoisoned)?;
        Ok(instances.get(id).cloned())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let initialized = self.instances.read().map(|i| i.len()).unwrap_or(0);
        f.debug_struct("Container")
            .field("services", &self.definitions.len())
            .field("parameters", &self.parameters.len())
            .field("initialized", &initialized)
            .finish()
    }
}

/// Check that every definition can be resolved: factories exist, references
/// and parameters point somewhere, and no service depends on itself.
pub(crate) fn validate(
    definitions: &BTreeMap<String, ServiceDefinition>,
    parameters: &BTreeMap<String, Value>,
    factories: &FactoryRegistry,
) -> Result<()> {
    for (id, definition) in definitions {
        if !definition.synthetic {
            match definition.factory.as_deref() {
                Some(factory) if factories.contains(factory) => {}
                Some(factory) => {
                    return Err(ContainerError::FactoryNotFound {
                        id: id.clone(),
                        factory: factory.to_string(),
                    }
                    .into());
                }
                None => return Err(ContainerError::MissingFactory { id: id.clone() }.into()),
            }
        }
        for argument in &definition.arguments {
            match argument {
                Argument::Service(reference) if !definitions.contains_key(reference) => {
                    return Err(ContainerError::InvalidReference {
                        id: id.clone(),
                        reference: reference.clone(),
                    }
                    .into());
                }
                Argument::Parameter(name) if !parameters.contains_key(name) => {
                    return Err(ContainerError::ParameterNotFound { name: name.clone() }.into());
                }
                _ => {}
            }
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        id: &'a str,
        definitions: &'a BTreeMap<String, ServiceDefinition>,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> std::result::Result<(), ContainerError> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let mut cycle: Vec<String> = path.iter().map(|s| s.to_string()).collect();
                cycle.push(id.to_string());
                return Err(ContainerError::CircularReference {
                    id: id.to_string(),
                    path: cycle,
                });
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        path.push(id);
        if let Some(definition) = definitions.get(id) {
            for reference in definition.service_references() {
                visit(reference, definitions, marks, path)?;
            }
        }
        path.pop();
        marks.insert(id, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for id in definitions.keys() {
        let mut path = Vec::new();
        visit(id, definitions, &mut marks, &mut path)?;
    }
    Ok(())
}
