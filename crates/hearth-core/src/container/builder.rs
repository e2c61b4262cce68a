use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::container::container::Container;
use crate::container::definition::ServiceDefinition;
use crate::container::error::ContainerError;
use crate::container::factory::{FactoryRegistry, ServiceInstance};
use crate::kernel::constants;
use crate::kernel::error::Result;

/// Mutable container definition assembled by service providers and
/// definition files before compilation.
///
/// Registration order decides precedence: registering an id twice keeps the
/// last definition.
#[derive(Default)]
pub struct ContainerBuilder {
    definitions: BTreeMap<String, ServiceDefinition>,
    parameters: BTreeMap<String, Value>,
    instances: HashMap<String, ServiceInstance>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a service definition
    pub fn register(&mut self, id: impl Into<String>, definition: ServiceDefinition) -> &mut ServiceDefinition {
        match self.definitions.entry(id.into()) {
            Entry::Occupied(mut entry) => {
                log::debug!(
                    "Service '{}' redefined (was from {:?}, now from {:?})",
                    entry.key(),
                    entry.get().origin,
                    definition.origin
                );
                entry.insert(definition);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(definition),
        }
    }

    pub fn has_definition(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn definition(&self, id: &str) -> Option<&ServiceDefinition> {
        self.definitions.get(id)
    }

    pub fn definition_mut(&mut self, id: &str) -> Option<&mut ServiceDefinition> {
        self.definitions.get_mut(id)
    }

    pub fn remove_definition(&mut self, id: &str) -> Option<ServiceDefinition> {
        self.definitions.remove(id)
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.parameters.insert(name.into(), value);
    }

    /// Serialize `value` into a parameter
    pub fn set_parameter_from<T: Serialize>(&mut self, name: impl Into<String>, value: &T) -> Result<()> {
        let name = name.into();
        let value = serde_json::to_value(value).map_err(|e| ContainerError::InvalidArgument {
            id: name.clone(),
            index: 0,
            message: e.to_string(),
        })?;
        self.parameters.insert(name, value);
        Ok(())
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Provide a ready instance that the compiled container starts with
    pub fn set(&mut self, id: impl Into<String>, instance: ServiceInstance) {
        self.instances.insert(id.into(), instance);
    }

    /// Synthetic services plus everything tagged `persist`
    pub fn persist_ids(&self) -> Vec<String> {
        let ids: BTreeSet<&String> = self
            .definitions
            .iter()
            .filter(|(_, definition)| definition.synthetic || definition.has_tag(constants::TAG_PERSIST))
            .map(|(id, _)| id)
            .collect();
        ids.into_iter().cloned().collect()
    }

    /// Record the persist set as a parameter, validate the graph and freeze it
    pub fn compile(mut self, factories: Arc<FactoryRegistry>) -> Result<Arc<Container>> {
        let persist = self.persist_ids();
        self.parameters
            .insert(constants::PARAM_PERSIST_IDS.to_string(), Value::from(persist));
        log::debug!(
            "Compiling container with {} services and {} parameters",
            self.definitions.len(),
            self.parameters.len()
        );
        Container::new(self.definitions, self.parameters, factories, self.instances)
    }
}

impl std::fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .field("parameters", &self.parameters.keys().collect::<Vec<_>>())
            .field("instances", &self.instances.keys().collect::<Vec<_>>())
            .finish()
    }
}
