use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::container::error::ContainerError;
use crate::kernel::error::Result;

/// A live service object
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Builds a service instance from its resolved arguments
pub type ServiceFactory = Arc<dyn Fn(&ResolvedArguments) -> Result<ServiceInstance> + Send + Sync>;

/// An argument after references have been replaced by what they point at
#[derive(Clone)]
pub enum ResolvedArgument {
    Service { id: String, instance: ServiceInstance },
    Value(Value),
}

impl fmt::Debug for ResolvedArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedArgument::Service { id, .. } => f.debug_tuple("Service").field(id).finish(),
            ResolvedArgument::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Arguments handed to a [`ServiceFactory`]
#[derive(Debug, Clone)]
pub struct ResolvedArguments {
    service_id: String,
    arguments: Vec<ResolvedArgument>,
}

impl ResolvedArguments {
    pub fn new(service_id: impl Into<String>, arguments: Vec<ResolvedArgument>) -> Self {
        Self {
            service_id: service_id.into(),
            arguments,
        }
    }

    /// Id of the service being constructed
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    fn invalid(&self, index: usize, message: impl Into<String>) -> ContainerError {
        ContainerError::InvalidArgument {
            id: self.service_id.clone(),
            index,
            message: message.into(),
        }
    }

    /// The service passed at `index`, downcast to `T`
    pub fn service<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        match self.arguments.get(index) {
            Some(ResolvedArgument::Service { id, instance }) => {
                instance.clone().downcast::<T>().map_err(|_| {
                    ContainerError::TypeMismatch {
                        id: id.clone(),
                        expected: type_name::<T>(),
                    }
                    .into()
                })
            }
            Some(ResolvedArgument::Value(_)) => Err(self.invalid(index, "expected a service reference").into()),
            None => Err(self.invalid(index, "missing argument").into()),
        }
    }

    /// The literal or parameter value passed at `index`
    pub fn value<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        match self.arguments.get(index) {
            Some(ResolvedArgument::Value(value)) => serde_json::from_value(value.clone())
                .map_err(|e| self.invalid(index, e.to_string()).into()),
            Some(ResolvedArgument::Service { .. }) => Err(self.invalid(index, "expected a value").into()),
            None => Err(self.invalid(index, "missing argument").into()),
        }
    }
}

/// Lookup table from factory names used in definitions to constructors
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: BTreeMap<String, ServiceFactory>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; a later registration under the same name replaces
    /// the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ResolvedArguments) -> Result<ServiceInstance> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn get(&self, name: &str) -> Option<ServiceFactory> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
