//! # Hearth Container Errors
//!
//! Failures raised while assembling, compiling, resolving or (de)serializing
//! the service container.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("You have requested a non-existent service \"{id}\"")]
    ServiceNotFound { id: String },

    #[error("Service \"{id}\" is synthetic and has not been set on the container")]
    SyntheticNotSet { id: String },

    #[error("Service \"{id}\" uses factory \"{factory}\" which is not registered")]
    FactoryNotFound { id: String, factory: String },

    #[error("Service \"{id}\" has no factory and is not synthetic")]
    MissingFactory { id: String },

    #[error("Service \"{id}\" references non-existent service \"{reference}\"")]
    InvalidReference { id: String, reference: String },

    #[error("You have requested a non-existent parameter \"{name}\"")]
    ParameterNotFound { name: String },

    #[error("Circular reference detected for service \"{id}\", path: \"{}\"", path.join(" -> "))]
    CircularReference { id: String, path: Vec<String> },

    #[error("Service \"{id}\" is not of the requested type {expected}")]
    TypeMismatch { id: String, expected: &'static str },

    #[error("Argument {index} of service \"{id}\": {message}")]
    InvalidArgument { id: String, index: usize, message: String },

    #[error("Invalid service definition file '{path}': {message}")]
    InvalidDefinitionFile { path: PathBuf, message: String },

    #[error("Compiled container artifact '{name}' is unusable: {message}")]
    InvalidArtifact { name: String, message: String },

    #[error("Container state lock poisoned")]
    LockPoisoned,
}
