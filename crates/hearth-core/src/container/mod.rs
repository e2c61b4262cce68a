//! # Hearth Service Container
//!
//! The compiled dependency graph the kernel boots into.
//!
//! - [`ContainerBuilder`] collects definitions and parameters from services
//!   files ([`YamlFileLoader`]) and service providers, computes the persist
//!   set and compiles.
//! - [`Container`] resolves services lazily through named factories held in a
//!   [`FactoryRegistry`], so a compiled graph can be written to a
//!   [`ContainerStorage`] as a [`CompiledContainer`] and rehydrated by a later
//!   process.
pub mod builder;
pub mod cache;
#[allow(clippy::module_inception)]
pub mod container;
pub mod definition;
pub mod error;
pub mod factory;
pub mod loader;

pub use builder::ContainerBuilder;
pub use cache::{ContainerStorage, FileContainerStorage, MemoryContainerStorage, cache_name};
pub use container::{CompiledContainer, Container, ContainerRef};
pub use definition::{Argument, ServiceDefinition, Tag};
pub use error::ContainerError;
pub use factory::{FactoryRegistry, ResolvedArgument, ResolvedArguments, ServiceFactory, ServiceInstance};
pub use loader::YamlFileLoader;

#[cfg(test)]
mod tests;
