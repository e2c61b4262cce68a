//! # Hearth Extension System
//!
//! Turns the enabled-module list into what the container builder consumes.
//!
//! - [`ModuleList`]: enabled modules in load order, read from `core.extension`.
//! - [`ExtensionDiscovery`]: finds `<name>.info.yml` files on disk.
//! - [`ServiceProvider`]: code that registers or alters service definitions;
//!   providers are instantiated from a [`ProviderCatalog`] by class name.
//! - [`ServiceProviderRegistry`]: the `app` and `site` partitions of
//!   providers and services files, applied in that order.
//! - [`NamespaceRegistry`]: the class loader mapping module namespaces to
//!   source directories.
pub mod catalog;
pub mod core_provider;
pub mod discovery;
pub mod error;
pub mod module_list;
pub mod namespace;
pub mod provider;

pub use catalog::{ProviderCatalog, ProviderConstructor, provider_class_name};
pub use core_provider::CoreServiceProvider;
pub use discovery::{Extension, ExtensionDiscovery, ExtensionInfo, ExtensionType};
pub use error::ExtensionError;
pub use module_list::ModuleList;
pub use namespace::NamespaceRegistry;
pub use provider::{ProviderOrigin, ProviderPartition, ServiceProvider, ServiceProviderRegistry};
