pub mod container;
pub mod extension;
pub mod http;
pub mod kernel;
pub mod page_cache;
pub mod session;
pub mod site;
pub mod storage;

// Re-export key public types for the binary and applications built on the kernel
pub use container::{Container, ContainerBuilder, ServiceDefinition};
pub use extension::{ModuleList, ProviderCatalog, ServiceProvider};
pub use http::{HttpKernel, Request, RequestContext, Response, Terminable};
pub use kernel::error::Error as KernelError;
pub use kernel::{BootContext, BootStatus, Kernel, KernelOptions, PageCacheOutcome};
pub use site::Settings;
pub use storage::StorageProvider;

#[cfg(test)]
mod tests;
