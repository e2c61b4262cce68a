//! # Hearth Storage
//!
//! File access for everything the kernel persists between processes: the
//! active configuration objects and the compiled container artifacts.
//! [`StorageProvider`] abstracts the filesystem, [`LocalStorageProvider`]
//! implements it with atomic replace-on-write, and the `config` submodule
//! layers named configuration objects in JSON, YAML or TOML on top.
pub mod config;
pub mod error;
pub mod local;
pub mod provider;

pub use config::{ConfigData, ConfigFormat, ConfigStorage, ConfigStorageHandle, FileConfigStorage, MemoryConfigStorage, NullConfigStorage};
pub use error::StorageSystemError;
pub use local::LocalStorageProvider;
pub use provider::StorageProvider;
