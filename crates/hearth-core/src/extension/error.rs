//! # Hearth Extension Errors
//!
//! Failures raised while discovering modules and collecting service providers.
use std::path::PathBuf;

use crate::kernel::error::Error;

#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("Service provider '{name}' is registered twice in the '{origin}' partition")]
    DuplicateProvider { origin: String, name: String },

    #[error("Site service provider '{name}' names unknown provider class '{class}'")]
    UnknownProviderClass { name: String, class: String },

    #[error("Unknown service provider origin '{0}', expected 'app' or 'site'")]
    UnknownOrigin(String),

    #[error("Service provider '{provider}' failed during {operation}: {source}")]
    ProviderFailed {
        provider: String,
        operation: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid extension info file '{path}': {message}")]
    InvalidInfoFile { path: PathBuf, message: String },

    #[error("Invalid module list in configuration '{key}': {message}")]
    InvalidModuleList { key: String, message: String },
}
