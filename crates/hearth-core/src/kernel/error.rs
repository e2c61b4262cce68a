//! # Hearth Kernel Errors
//!
//! Defines the aggregate [`Error`] type of `hearth-core`.
//!
//! Each subsystem owns a typed error enum (storage, container, extension);
//! they convert into [`Error`] through `#[from]`, so `?` works across
//! subsystem boundaries. [`Error::InvalidHost`] is the bad-request boundary
//! raised before the kernel mutates any state.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::container::error::ContainerError;
use crate::extension::error::ExtensionError;
use crate::storage::error::StorageSystemError;

/// Error type for the hearth kernel and its subsystems
#[derive(Debug, ThisError)]
pub enum Error {
    /// Module discovery and service provider errors
    #[error("Extension system error: {0}")]
    ExtensionSystem(#[from] ExtensionError),

    /// Storage & configuration file errors
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Service container errors
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// The request's host header failed validation
    #[error("Invalid host header: '{host}'")]
    InvalidHost { host: String },

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Environment")]
    Environment,
    #[error("Settings")]
    Settings,
    #[error("Container")]
    Container,
    #[error("Handle")]
    Handle,
    #[error("Terminate")]
    Terminate,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// I/O failure with the operation and path that caused it
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        })
    }

    /// Lifecycle failure wrapping the underlying cause
    pub fn lifecycle(phase: KernelLifecyclePhase, message: impl Into<String>, source: Option<Error>) -> Self {
        Error::KernelLifecycleError {
            phase,
            message: message.into(),
            source: source.map(Box::new),
        }
    }
}
