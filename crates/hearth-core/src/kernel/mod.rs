//! # Hearth Kernel
//!
//! The `kernel` module is the heart of `hearth-core`. It takes a process
//! from nothing initialized to a booted service container serving a request.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Process context**: [`BootContext`](context::BootContext) holds the
//!   state that may only be set up once per process (environment hardening,
//!   site settings, request globals, the memoized site path).
//! - **Kernel lifecycle**: [`Kernel`](bootstrap::Kernel) moves through
//!   [`BootPhase`](bootstrap::BootPhase)s, loads or rebuilds the container,
//!   carries persisted services across rebuilds and dispatches requests.
//! - **Rebuild access**: signed, short-lived links to the rebuild entry
//!   point in the `rebuild` submodule.
//! - **Core Constants**: service ids, parameter names and well-known paths
//!   in the `constants` submodule.
//! - **Error Handling**: the aggregate [`Error`](error::Error) and `Result`
//!   alias in the `error` submodule.
pub mod bootstrap;
pub mod constants;
pub mod context;
pub mod error;
pub mod rebuild;

pub use bootstrap::{BootPhase, BootStatus, Kernel, KernelInfo, KernelOptions, PageCacheOutcome};
pub use context::BootContext;
pub use error::{Error, Result};
