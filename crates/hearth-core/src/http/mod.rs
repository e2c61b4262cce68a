//! # Hearth HTTP Boundary
//!
//! The request and response records the kernel works with, host validation,
//! the request-derived globals (base URL, cookie domain, session name), the
//! URL scheme policy and the [`HttpKernel`] trait the application implements
//! to actually answer requests.
pub mod globals;
pub mod kernel;
pub mod request;
pub mod response;
pub mod url_policy;

pub use globals::RequestGlobals;
pub use kernel::{HttpKernel, HttpKernelHandle, RequestContext, Terminable};
pub use request::{Request, validate_host};
pub use response::Response;
pub use url_policy::UrlPolicy;

#[cfg(test)]
mod tests;
