//! # Hearth Sessions
//!
//! Session cookie rules shared by the kernel (page cache eligibility) and
//! the application (the `session.helper` service).
pub mod helper;

pub use helper::{ExpiredCookie, SessionHelper, has_session_cookie};
