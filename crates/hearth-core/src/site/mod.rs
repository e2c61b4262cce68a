//! # Hearth Sites
//!
//! Per-site bootstrap: resolving which `sites/<dir>` serves a request and
//! reading that directory's `settings.toml` into [`Settings`] plus the
//! database, base URL and config directory values that sit next to it.
pub mod settings;
pub mod site_path;

pub use settings::{Settings, SiteBootstrap};
pub use site_path::{SitePathResolver, test_run_id, test_site_path};
