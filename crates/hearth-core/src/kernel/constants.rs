/// Application name
pub const APP_NAME: &str = "hearth";

/// Kernel API version that extension `core_version_requirement`s are checked against
pub const API_VERSION: &str = "1.0.0";

/// Default environment name used by the front controller
pub const DEFAULT_ENVIRONMENT: &str = "prod";

/// Directory holding site directories and the alias file
pub const SITES_DIR: &str = "sites";

/// Fallback site directory
pub const DEFAULT_SITE_PATH: &str = "sites/default";

/// Per-site bootstrap file; its presence marks a site directory as configured
pub const SETTINGS_FILE: &str = "settings.toml";

/// Site alias file, relative to the application root
pub const SITES_ALIAS_FILE: &str = "sites/sites.toml";

/// Directory where test runs get their own site, `sites/simpletest/<id>`
pub const TEST_SITES_DIR: &str = "sites/simpletest";

/// Core services file, relative to the application root
pub const CORE_SERVICES_FILE: &str = "core/core.services.yml";

/// Extension scan roots, in override order
pub const EXTENSION_ROOTS: [&str; 3] = ["core/modules", "profiles", "modules"];

/// Installer entry point used for the install redirect
pub const INSTALL_PATH: &str = "/core/install";

/// Entry point that drops and rebuilds the compiled container
pub const REBUILD_PATH: &str = "/core/rebuild";

/// Seconds a signed rebuild link stays valid
pub const REBUILD_TOKEN_LIFETIME: u64 = 300;

/// Prefix of the compiled container cache artifact name
pub const CONTAINER_CACHE_PREFIX: &str = "service_container_";

/// Response header carrying the page cache status
pub const CACHE_STATUS_HEADER: &str = "X-Hearth-Cache";

// Service ids
pub const SERVICE_CONTAINER: &str = "service_container";
pub const SERVICE_KERNEL: &str = "kernel";
pub const SERVICE_CLASS_LOADER: &str = "class_loader";
pub const SERVICE_SETTINGS: &str = "settings";
pub const SERVICE_CONFIG_STORAGE: &str = "config.storage";
pub const SERVICE_HTTP_KERNEL: &str = "http_kernel";
pub const SERVICE_PAGE_CACHE: &str = "cache.page";

// Parameter names
pub const PARAM_ENVIRONMENT: &str = "kernel.environment";
pub const PARAM_MODULES: &str = "container.modules";
pub const PARAM_NAMESPACES: &str = "container.namespaces";
pub const PARAM_SERVICE_PROVIDERS: &str = "container.service_providers";
pub const PARAM_SITE_PATH: &str = "site.path";
pub const PARAM_APP_ROOT: &str = "app.root";
pub const PARAM_PERSIST_IDS: &str = "persist_ids";

/// Tag marking a service whose live instance survives container rebuilds
pub const TAG_PERSIST: &str = "persist";

/// Configuration keys read from the active config storage
pub const CONFIG_EXTENSION: &str = "core.extension";
pub const CONFIG_PERFORMANCE: &str = "system.performance";
pub const CONFIG_FILTER: &str = "system.filter";
pub const CONFIG_SITE: &str = "system.site";
