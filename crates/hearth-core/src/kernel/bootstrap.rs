use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::container::cache::{decode_artifact, encode_artifact};
use crate::container::{
    Container, ContainerBuilder, ContainerStorage, FactoryRegistry, FileContainerStorage, ServiceInstance, cache_name,
};
use crate::extension::namespace::namespaces_for;
use crate::extension::{
    CoreServiceProvider, Extension, ExtensionDiscovery, ExtensionError, ModuleList, NamespaceRegistry,
    ProviderCatalog, ProviderOrigin, ServiceProvider, ServiceProviderRegistry,
};
use crate::http::{
    HttpKernel, HttpKernelHandle, Request, RequestContext, RequestGlobals, Response, UrlPolicy, validate_host,
};
use crate::kernel::constants;
use crate::kernel::context::BootContext;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::kernel::rebuild;
use crate::page_cache::{self, CacheStatus, PageCacheHandle};
use crate::session;
use crate::site::{Settings, SiteBootstrap};
use crate::storage::{ConfigStorage, ConfigStorageHandle, FileConfigStorage, NullConfigStorage};

/// Progress of a kernel through its lifecycle. Phases only move forward,
/// except that a shut down kernel may boot again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootPhase {
    Unbooted,
    EnvironmentReady,
    ConfigurationReady,
    ContainerReady,
    ShutDown,
}

/// Result of [`Kernel::boot`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootStatus {
    Booted,
    /// The site has no database configuration; send the client to the installer
    InstallRequired(Response),
}

/// Result of [`Kernel::handle_page_cache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCacheOutcome {
    /// Serve this response and stop
    Hit(Response),
    /// Not cached; continue with [`Kernel::handle`]
    Miss,
    /// Page cache not applicable to this request
    Bypassed,
}

/// What the container knows about the kernel that built it, the `kernel` service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInfo {
    pub environment: String,
    pub site_path: PathBuf,
    pub app_root: PathBuf,
}

/// Construction options of a [`Kernel`]
pub struct KernelOptions {
    pub environment: String,
    /// Load and write the compiled container cache
    pub allow_dumping: bool,
    /// Refuse requests without a test user agent
    pub test_only: bool,
    /// Skip the install redirect (installer and command line invocations)
    pub install_flow: bool,
    /// Site directories need a settings file to match
    pub require_settings: bool,
    pub catalog: ProviderCatalog,
    pub http_kernel: Arc<dyn HttpKernel>,
    /// Overrides the file-backed container cache below the site directory
    pub container_storage: Option<Arc<dyn ContainerStorage>>,
    /// Overrides the configuration storage named by `config_directories.active`
    pub config_storage: Option<Arc<dyn ConfigStorage>>,
}

impl KernelOptions {
    pub fn new(environment: impl Into<String>, http_kernel: Arc<dyn HttpKernel>) -> Self {
        Self {
            environment: environment.into(),
            allow_dumping: true,
            test_only: false,
            install_flow: false,
            require_settings: true,
            catalog: ProviderCatalog::new(),
            http_kernel,
            container_storage: None,
            config_storage: None,
        }
    }

    pub fn with_catalog(mut self, catalog: ProviderCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_dumping(mut self, allow_dumping: bool) -> Self {
        self.allow_dumping = allow_dumping;
        self
    }

    pub fn test_only(mut self, test_only: bool) -> Self {
        self.test_only = test_only;
        self
    }

    pub fn install_flow(mut self, install_flow: bool) -> Self {
        self.install_flow = install_flow;
        self
    }

    pub fn require_settings(mut self, require_settings: bool) -> Self {
        self.require_settings = require_settings;
        self
    }

    pub fn with_container_storage(mut self, storage: Arc<dyn ContainerStorage>) -> Self {
        self.container_storage = Some(storage);
        self
    }

    pub fn with_config_storage(mut self, storage: Arc<dyn ConfigStorage>) -> Self {
        self.config_storage = Some(storage);
        self
    }
}

impl fmt::Debug for KernelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelOptions")
            .field("environment", &self.environment)
            .field("allow_dumping", &self.allow_dumping)
            .field("test_only", &self.test_only)
            .field("install_flow", &self.install_flow)
            .field("require_settings", &self.require_settings)
            .field("catalog", &self.catalog)
            .finish()
    }
}

/// The request kernel: boots a site, keeps its service container current
/// and dispatches requests to the application's [`HttpKernel`].
pub struct Kernel {
    context: Arc<BootContext>,
    environment: String,
    allow_dumping: bool,
    test_only: bool,
    install_flow: bool,
    catalog: ProviderCatalog,
    factories: Arc<FactoryRegistry>,
    http_kernel: Arc<dyn HttpKernel>,

    phase: BootPhase,
    site_path: PathBuf,
    bootstrap: Arc<SiteBootstrap>,
    settings: Arc<Settings>,
    config_storage: Arc<dyn ConfigStorage>,
    container_storage: Arc<dyn ContainerStorage>,
    boot_request: Option<Request>,

    container: Option<Arc<Container>>,
    container_needs_dumping: bool,
    module_list: Option<ModuleList>,
    new_module_list: Option<ModuleList>,
    module_filenames: HashMap<String, PathBuf>,
    extension_data: Option<IndexMap<String, Extension>>,
    service_providers: Option<ServiceProviderRegistry>,
    class_loader: Arc<NamespaceRegistry>,

    request_context: Option<RequestContext>,
    pending_cache_status: Option<CacheStatus>,
    rng: StdRng,
}

impl Kernel {
    /// Kernel for an inbound request. Rejects an invalid host before
    /// touching any state, then prepares the environment, resolves the site
    /// path and loads its settings.
    pub fn from_request(context: Arc<BootContext>, request: &Request, options: KernelOptions) -> Result<Self> {
        validate_host(request.http_host())?;
        context.boot_environment();
        let site_path = context.site_path(request, options.require_settings)?;
        let mut kernel = Self::create(context, site_path, options)?;
        kernel.boot_request = Some(request.clone());
        Ok(kernel)
    }

    /// Kernel for a known site directory, for command line use
    pub fn for_site(context: Arc<BootContext>, site_path: impl Into<PathBuf>, options: KernelOptions) -> Result<Self> {
        context.boot_environment();
        let site_path = context.set_site_path(site_path)?;
        Self::create(context, site_path, options)
    }

    fn create(context: Arc<BootContext>, site_path: PathBuf, options: KernelOptions) -> Result<Self> {
        let bootstrap = context.initialize_settings(&site_path)?;
        let settings = Arc::new(bootstrap.settings.clone());

        let config_storage: Arc<dyn ConfigStorage> = match options.config_storage {
            Some(storage) => storage,
            None => match bootstrap.active_config_directory() {
                Some(directory) => Arc::new(FileConfigStorage::new(context.storage(), directory.to_path_buf())),
                None => Arc::new(NullConfigStorage),
            },
        };
        let container_storage: Arc<dyn ContainerStorage> = match options.container_storage {
            Some(storage) => storage,
            None => {
                let files_dir: PathBuf = settings
                    .get_as("file_public_path")
                    .unwrap_or_else(|| site_path.join("files"));
                Arc::new(FileContainerStorage::new(context.storage(), files_dir.join("cache")))
            }
        };

        let mut catalog = options.catalog;
        CoreServiceProvider::register_factories(catalog.factories_mut());
        let factories = Arc::new(catalog.factories().clone());

        log::info!(
            "Kernel created for site {} in environment '{}'",
            site_path.display(),
            options.environment
        );
        Ok(Self {
            context,
            environment: options.environment,
            allow_dumping: options.allow_dumping,
            test_only: options.test_only,
            install_flow: options.install_flow,
            catalog,
            factories,
            http_kernel: options.http_kernel,
            phase: BootPhase::ConfigurationReady,
            site_path,
            bootstrap,
            settings,
            config_storage,
            container_storage,
            boot_request: None,
            container: None,
            container_needs_dumping: false,
            module_list: None,
            new_module_list: None,
            module_filenames: HashMap::new(),
            extension_data: None,
            service_providers: None,
            class_loader: Arc::new(NamespaceRegistry::new()),
            request_context: None,
            pending_cache_status: None,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn phase(&self) -> BootPhase {
        self.phase
    }

    pub fn is_booted(&self) -> bool {
        self.phase == BootPhase::ContainerReady
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn site_path(&self) -> &Path {
        &self.site_path
    }

    pub fn app_root(&self) -> &Path {
        self.context.app_root()
    }

    pub fn context(&self) -> &Arc<BootContext> {
        &self.context
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn bootstrap(&self) -> &SiteBootstrap {
        &self.bootstrap
    }

    pub fn config_storage(&self) -> &Arc<dyn ConfigStorage> {
        &self.config_storage
    }

    pub fn container_storage(&self) -> &Arc<dyn ContainerStorage> {
        &self.container_storage
    }

    /// The current container; `None` until booted
    pub fn container(&self) -> Option<Arc<Container>> {
        self.container.clone()
    }

    /// Request data prepared by the last [`Kernel::pre_handle`]
    pub fn request_context(&self) -> Option<&RequestContext> {
        self.request_context.as_ref()
    }

    pub fn class_loader(&self) -> &Arc<NamespaceRegistry> {
        &self.class_loader
    }

    /// Random source reseeded from the OS on every request
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Boot the kernel: install redirect check, then load or build the
    /// container. Calling it again on a booted kernel does nothing.
    pub fn boot(&mut self) -> Result<BootStatus> {
        if self.is_booted() {
            return Ok(BootStatus::Booted);
        }
        if self.context.boot_environment() {
            log::debug!("Environment initialized by boot()");
        }
        self.phase = self.phase.max(BootPhase::EnvironmentReady);

        if !self.bootstrap.has_database() && !self.install_flow {
            let location = self.install_location()?;
            log::info!("No database configured for {}, redirecting to {}", self.site_path.display(), location);
            return Ok(BootStatus::InstallRequired(Response::redirect(location)));
        }
        self.phase = BootPhase::ConfigurationReady;

        self.initialize_container(false)?;
        self.phase = BootPhase::ContainerReady;
        log::info!("Kernel booted ({} environment)", self.environment);
        Ok(BootStatus::Booted)
    }

    /// Drop the container and request state. A no-op before boot.
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.is_booted() {
            return Ok(());
        }
        log::info!("Kernel shutting down");
        self.container = None;
        self.request_context = None;
        self.pending_cache_status = None;
        self.phase = BootPhase::ShutDown;
        Ok(())
    }

    /// Serve `request` from the page cache when possible. Boots the kernel
    /// but runs no request handling. On a miss the response of the
    /// following [`Kernel::handle`] is marked `MISS` and stored.
    pub fn handle_page_cache(&mut self, request: &Request) -> Result<PageCacheOutcome> {
        if self.test_only && self.context.test_run_id(request).is_none() {
            return Ok(PageCacheOutcome::Bypassed);
        }
        if let BootStatus::InstallRequired(_) = self.boot()? {
            return Ok(PageCacheOutcome::Bypassed);
        }
        if !request.is_method_cacheable() || self.has_session_cookie(request)? {
            return Ok(PageCacheOutcome::Bypassed);
        }
        if !page_cache::is_enabled(&self.settings, self.config_storage.as_ref())? {
            return Ok(PageCacheOutcome::Bypassed);
        }

        let cache = self.require_container()?.get_as::<PageCacheHandle>(constants::SERVICE_PAGE_CACHE)?;
        let key = page_cache::cache_key(request);
        match cache.0.get(&key)? {
            Some(mut response) => {
                log::debug!("Page cache hit for {}", request.uri());
                response.set_header(constants::CACHE_STATUS_HEADER, CacheStatus::Hit.as_str());
                Ok(PageCacheOutcome::Hit(response))
            }
            None => {
                self.pending_cache_status = Some(CacheStatus::Miss);
                Ok(PageCacheOutcome::Miss)
            }
        }
    }

    /// Boot if needed, prepare the request and hand it to the HTTP kernel
    pub async fn handle(&mut self, request: &Request) -> Result<Response> {
        if self.test_only && self.context.test_run_id(request).is_none() {
            return Ok(Response::forbidden("Forbidden"));
        }
        if let BootStatus::InstallRequired(redirect) = self.boot()? {
            return Ok(redirect);
        }
        let context = self.pre_handle(request)?.clone();
        let http_kernel = self.http_kernel()?;
        let mut response = http_kernel
            .handle(&context)
            .await
            .map_err(|e| Error::lifecycle(KernelLifecyclePhase::Handle, "request handling failed", Some(e)))?;

        if let Some(status) = self.pending_cache_status.take() {
            response.set_header(constants::CACHE_STATUS_HEADER, status.as_str());
            if status == CacheStatus::Miss && page_cache::is_cacheable(request, &response) {
                self.store_in_page_cache(request, &response);
            }
        }
        Ok(response)
    }

    /// Run post-response work of the HTTP kernel. A no-op before boot.
    pub async fn terminate(&mut self, request: &Request, response: &Response) -> Result<()> {
        if !self.is_booted() {
            return Ok(());
        }
        let http_kernel = self.http_kernel()?;
        if let Some(terminable) = http_kernel.terminable() {
            terminable
                .terminate(request, response)
                .await
                .map_err(|e| Error::lifecycle(KernelLifecyclePhase::Terminate, "terminate failed", Some(e)))?;
        }
        Ok(())
    }

    /// Request setup ahead of dispatch: request globals (once per process),
    /// a fresh random seed, the allowed URL schemes and the request context.
    pub fn pre_handle(&mut self, request: &Request) -> Result<&RequestContext> {
        let container = self.require_container()?;
        let globals = self.context.request_globals(request, &self.bootstrap)?;
        self.rng = StdRng::from_entropy();
        let url_policy = UrlPolicy::from_config(self.config_storage.as_ref()).unwrap_or_else(|e| {
            log::warn!("Falling back to default URL schemes: {}", e);
            UrlPolicy::default()
        });
        let context = self
            .request_context
            .insert(RequestContext::new(request.clone(), globals, url_policy, container));
        Ok(&*context)
    }

    /// Boot and prepare a request without dispatching it, for code that
    /// needs a fully set up kernel outside the HTTP flow
    pub fn prepare_legacy_request(&mut self, request: &Request) -> Result<BootStatus> {
        let status = self.boot()?;
        if status == BootStatus::Booted {
            self.pre_handle(request)?;
        }
        Ok(status)
    }

    /// Replace the enabled-module list. `filenames` maps module names to info
    /// files and takes precedence over discovery. A booted kernel rebuilds
    /// its container right away.
    pub fn update_modules(&mut self, module_list: ModuleList, filenames: HashMap<String, PathBuf>) -> Result<()> {
        self.new_module_list = Some(module_list);
        self.module_filenames.extend(filenames);
        if self.is_booted() {
            self.initialize_container(false)?;
        }
        Ok(())
    }

    /// Throw away the cached artifact and build a fresh container
    pub fn rebuild_container(&mut self) -> Result<Arc<Container>> {
        let name = cache_name(&self.environment);
        match self.container_storage.delete(&name) {
            Ok(true) => log::info!("Removed compiled container '{}'", name),
            Ok(false) => {}
            Err(e) => log::warn!("Could not remove compiled container '{}': {}", name, e),
        }
        self.module_list = None;
        self.extension_data = None;
        self.service_providers = None;
        let container = self.initialize_container(true)?;
        if self.phase >= BootPhase::ConfigurationReady {
            self.phase = BootPhase::ContainerReady;
        }
        Ok(container)
    }

    /// Serve the rebuild entry point: drop and rebuild the container, then
    /// send the client to the front page. Refused with 403 unless
    /// `rebuild_access` is on or the query carries a valid signed token.
    pub fn handle_rebuild(&mut self, request: &Request, now: u64) -> Result<Response> {
        if !rebuild::rebuild_allowed(&self.settings, request.query(), now) {
            log::warn!("Refused container rebuild requested from {}", request.http_host());
            return Ok(Response::forbidden("Forbidden"));
        }
        self.rebuild_container()?;
        Ok(Response::redirect(format!("{}/", self.base_url(request)?)))
    }

    /// Absolute URL of the installation as seen by `request`, no trailing
    /// slash. Honours a `base_url` from the settings file.
    pub fn base_url(&self, request: &Request) -> Result<String> {
        let globals = RequestGlobals::from_request(
            request,
            self.bootstrap.base_url.as_deref(),
            self.bootstrap.cookie_domain.as_deref(),
        )?;
        Ok(globals.base_url)
    }

    /// Instantiated providers of the `app` or `site` partition
    pub fn get_service_providers(&mut self, origin: &str) -> Result<Vec<Arc<dyn ServiceProvider>>> {
        let origin: ProviderOrigin = origin.parse()?;
        let registry = self.discover_service_providers()?;
        Ok(registry.partition(origin).providers().map(|(_, provider)| provider.clone()).collect())
    }

    /// Collect providers and services files: core, then every enabled module
    /// in load order (app partition), then the site overrides from settings
    pub fn discover_service_providers(&mut self) -> Result<&ServiceProviderRegistry> {
        if self.service_providers.is_none() {
            let registry = self.build_provider_registry()?;
            self.service_providers = Some(registry);
        }
        self.service_providers
            .as_ref()
            .ok_or_else(|| Error::Other("service providers not discovered".to_string()))
    }

    fn build_provider_registry(&mut self) -> Result<ServiceProviderRegistry> {
        let modules = self.current_module_list()?;
        let extensions = self.module_data(&modules)?;
        let storage = self.context.storage();
        let mut registry = ServiceProviderRegistry::new();

        let app = registry.partition_mut(ProviderOrigin::App);
        if storage.is_file(Path::new(constants::CORE_SERVICES_FILE)) {
            app.add_yaml(PathBuf::from(constants::CORE_SERVICES_FILE));
        }
        app.insert(CoreServiceProvider::NAME, Arc::new(CoreServiceProvider))?;
        for (name, extension) in &extensions {
            if let Some(provider) = self.catalog.module_provider(name) {
                app.insert(provider.name().to_string(), provider)?;
            }
            let services_file = extension.services_file();
            if storage.is_file(&services_file) {
                app.add_yaml(services_file);
            }
        }

        let site = registry.partition_mut(ProviderOrigin::Site);
        let yamls: Vec<PathBuf> = self.settings.get_or("container_yamls", Vec::new());
        for yaml in yamls {
            site.add_yaml(yaml);
        }
        let classes: IndexMap<String, String> = self.settings.get_or("container_service_providers", IndexMap::new());
        for (name, class) in classes {
            let provider = self
                .catalog
                .instantiate(&class)
                .ok_or_else(|| ExtensionError::UnknownProviderClass {
                    name: name.clone(),
                    class: class.clone(),
                })?;
            site.insert(name, provider)?;
        }

        log::debug!(
            "Discovered {} app and {} site service providers",
            registry.partition(ProviderOrigin::App).len(),
            registry.partition(ProviderOrigin::Site).len()
        );
        Ok(registry)
    }

    /// Load-or-build the container, carrying persisted services over from
    /// the outgoing one. On failure the outgoing container stays in place
    /// together with the module list it was built for.
    fn initialize_container(&mut self, force_rebuild: bool) -> Result<Arc<Container>> {
        let previous_modules = self.module_list.clone();
        match self.replace_container(force_rebuild) {
            Ok(container) => {
                if let Some(context) = self.request_context.as_mut() {
                    context.set_container(container.clone());
                }
                Ok(container)
            }
            Err(e) => {
                if self.container.is_some() {
                    log::error!("Container rebuild failed, keeping the previous container: {}", e);
                    self.module_list = previous_modules;
                }
                self.extension_data = None;
                self.service_providers = None;
                Err(e)
            }
        }
    }

    fn replace_container(&mut self, force_rebuild: bool) -> Result<Arc<Container>> {
        self.container_needs_dumping = false;

        let mut persisted: Vec<(String, ServiceInstance)> = Vec::new();
        if let Some(old) = &self.container {
            for id in old.persist_ids() {
                if old.initialized(&id) {
                    persisted.push((id.clone(), old.get(&id)?));
                }
            }
        }

        let name = cache_name(&self.environment);
        let mut container = if self.allow_dumping && !force_rebuild {
            self.load_cached_container(&name)
        } else {
            None
        };

        if let Some(new_list) = self.new_module_list.take() {
            self.module_list = Some(new_list);
            self.extension_data = None;
            self.service_providers = None;
        }
        let modules = self.current_module_list()?;
        if let Some(loaded) = &container {
            let recorded = recorded_modules(loaded);
            let current: Vec<&str> = modules.names().collect();
            if recorded != current {
                log::warn!(
                    "Compiled container '{}' was built for modules {:?}, now {:?}; rebuilding",
                    name,
                    recorded,
                    current
                );
                container = None;
            }
        }

        let container = match container {
            Some(container) => container,
            None => {
                let built = self.compile_container()?;
                self.container_needs_dumping = self.allow_dumping;
                built
            }
        };

        self.attach_synthetic(&container)?;
        let namespaces: BTreeMap<String, PathBuf> =
            container.parameter_as(constants::PARAM_NAMESPACES).unwrap_or_default();
        self.class_loader.register(namespaces)?;

        for (id, instance) in persisted {
            if !container.initialized(&id) {
                container.set(&id, instance)?;
            }
        }

        if self.container_needs_dumping {
            self.dump_container(&container, &name);
        }
        self.container = Some(container.clone());
        Ok(container)
    }

    fn load_cached_container(&self, name: &str) -> Option<Arc<Container>> {
        let content = match self.container_storage.load(name) {
            Ok(Some(content)) => content,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Could not read compiled container '{}': {}", name, e);
                return None;
            }
        };
        match decode_artifact(name, &content).and_then(|a| Container::from_artifact(a, self.factories.clone())) {
            Ok(container) => {
                log::debug!("Loaded compiled container '{}'", name);
                Some(container)
            }
            Err(e) => {
                log::warn!("Discarding unusable compiled container '{}': {}", name, e);
                None
            }
        }
    }

    fn dump_container(&mut self, container: &Container, name: &str) {
        if !self.container_storage.writeable() {
            log::warn!("Container storage is not writeable, compiled container '{}' not saved", name);
            return;
        }
        let saved = encode_artifact(&container.to_artifact(&self.environment))
            .and_then(|content| self.container_storage.save(name, &content));
        match saved {
            Ok(()) => {
                log::info!("Saved compiled container '{}'", name);
                self.container_needs_dumping = false;
            }
            Err(e) => log::warn!("Container cannot be written to storage: {}", e),
        }
    }

    fn compile_container(&mut self) -> Result<Arc<Container>> {
        log::info!("Building service container for environment '{}'", self.environment);
        let modules = self.current_module_list()?;
        let extensions = self.module_data(&modules)?;
        self.service_providers = None;
        self.discover_service_providers()?;
        let providers = self
            .service_providers
            .as_ref()
            .ok_or_else(|| Error::Other("service providers not discovered".to_string()))?;

        let mut builder = ContainerBuilder::new();
        builder.set_parameter(constants::PARAM_ENVIRONMENT, Value::from(self.environment.clone()));
        builder.set_parameter(constants::PARAM_MODULES, modules_parameter(&modules, &extensions));
        let module_dirs = extensions
            .iter()
            .map(|(name, extension)| (name.as_str(), extension.pathname.parent().unwrap_or(Path::new(""))));
        builder.set_parameter_from(constants::PARAM_NAMESPACES, &namespaces_for(module_dirs))?;
        builder.set_parameter_from(constants::PARAM_SERVICE_PROVIDERS, &providers.names_by_origin())?;
        builder.set_parameter_from(constants::PARAM_SITE_PATH, &self.site_path)?;
        builder.set_parameter_from(constants::PARAM_APP_ROOT, &self.context.app_root())?;

        providers.apply(&mut builder, self.context.storage().as_ref())?;
        builder.compile(self.factories.clone())
    }

    fn attach_synthetic(&self, container: &Container) -> Result<()> {
        let info = KernelInfo {
            environment: self.environment.clone(),
            site_path: self.site_path.clone(),
            app_root: self.context.app_root().to_path_buf(),
        };
        container.set(constants::SERVICE_KERNEL, Arc::new(info))?;
        container.set(constants::SERVICE_CLASS_LOADER, self.class_loader.clone())?;
        container.set(constants::SERVICE_SETTINGS, self.settings.clone())?;
        container.set(
            constants::SERVICE_CONFIG_STORAGE,
            Arc::new(ConfigStorageHandle(self.config_storage.clone())),
        )?;
        let http_kernel_is_synthetic = container
            .definition(constants::SERVICE_HTTP_KERNEL)
            .is_none_or(|definition| definition.synthetic);
        if http_kernel_is_synthetic {
            container.set(
                constants::SERVICE_HTTP_KERNEL,
                Arc::new(HttpKernelHandle::new(self.http_kernel.clone())),
            )?;
        }
        Ok(())
    }

    fn current_module_list(&mut self) -> Result<ModuleList> {
        if let Some(list) = &self.module_list {
            return Ok(list.clone());
        }
        let list = ModuleList::from_config(self.config_storage.as_ref())?;
        self.module_list = Some(list.clone());
        Ok(list)
    }

    /// Extensions of the enabled modules, in load order. Modules that
    /// cannot be found are skipped.
    fn module_data(&mut self, modules: &ModuleList) -> Result<IndexMap<String, Extension>> {
        if self.extension_data.is_none() {
            let storage = self.context.storage();
            let discovered = ExtensionDiscovery::new(storage.as_ref(), Some(self.site_path.clone()))?.scan()?;
            self.extension_data = Some(discovered);
        }
        let discovered = self.extension_data.as_ref();
        let mut data = IndexMap::new();
        for name in modules.names() {
            let extension = match self.module_filenames.get(name) {
                Some(pathname) => Some(Extension::from_info_path(name, pathname.clone())),
                None => discovered.and_then(|found| found.get(name).cloned()),
            };
            match extension {
                Some(extension) => {
                    data.insert(name.to_string(), extension);
                }
                None => log::warn!("Enabled module '{}' was not found", name),
            }
        }
        Ok(data)
    }

    fn require_container(&self) -> Result<Arc<Container>> {
        self.container.clone().ok_or_else(|| {
            Error::lifecycle(KernelLifecyclePhase::Container, "kernel has not been booted", None)
        })
    }

    fn http_kernel(&self) -> Result<Arc<dyn HttpKernel>> {
        let handle = self
            .require_container()?
            .get_as::<HttpKernelHandle>(constants::SERVICE_HTTP_KERNEL)?;
        Ok(handle.kernel().clone())
    }

    fn has_session_cookie(&self, request: &Request) -> Result<bool> {
        let globals = RequestGlobals::from_request(
            request,
            self.bootstrap.base_url.as_deref(),
            self.bootstrap.cookie_domain.as_deref(),
        )?;
        Ok(session::has_session_cookie(
            request.cookies().map(|(name, _)| name),
            &globals.session_name,
        ))
    }

    fn store_in_page_cache(&self, request: &Request, response: &Response) {
        let stored = self
            .require_container()
            .and_then(|container| container.get_as::<PageCacheHandle>(constants::SERVICE_PAGE_CACHE))
            .and_then(|cache| cache.0.set(&page_cache::cache_key(request), response));
        if let Err(e) = stored {
            log::warn!("Could not store {} in the page cache: {}", request.uri(), e);
        }
    }

    fn install_location(&self) -> Result<String> {
        match &self.boot_request {
            Some(request) => Ok(format!("{}{}", self.base_url(request)?, constants::INSTALL_PATH)),
            None => Ok(constants::INSTALL_PATH.to_string()),
        }
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("environment", &self.environment)
            .field("site_path", &self.site_path)
            .field("phase", &self.phase)
            .field("container", &self.container)
            .finish()
    }
}

/// `container.modules`: name -> {type, pathname, filename} for every listed
/// module, in load order
fn modules_parameter(modules: &ModuleList, extensions: &IndexMap<String, Extension>) -> Value {
    let mut map = serde_json::Map::new();
    for name in modules.names() {
        let entry = match extensions.get(name) {
            Some(extension) => json!({
                "type": extension.kind,
                "pathname": extension.pathname,
                "filename": extension.filename(),
            }),
            None => json!({ "type": "module", "pathname": null, "filename": null }),
        };
        map.insert(name.to_string(), entry);
    }
    Value::Object(map)
}

/// Module names a container was built for, in load order
fn recorded_modules(container: &Container) -> Vec<&str> {
    match container.parameter(constants::PARAM_MODULES) {
        Some(Value::Object(map)) => map.keys().map(String::as_str).collect(),
        _ => Vec::new(),
    }
}
