use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock};

use crate::http::{Request, RequestGlobals};
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::site::{SiteBootstrap, SitePathResolver, test_run_id, test_site_path};
use crate::storage::{LocalStorageProvider, StorageProvider};

static PANIC_HOOK: Once = Once::new();

/// Process-wide boot state shared by every kernel of a process.
///
/// Holds what must happen at most once per process: environment
/// hardening, settings bootstrap, request globals and the memoized site
/// path. Created by the process entry point and handed to each kernel.
#[derive(Debug)]
pub struct BootContext {
    app_root: PathBuf,
    storage: Arc<dyn StorageProvider>,
    test_mode: bool,
    environment_ready: OnceLock<()>,
    environment_inits: AtomicUsize,
    bootstrap: OnceLock<Arc<SiteBootstrap>>,
    site_path: Mutex<Option<PathBuf>>,
    request_globals: OnceLock<Arc<RequestGlobals>>,
}

impl BootContext {
    /// Context for the application rooted at `app_root`
    pub fn new(app_root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self::build(app_root.into(), false))
    }

    /// Context that honours test user agents and allows site path resets
    pub fn for_tests(app_root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self::build(app_root.into(), true))
    }

    fn build(app_root: PathBuf, test_mode: bool) -> Self {
        Self {
            storage: Arc::new(LocalStorageProvider::new(app_root.clone())),
            app_root,
            test_mode,
            environment_ready: OnceLock::new(),
            environment_inits: AtomicUsize::new(0),
            bootstrap: OnceLock::new(),
            site_path: Mutex::new(None),
            request_globals: OnceLock::new(),
        }
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    /// Storage rooted at the application root
    pub fn storage(&self) -> Arc<dyn StorageProvider> {
        self.storage.clone()
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    /// Harden the process environment. Runs once per context; returns
    /// whether this call did the work.
    pub fn boot_environment(&self) -> bool {
        let mut ran = false;
        self.environment_ready.get_or_init(|| {
            ran = true;
            self.environment_inits.fetch_add(1, Ordering::SeqCst);
            PANIC_HOOK.call_once(|| {
                let previous = std::panic::take_hook();
                std::panic::set_hook(Box::new(move |info| {
                    log::error!("Unhandled panic: {}", info);
                    previous(info);
                }));
            });
            log::debug!("Process environment initialized for {}", self.app_root.display());
        });
        ran
    }

    pub fn is_environment_ready(&self) -> bool {
        self.environment_ready.get().is_some()
    }

    /// How often the environment was initialized; at most one
    pub fn environment_initializations(&self) -> usize {
        self.environment_inits.load(Ordering::SeqCst)
    }

    /// Test run id of the request's user agent, honoured in test mode only
    pub fn test_run_id<'r>(&self, request: &'r Request) -> Option<&'r str> {
        if !self.test_mode {
            return None;
        }
        request.user_agent().and_then(test_run_id)
    }

    /// Site directory serving `request`, resolved once and then memoized
    pub fn site_path(&self, request: &Request, require_settings: bool) -> Result<PathBuf> {
        let mut memo = self.site_path.lock().map_err(|_| poisoned("site path"))?;
        if let Some(path) = memo.as_ref() {
            return Ok(path.clone());
        }
        let path = match self.test_run_id(request) {
            Some(run_id) => test_site_path(run_id),
            None => SitePathResolver::new(self.storage.as_ref())?.resolve(
                request.http_host(),
                request.script_name(),
                require_settings,
            ),
        };
        log::info!("Using site path {}", path.display());
        *memo = Some(path.clone());
        Ok(path)
    }

    /// Pin the site path without resolving it from a request
    pub fn set_site_path(&self, path: impl Into<PathBuf>) -> Result<PathBuf> {
        let mut memo = self.site_path.lock().map_err(|_| poisoned("site path"))?;
        match memo.as_ref() {
            Some(existing) => Ok(existing.clone()),
            None => {
                let path = path.into();
                *memo = Some(path.clone());
                Ok(path)
            }
        }
    }

    /// Forget the memoized site path. Only available in test mode.
    pub fn reset_site_path(&self) -> Result<()> {
        if !self.test_mode {
            return Err(Error::lifecycle(
                KernelLifecyclePhase::Settings,
                "site path can only be reset by a test context",
                None,
            ));
        }
        let mut memo = self.site_path.lock().map_err(|_| poisoned("site path"))?;
        *memo = None;
        Ok(())
    }

    /// Load `<site_path>/settings.toml`. Only the first call reads the file;
    /// later calls return the same bootstrap whatever site they name.
    pub fn initialize_settings(&self, site_path: &Path) -> Result<Arc<SiteBootstrap>> {
        if let Some(bootstrap) = self.bootstrap.get() {
            return Ok(bootstrap.clone());
        }
        let loaded = Arc::new(SiteBootstrap::load(self.storage.as_ref(), site_path)?);
        Ok(self.bootstrap.get_or_init(|| loaded).clone())
    }

    pub fn bootstrap(&self) -> Option<Arc<SiteBootstrap>> {
        self.bootstrap.get().cloned()
    }

    /// Request globals, derived from the first request of the process
    pub fn request_globals(&self, request: &Request, bootstrap: &SiteBootstrap) -> Result<Arc<RequestGlobals>> {
        if let Some(globals) = self.request_globals.get() {
            return Ok(globals.clone());
        }
        let globals = Arc::new(RequestGlobals::from_request(
            request,
            bootstrap.base_url.as_deref(),
            bootstrap.cookie_domain.as_deref(),
        )?);
        Ok(self.request_globals.get_or_init(|| globals).clone())
    }
}

fn poisoned(what: &str) -> Error {
    Error::lifecycle(
        KernelLifecyclePhase::Environment,
        format!("{} lock poisoned", what),
        None,
    )
}
