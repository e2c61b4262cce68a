//! # Hearth Page Cache
//!
//! Full-response cache for anonymous requests. The kernel consults it before
//! booting the container and writes cacheable responses back after a miss.
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};

use crate::container::{ContainerError, FactoryRegistry, ServiceInstance};
use crate::http::{Request, Response};
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::site::Settings;
use crate::storage::{ConfigStorage, LocalStorageProvider, StorageProvider, StorageSystemError};

/// Name of the factory building the file-backed page cache
pub const FILE_PAGE_CACHE_FACTORY: &str = "page_cache.file";

/// Directory, relative to the site path, holding cached pages
pub const PAGE_CACHE_DIR: &str = "files/page_cache";

/// Value of the cache status header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Storage for whole responses keyed by request fingerprint
pub trait PageCache: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<Response>>;

    fn set(&self, key: &str, response: &Response) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}

/// Container-storable handle around a [`PageCache`]
#[derive(Debug, Clone)]
pub struct PageCacheHandle(pub Arc<dyn PageCache>);

/// Fingerprint of a request: SHA-256 of scheme, host and URI
pub fn cache_key(request: &Request) -> String {
    let fingerprint = format!("{}{}", request.scheme_and_http_host(), request.uri());
    format!("{:x}", Sha256::digest(fingerprint.as_bytes()))
}

/// Page caching is on when settings force it (`page_cache_without_database`)
/// or `system.performance` has `cache.page.use_internal`
pub fn is_enabled(settings: &Settings, config: &dyn ConfigStorage) -> Result<bool> {
    if settings.is_enabled("page_cache_without_database") {
        return Ok(true);
    }
    Ok(config
        .read(constants::CONFIG_PERFORMANCE)?
        .and_then(|data| data.get_nested::<bool>("cache.page.use_internal"))
        .unwrap_or(false))
}

/// Whether a response to `request` may be stored
pub fn is_cacheable(request: &Request, response: &Response) -> bool {
    request.is_method_cacheable() && response.status() == 200
}

/// One JSON file per entry below a directory
#[derive(Debug)]
pub struct FilePageCache {
    provider: Arc<dyn StorageProvider>,
    directory: PathBuf,
}

impl FilePageCache {
    pub fn new(provider: Arc<dyn StorageProvider>, directory: PathBuf) -> Self {
        Self { provider, directory }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", key))
    }
}

impl PageCache for FilePageCache {
    fn get(&self, key: &str) -> Result<Option<Response>> {
        let path = self.path_for(key);
        if !self.provider.is_file(&path) {
            return Ok(None);
        }
        let contents = self.provider.read_to_string(&path)?;
        match serde_json::from_str(&contents) {
            Ok(response) => Ok(Some(response)),
            Err(e) => {
                log::warn!("Discarding unreadable page cache entry {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, response: &Response) -> Result<()> {
        let contents =
            serde_json::to_string(response).map_err(|e| StorageSystemError::serialization("json", e))?;
        self.provider.write_string(&self.path_for(key), &contents)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if self.provider.is_file(&path) {
            self.provider.remove_file(&path)?;
        }
        Ok(())
    }
}

/// Page cache held in memory
#[derive(Debug, Default)]
pub struct MemoryPageCache {
    entries: RwLock<HashMap<String, Response>>,
}

impl MemoryPageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PageCache for MemoryPageCache {
    fn get(&self, key: &str) -> Result<Option<Response>> {
        let entries = self.entries.read().map_err(|_| ContainerError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, response: &Response) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| ContainerError::LockPoisoned)?;
        entries.insert(key.to_string(), response.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| ContainerError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Register the file page cache factory. Arguments: application root and
/// site path.
pub fn register_factories(factories: &mut FactoryRegistry) {
    factories.register(FILE_PAGE_CACHE_FACTORY, |args| {
        let app_root: PathBuf = args.value(0)?;
        let site_path: PathBuf = args.value(1)?;
        let provider: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(app_root));
        let cache: Arc<dyn PageCache> = Arc::new(FilePageCache::new(provider, site_path.join(PAGE_CACHE_DIR)));
        Ok(Arc::new(PageCacheHandle(cache)) as ServiceInstance)
    });
}

#[cfg(test)]
mod tests;
