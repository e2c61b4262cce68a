use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, json};
use tempfile::tempdir;

use crate::container::{FactoryRegistry, ResolvedArgument, ResolvedArguments};
use crate::http::{Request, Response};
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::page_cache::{
    CacheStatus, FILE_PAGE_CACHE_FACTORY, FilePageCache, MemoryPageCache, PageCache, PageCacheHandle, cache_key,
    is_cacheable, is_enabled, register_factories,
};
use crate::site::Settings;
use crate::storage::{ConfigData, ConfigStorage, LocalStorageProvider, MemoryConfigStorage, StorageProvider};

#[test]
fn test_cache_key_depends_on_scheme_host_and_uri() {
    let base = cache_key(&Request::get("/node/1").with_host("example.com"));
    assert_eq!(base.len(), 64);
    assert_eq!(base, cache_key(&Request::get("/node/1").with_host("example.com")));
    assert_ne!(base, cache_key(&Request::get("/node/1?page=2").with_host("example.com")));
    assert_ne!(base, cache_key(&Request::get("/node/1").with_host("example.org")));
    assert_ne!(base, cache_key(&Request::get("/node/1").with_host("example.com").with_https(true)));
}

#[test]
fn test_is_enabled() -> Result<()> {
    let config = MemoryConfigStorage::new();
    assert!(!is_enabled(&Settings::default(), &config)?);

    let mut forced = Map::new();
    forced.insert("page_cache_without_database".to_string(), json!(true));
    assert!(is_enabled(&Settings::new(forced), &config)?);

    let mut performance = ConfigData::new();
    performance.set("cache", json!({ "page": { "use_internal": true } }))?;
    config.write(constants::CONFIG_PERFORMANCE, &performance)?;
    assert!(is_enabled(&Settings::default(), &config)?);

    Ok(())
}

#[test]
fn test_is_cacheable() {
    let get = Request::get("/");
    assert!(is_cacheable(&get, &Response::ok("page")));
    assert!(!is_cacheable(&get, &Response::new(404, "missing")));
    assert!(!is_cacheable(&Request::new("POST", "/"), &Response::ok("page")));
}

#[test]
fn test_status_header_values() {
    assert_eq!(CacheStatus::Hit.as_str(), "HIT");
    assert_eq!(CacheStatus::Miss.as_str(), "MISS");
}

#[test]
fn test_memory_cache() -> Result<()> {
    let cache = MemoryPageCache::new();
    assert!(cache.is_empty());

    cache.set("key", &Response::ok("cached"))?;
    assert_eq!(cache.get("key")?.map(|r| r.body().to_string()).as_deref(), Some("cached"));
    assert_eq!(cache.len(), 1);

    cache.delete("key")?;
    assert!(cache.get("key")?.is_none());

    Ok(())
}

#[test]
fn test_file_cache_round_trip_and_corrupt_entry() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(temp_dir.path().to_path_buf()));
    let cache = FilePageCache::new(provider.clone(), PathBuf::from("sites/default/files/page_cache"));

    let response = Response::ok("<p>hello</p>").with_header("Content-Type", "text/html");
    cache.set("abc", &response)?;
    assert_eq!(cache.get("abc")?, Some(response));

    provider.write_string(Path::new("sites/default/files/page_cache/broken.json"), "{ nope")?;
    assert!(cache.get("broken")?.is_none(), "Unreadable entries count as misses");

    cache.delete("abc")?;
    cache.delete("never-stored")?;
    assert!(cache.get("abc")?.is_none());

    Ok(())
}

#[test]
fn test_file_cache_factory() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let mut factories = FactoryRegistry::new();
    register_factories(&mut factories);

    let factory = factories.get(FILE_PAGE_CACHE_FACTORY).expect("factory registered");
    let args = ResolvedArguments::new(
        constants::SERVICE_PAGE_CACHE,
        vec![
            ResolvedArgument::Value(json!(temp_dir.path())),
            ResolvedArgument::Value(json!("sites/default")),
        ],
    );
    let instance = factory(&args)?;
    let handle = instance.downcast::<PageCacheHandle>().expect("factory builds a PageCacheHandle");

    handle.0.set("key", &Response::ok("stored"))?;
    assert!(temp_dir.path().join("sites/default/files/page_cache/key.json").is_file());

    Ok(())
}
