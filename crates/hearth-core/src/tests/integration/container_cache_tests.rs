#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::common::{Greeting, SiteFixture};
use crate::container::cache::decode_artifact;
use crate::container::{ContainerStorage, MemoryContainerStorage, cache_name};
use crate::kernel::error::Result;

fn registrations(fixture: &SiteFixture) -> usize {
    fixture.registrations.load(Ordering::SeqCst)
}

#[test]
fn test_compiled_container_is_written_to_site_files() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;

    let artifact = fixture
        .root()
        .join("sites/default/files/cache")
        .join(format!("{}.json", cache_name("prod")));
    assert!(artifact.is_file(), "Artifact should be at {}", artifact.display());

    Ok(())
}

#[test]
fn test_cached_container_is_reused_by_next_process() -> Result<()> {
    let fixture = SiteFixture::new();
    let storage = Arc::new(MemoryContainerStorage::new());

    let mut first = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    first.boot()?;
    assert!(storage.contains(&cache_name("prod")));
    assert_eq!(registrations(&fixture), 1);

    let mut second = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    second.boot()?;
    assert_eq!(registrations(&fixture), 1, "Providers do not run for a cached container");

    let container = second.container().expect("booted kernel has a container");
    assert_eq!(container.get_as::<Greeting>("greeting")?.0, "Hello");

    Ok(())
}

#[test]
fn test_environments_have_separate_artifacts() -> Result<()> {
    let fixture = SiteFixture::new();
    let storage = Arc::new(MemoryContainerStorage::new());

    let mut prod = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    prod.boot()?;

    let mut dev_options = fixture.options().with_container_storage(storage.clone());
    dev_options.environment = "dev".to_string();
    let mut dev = fixture.kernel(dev_options);
    dev.boot()?;

    assert!(storage.contains(&cache_name("prod")));
    assert!(storage.contains(&cache_name("dev")));
    assert_eq!(registrations(&fixture), 2);

    Ok(())
}

#[test]
fn test_corrupt_artifact_is_rebuilt() -> Result<()> {
    let fixture = SiteFixture::new();
    let storage = Arc::new(MemoryContainerStorage::new());
    storage.insert_raw(&cache_name("prod"), "{ \"format_version\": 1, truncated")?;

    let mut kernel = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    kernel.boot()?;

    assert_eq!(registrations(&fixture), 1);
    let stored = storage.load(&cache_name("prod"))?.expect("rebuilt artifact is saved");
    assert!(decode_artifact(&cache_name("prod"), &stored).is_ok());

    Ok(())
}

#[test]
fn test_artifact_for_other_modules_is_rebuilt() -> Result<()> {
    let fixture = SiteFixture::new();
    let storage = Arc::new(MemoryContainerStorage::new());

    let mut first = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    first.boot()?;
    assert!(first.container().is_some_and(|c| c.has("greeting")));

    fixture.enable_modules(&[("system", 0)]);
    let mut second = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    second.boot()?;

    assert_eq!(registrations(&fixture), 1, "greeting provider is not part of the rebuild");
    let container = second.container().expect("booted kernel has a container");
    assert!(!container.has("greeting"));

    Ok(())
}

#[test]
fn test_module_order_change_triggers_rebuild() -> Result<()> {
    let fixture = SiteFixture::new();
    let storage = Arc::new(MemoryContainerStorage::new());

    let mut first = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    first.boot()?;

    fixture.enable_modules(&[("system", 0), ("greeting", 10)]);
    let mut second = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    second.boot()?;

    assert_eq!(registrations(&fixture), 2, "Same modules in a new order still rebuild");

    Ok(())
}

#[test]
fn test_read_only_storage_is_not_fatal() -> Result<()> {
    let fixture = SiteFixture::new();
    let storage = Arc::new(MemoryContainerStorage::read_only());

    let mut kernel = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    kernel.boot()?;

    assert!(kernel.is_booted());
    assert!(!storage.contains(&cache_name("prod")));

    Ok(())
}

#[test]
fn test_dumping_disabled_never_touches_storage() -> Result<()> {
    let fixture = SiteFixture::new();
    let storage = Arc::new(MemoryContainerStorage::new());

    let mut first = fixture.kernel(
        fixture
            .options()
            .with_dumping(false)
            .with_container_storage(storage.clone()),
    );
    first.boot()?;
    assert!(!storage.contains(&cache_name("prod")));

    let mut second = fixture.kernel(
        fixture
            .options()
            .with_dumping(false)
            .with_container_storage(storage.clone()),
    );
    second.boot()?;
    assert_eq!(registrations(&fixture), 2);

    Ok(())
}

#[test]
fn test_rebuild_container_replaces_artifact() -> Result<()> {
    let fixture = SiteFixture::new();
    let storage = Arc::new(MemoryContainerStorage::new());
    let mut kernel = fixture.kernel(fixture.options().with_container_storage(storage.clone()));
    kernel.boot()?;

    fixture.write(
        "modules/greeting/greeting.services.yml",
        "parameters:\n  greeting.text: Updated\nservices:\n  greeting:\n    factory: greeting.message\n    arguments: ['%greeting.text%']\n",
    );
    let rebuilt = kernel.rebuild_container()?;

    assert_eq!(rebuilt.get_as::<Greeting>("greeting")?.0, "Updated");
    assert_eq!(registrations(&fixture), 2);
    let stored = storage.load(&cache_name("prod"))?.expect("artifact rewritten");
    let artifact = decode_artifact(&cache_name("prod"), &stored)?;
    assert_eq!(artifact.parameters.get("greeting.text"), Some(&serde_json::json!("Updated")));

    Ok(())
}
