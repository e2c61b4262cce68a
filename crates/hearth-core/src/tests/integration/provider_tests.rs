#![cfg(test)]

use std::sync::atomic::Ordering;

use super::common::{Greeting, SiteFixture};
use crate::container::ServiceDefinition;
use crate::extension::{ExtensionError, ServiceProvider};
use crate::kernel::constants;
use crate::kernel::error::{Error, Result};

#[test]
fn test_site_services_file_overrides_module_parameters() -> Result<()> {
    let fixture = SiteFixture::new();
    fixture.write(
        "sites/default/services.yml",
        "parameters:\n  greeting.text: Bonjour\n",
    );
    fixture.write_settings("container_yamls = [\"sites/default/services.yml\"]", true);

    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;
    let container = kernel.container().expect("booted kernel has a container");

    assert_eq!(container.get_as::<Greeting>("greeting")?.0, "Bonjour");

    Ok(())
}

#[test]
fn test_site_provider_wins_over_app_definitions() -> Result<()> {
    let fixture = SiteFixture::new();
    fixture.write(
        "sites/default/services.yml",
        "parameters:\n  greeting.text: Bonjour\n",
    );
    fixture.write_settings(
        "container_yamls = [\"sites/default/services.yml\"]\n\n[settings.container_service_providers]\noverrides = \"SiteOverrides\"",
        true,
    );

    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;
    let container = kernel.container().expect("booted kernel has a container");

    assert_eq!(container.get_as::<Greeting>("greeting")?.0, "Howdy");
    assert_eq!(
        container.definition("greeting").and_then(|d| d.origin.as_deref()),
        Some("SiteOverrides")
    );

    let providers = container
        .parameter(constants::PARAM_SERVICE_PROVIDERS)
        .expect("service providers parameter");
    assert_eq!(providers["app"][0], "CoreServiceProvider");
    assert_eq!(providers["app"][1], "GreetingServiceProvider");
    assert_eq!(providers["site"][0], "overrides");

    Ok(())
}

#[test]
fn test_get_service_providers_by_origin() -> Result<()> {
    let fixture = SiteFixture::new();
    fixture.write_settings("[settings.container_service_providers]\noverrides = \"SiteOverrides\"", true);
    let mut kernel = fixture.kernel(fixture.options());

    let app: Vec<String> = kernel
        .get_service_providers("app")?
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(app, vec!["CoreServiceProvider", "GreetingServiceProvider"]);

    let site = kernel.get_service_providers("site")?;
    assert_eq!(site.len(), 1);
    assert_eq!(site[0].name(), "SiteOverrides");

    assert!(matches!(
        kernel.get_service_providers("vendor"),
        Err(Error::ExtensionSystem(ExtensionError::UnknownOrigin(_)))
    ));

    Ok(())
}

#[test]
fn test_unknown_site_provider_class_fails_boot() {
    let fixture = SiteFixture::new();
    fixture.write_settings("[settings.container_service_providers]\nbroken = \"NoSuchProvider\"", true);
    let mut kernel = fixture.kernel(fixture.options());

    match kernel.boot() {
        Err(Error::ExtensionSystem(ExtensionError::UnknownProviderClass { name, class })) => {
            assert_eq!(name, "broken");
            assert_eq!(class, "NoSuchProvider");
        }
        other => panic!("Unexpected result: {:?}", other),
    }
    assert!(kernel.container().is_none());
}

/// A second module provider that reuses the greeting provider's name
struct Impostor;

impl ServiceProvider for Impostor {
    fn name(&self) -> &str {
        "GreetingServiceProvider"
    }

    fn register(&self, container: &mut crate::container::ContainerBuilder) -> Result<()> {
        container.register("impostor", ServiceDefinition::synthetic());
        Ok(())
    }
}

#[test]
fn test_duplicate_provider_keeps_previous_container() -> Result<()> {
    let fixture = SiteFixture::new();
    fixture.enable_modules(&[("greeting", 0)]);
    let mut catalog = fixture.catalog();
    catalog.register_module("system", || std::sync::Arc::new(Impostor));
    let mut kernel = fixture.kernel(fixture.options().with_catalog(catalog));

    kernel.boot()?;
    let before = kernel.container().expect("booted kernel has a container");

    let modules = crate::extension::ModuleList::from_weights([("greeting", 0), ("system", 0)]);
    let err = kernel
        .update_modules(modules, Default::default())
        .expect_err("duplicate provider name must fail the rebuild");
    match err {
        Error::ExtensionSystem(ExtensionError::DuplicateProvider { origin, name }) => {
            assert_eq!(origin, "app");
            assert_eq!(name, "GreetingServiceProvider");
        }
        other => panic!("Unexpected error: {:?}", other),
    }
    let after = kernel.container().expect("Failed rebuild keeps the previous container");
    assert!(std::sync::Arc::ptr_eq(&before, &after));
    assert_eq!(after.get_as::<Greeting>("greeting")?.0, "Hello");
    assert_eq!(fixture.registrations.load(Ordering::SeqCst), 1);

    assert!(kernel.is_booted());
    assert_eq!(kernel.boot()?, crate::kernel::BootStatus::Booted);
    assert!(kernel.container().is_some(), "boot() after a failed rebuild still has a container");

    let rebuilt = kernel.rebuild_container()?;
    assert!(!std::sync::Arc::ptr_eq(&before, &rebuilt), "Rejected module list is not retried");
    assert_eq!(fixture.registrations.load(Ordering::SeqCst), 2);

    Ok(())
}
