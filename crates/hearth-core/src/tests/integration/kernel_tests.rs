#![cfg(test)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::common::{Greeting, SiteFixture, VisitCounter, request};
use crate::extension::ModuleList;
use crate::kernel::constants;
use crate::kernel::error::Result;

#[tokio::test]
async fn test_handle_dispatches_to_http_kernel() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());

    let response = kernel.handle(&request("/node/1")).await?;

    assert!(kernel.is_booted(), "handle boots on demand");
    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), "path=node/1");
    assert_eq!(response.header(constants::CACHE_STATUS_HEADER), None, "No cache header without page cache");
    assert_eq!(fixture.http_kernel.handled(), 1);
    assert_eq!(kernel.request_context().map(|c| c.request().uri()), Some("/node/1"));

    Ok(())
}

#[tokio::test]
async fn test_terminate_forwards_to_terminable_kernel() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());

    let early = request("/early");
    kernel.terminate(&early, &crate::http::Response::ok("")).await?;
    assert!(fixture.http_kernel.terminated().is_empty(), "terminate before boot is a no-op");

    let req = request("/missing");
    let response = kernel.handle(&req).await?;
    kernel.terminate(&req, &response).await?;

    assert_eq!(fixture.http_kernel.terminated(), vec![("/missing".to_string(), 404)]);

    Ok(())
}

#[test]
fn test_module_services_and_parameters() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;
    let container = kernel.container().expect("booted kernel has a container");

    assert_eq!(container.get_as::<Greeting>("greeting")?.0, "Hello");
    assert_eq!(
        container.parameter_as::<String>("greeting.provider").as_deref(),
        Some("GreetingServiceProvider")
    );

    let modules = container.parameter(constants::PARAM_MODULES).expect("modules parameter");
    let names: Vec<&str> = modules.as_object().expect("object").keys().map(String::as_str).collect();
    assert_eq!(names, vec!["greeting", "system"], "Load order is weight then name");
    assert_eq!(modules["greeting"]["pathname"], "modules/greeting/greeting.info.yml");
    assert_eq!(modules["greeting"]["filename"], "greeting.info.yml");
    assert_eq!(modules["system"]["type"], "module");

    assert_eq!(
        kernel.class_loader().source_dir("greeting"),
        Some(PathBuf::from("modules/greeting/src"))
    );
    assert_eq!(
        container.parameter_as::<String>(constants::PARAM_SITE_PATH).as_deref(),
        Some("sites/default")
    );

    Ok(())
}

#[test]
fn test_update_modules_rebuilds_booted_container() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;
    let before = kernel.container().expect("booted kernel has a container");
    assert!(before.has("greeting"));

    kernel.update_modules(ModuleList::from_weights([("system", 0)]), HashMap::new())?;

    let after = kernel.container().expect("container rebuilt");
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(!after.has("greeting"), "Services of the removed module are gone");
    let modules = after.parameter(constants::PARAM_MODULES).expect("modules parameter");
    assert_eq!(modules.as_object().map(|m| m.len()), Some(1));

    Ok(())
}

#[test]
fn test_update_modules_before_boot_is_used_by_boot() -> Result<()> {
    let fixture = SiteFixture::new();
    fixture.write("elsewhere/extra/extra.info.yml", "name: Extra\n");
    let mut kernel = fixture.kernel(fixture.options());

    let filenames = HashMap::from([("extra".to_string(), PathBuf::from("elsewhere/extra/extra.info.yml"))]);
    kernel.update_modules(ModuleList::from_weights([("system", 0), ("extra", 5)]), filenames)?;
    assert!(kernel.container().is_none(), "Nothing is built before boot");

    kernel.boot()?;
    let container = kernel.container().expect("booted kernel has a container");
    let modules = container.parameter(constants::PARAM_MODULES).expect("modules parameter");
    assert_eq!(modules["extra"]["pathname"], "elsewhere/extra/extra.info.yml");
    assert!(!container.has("greeting"));

    Ok(())
}

#[test]
fn test_unknown_enabled_module_is_recorded_without_path() -> Result<()> {
    let fixture = SiteFixture::new();
    fixture.enable_modules(&[("system", 0), ("ghost", 1)]);
    let mut kernel = fixture.kernel(fixture.options());

    kernel.boot()?;
    let container = kernel.container().expect("booted kernel has a container");
    let modules = container.parameter(constants::PARAM_MODULES).expect("modules parameter");
    assert!(modules["ghost"]["pathname"].is_null());

    Ok(())
}

#[test]
fn test_persisted_services_survive_rebuild() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;
    let before = kernel.container().expect("booted kernel has a container");

    let counter = before.get_as::<VisitCounter>("visit_counter")?;
    counter.hit();
    counter.hit();
    let greeting = before.get_as::<Greeting>("greeting")?;

    let after = kernel.rebuild_container()?;
    assert!(!Arc::ptr_eq(&before, &after));

    let carried = after.get_as::<VisitCounter>("visit_counter")?;
    assert!(Arc::ptr_eq(&counter, &carried), "Persisted instance is carried over");
    assert_eq!(carried.hit(), 3);

    let rebuilt = after.get_as::<Greeting>("greeting")?;
    assert!(!Arc::ptr_eq(&greeting, &rebuilt), "Other services are rebuilt");
    assert!(kernel.is_booted());

    Ok(())
}

#[test]
fn test_uninitialized_persisted_services_are_not_created() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;

    let after = kernel.rebuild_container()?;
    assert!(!after.initialized("visit_counter"));

    Ok(())
}

#[test]
fn test_request_context_follows_rebuilt_container() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;
    kernel.pre_handle(&request("/node"))?;

    kernel.update_modules(ModuleList::from_weights([("system", 0)]), HashMap::new())?;

    let current = kernel.container().expect("rebuilt container");
    let scoped = kernel.request_context().expect("request scope is kept").container().clone();
    assert!(Arc::ptr_eq(&scoped, &current));
    assert!(!scoped.has("greeting"), "Removed module services are gone from the request scope");
    assert_eq!(
        kernel.request_context().map(|c| c.request().uri()),
        Some("/node")
    );

    let rebuilt = kernel.rebuild_container()?;
    let scoped = kernel.request_context().expect("request scope is kept").container().clone();
    assert!(Arc::ptr_eq(&scoped, &rebuilt));

    Ok(())
}

#[test]
fn test_rebuild_entry_requires_access() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;

    let response = kernel.handle_rebuild(&request(constants::REBUILD_PATH), 1_000)?;

    assert_eq!(response.status(), 403);
    assert_eq!(fixture.registrations.load(std::sync::atomic::Ordering::SeqCst), 1);

    Ok(())
}

#[test]
fn test_rebuild_entry_with_signed_token() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());
    kernel.boot()?;

    let token = crate::kernel::rebuild::RebuildToken::sign("fixture-salt", 1_000)?;
    let uri = format!("{}?{}", constants::REBUILD_PATH, token.to_query());
    let response = kernel.handle_rebuild(&request(&uri), 1_010)?;

    assert_eq!(response.status(), 302);
    assert_eq!(response.header("Location"), Some("http://example.com/"));
    assert_eq!(fixture.registrations.load(std::sync::atomic::Ordering::SeqCst), 2);

    let expired = kernel.handle_rebuild(&request(&uri), 1_000 + 3_600)?;
    assert_eq!(expired.status(), 403);

    Ok(())
}

#[test]
fn test_rebuild_entry_with_rebuild_access() -> Result<()> {
    let fixture = SiteFixture::new();
    fixture.write_settings("rebuild_access = true", true);
    let mut kernel = fixture.kernel(fixture.options());

    let response = kernel.handle_rebuild(&request(constants::REBUILD_PATH), 1_000)?;

    assert_eq!(response.status(), 302);
    assert!(kernel.container().is_some_and(|c| c.has("greeting")));

    Ok(())
}
