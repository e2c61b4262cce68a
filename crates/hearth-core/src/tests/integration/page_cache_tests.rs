#![cfg(test)]

use super::common::{SiteFixture, request};
use crate::http::{Request, RequestGlobals};
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::kernel::{BootStatus, PageCacheOutcome};

fn cached_fixture() -> SiteFixture {
    let fixture = SiteFixture::new();
    fixture.write_settings("page_cache_without_database = true", true);
    fixture
}

#[tokio::test]
async fn test_miss_then_hit() -> Result<()> {
    let fixture = cached_fixture();
    let mut kernel = fixture.kernel(fixture.options());
    let req = request("/node/7");

    assert_eq!(kernel.handle_page_cache(&req)?, PageCacheOutcome::Miss);
    let response = kernel.handle(&req).await?;
    assert_eq!(response.body(), "path=node/7");
    assert_eq!(response.header(constants::CACHE_STATUS_HEADER), Some("MISS"));
    assert_eq!(fixture.http_kernel.handled(), 1);

    match kernel.handle_page_cache(&req)? {
        PageCacheOutcome::Hit(cached) => {
            assert_eq!(cached.body(), "path=node/7");
            assert_eq!(cached.header(constants::CACHE_STATUS_HEADER), Some("HIT"));
        }
        other => panic!("Expected a page cache hit, got {:?}", other),
    }
    assert_eq!(fixture.http_kernel.handled(), 1, "A hit never reaches the HTTP kernel");

    Ok(())
}

#[tokio::test]
async fn test_cached_page_survives_a_new_kernel() -> Result<()> {
    let fixture = cached_fixture();
    let req = request("/about");

    let mut first = fixture.kernel(fixture.options());
    assert_eq!(first.handle_page_cache(&req)?, PageCacheOutcome::Miss);
    first.handle(&req).await?;

    let mut second = fixture.kernel(fixture.options());
    assert!(matches!(second.handle_page_cache(&req)?, PageCacheOutcome::Hit(_)));

    Ok(())
}

#[tokio::test]
async fn test_not_found_is_not_stored() -> Result<()> {
    let fixture = cached_fixture();
    let mut kernel = fixture.kernel(fixture.options());
    let req = request("/missing");

    assert_eq!(kernel.handle_page_cache(&req)?, PageCacheOutcome::Miss);
    let response = kernel.handle(&req).await?;
    assert_eq!(response.status(), 404);
    assert_eq!(response.header(constants::CACHE_STATUS_HEADER), Some("MISS"));

    assert_eq!(kernel.handle_page_cache(&req)?, PageCacheOutcome::Miss);

    Ok(())
}

#[test]
fn test_post_bypasses_cache() -> Result<()> {
    let fixture = cached_fixture();
    let mut kernel = fixture.kernel(fixture.options());
    let req = Request::new("POST", "/node/7").with_host("example.com");

    assert_eq!(kernel.handle_page_cache(&req)?, PageCacheOutcome::Bypassed);

    Ok(())
}

#[test]
fn test_session_cookie_bypasses_cache() -> Result<()> {
    let fixture = cached_fixture();
    let mut kernel = fixture.kernel(fixture.options());
    let anonymous = request("/node/7");
    let session_name = RequestGlobals::from_request(&anonymous, None, None)?.session_name;
    let authenticated = request("/node/7").with_cookie(session_name, "abc123");

    assert_eq!(kernel.handle_page_cache(&authenticated)?, PageCacheOutcome::Bypassed);

    let unrelated = request("/node/7").with_cookie("has_js", "1");
    assert_eq!(kernel.handle_page_cache(&unrelated)?, PageCacheOutcome::Miss);

    Ok(())
}

#[tokio::test]
async fn test_disabled_cache_is_bypassed() -> Result<()> {
    let fixture = SiteFixture::new();
    let mut kernel = fixture.kernel(fixture.options());
    let req = request("/node/7");

    assert_eq!(kernel.handle_page_cache(&req)?, PageCacheOutcome::Bypassed);
    let response = kernel.handle(&req).await?;
    assert_eq!(response.header(constants::CACHE_STATUS_HEADER), None);

    Ok(())
}

#[test]
fn test_enabled_through_performance_config() -> Result<()> {
    let fixture = SiteFixture::new();
    fixture.write(
        "sites/default/files/config/system.performance.yml",
        "cache:\n  page:\n    use_internal: true\n",
    );
    let mut kernel = fixture.kernel(fixture.options());

    assert_eq!(kernel.handle_page_cache(&request("/node/7"))?, PageCacheOutcome::Miss);

    Ok(())
}

#[test]
fn test_install_required_bypasses_cache() -> Result<()> {
    let fixture = SiteFixture::new();
    fixture.write_settings("page_cache_without_database = true", false);
    let mut kernel = fixture.kernel(fixture.options());

    assert_eq!(kernel.handle_page_cache(&request("/node/7"))?, PageCacheOutcome::Bypassed);
    assert!(matches!(kernel.boot()?, BootStatus::InstallRequired(_)));

    Ok(())
}

#[tokio::test]
async fn test_test_only_kernel_never_serves_cached_pages_to_visitors() -> Result<()> {
    let fixture = cached_fixture();
    let mut kernel = fixture.kernel(fixture.options().test_only(true));
    let harness = request("/node/7").with_user_agent("simpletest42");

    assert_eq!(kernel.handle_page_cache(&harness)?, PageCacheOutcome::Miss);
    kernel.handle(&harness).await?;
    assert!(matches!(kernel.handle_page_cache(&harness)?, PageCacheOutcome::Hit(_)));

    let visitor = request("/node/7");
    assert_eq!(kernel.handle_page_cache(&visitor)?, PageCacheOutcome::Bypassed);
    assert_eq!(kernel.handle(&visitor).await?.status(), 403);

    Ok(())
}
