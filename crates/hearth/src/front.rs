//! Pieces of the front controller that live outside the kernel: the
//! application's HTTP kernel and the last-resort failure page.
use async_trait::async_trait;
use hearth_core::http::HttpKernel;
use hearth_core::kernel::constants;
use hearth_core::storage::ConfigStorageHandle;
use hearth_core::{RequestContext, Response, Settings};

/// Renders the site name from `system.site` and the internal path
#[derive(Debug, Default)]
pub struct SiteKernel;

#[async_trait]
impl HttpKernel for SiteKernel {
    async fn handle(&self, context: &RequestContext) -> hearth_core::kernel::Result<Response> {
        let config = context
            .container()
            .get_as::<ConfigStorageHandle>(constants::SERVICE_CONFIG_STORAGE)?;
        let name = config
            .0
            .read("system.site")?
            .and_then(|site| site.get::<String>("name"))
            .unwrap_or_else(|| "Hearth".to_string());
        let path = context.request_path();
        let body = format!(
            "<html><head><title>{name}</title></head><body><h1>{name}</h1><p>/{path}</p></body></html>\n"
        );
        Ok(Response::ok(body).with_header("Content-Type", "text/html; charset=utf-8"))
    }
}

/// Minimal 500 page for errors escaping the kernel. Uses nothing but the
/// settings, which may be absent when the kernel never got that far. The
/// error itself is only logged. A rebuild link appears when `rebuild_access`
/// is on.
pub fn failure_response(settings: Option<&Settings>, base_url: &str) -> Response {
    let mut body = String::from("The website encountered an unexpected error. Try again later.\n");
    if settings.is_some_and(|settings| settings.is_enabled("rebuild_access")) {
        body.push_str(&format!(
            "If you have just changed code, you may want to rebuild: {}{}\n",
            base_url,
            constants::REBUILD_PATH
        ));
    }
    Response::new(500, body).with_header("Content-Type", "text/plain; charset=utf-8")
}
