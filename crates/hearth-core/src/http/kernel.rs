use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::container::Container;
use crate::http::globals::RequestGlobals;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::url_policy::UrlPolicy;
use crate::kernel::error::Result;

/// Request-scoped data assembled by the kernel before dispatch
#[derive(Debug, Clone)]
pub struct RequestContext {
    request: Request,
    globals: Arc<RequestGlobals>,
    url_policy: UrlPolicy,
    container: Arc<Container>,
}

impl RequestContext {
    pub fn new(request: Request, globals: Arc<RequestGlobals>, url_policy: UrlPolicy, container: Arc<Container>) -> Self {
        Self {
            request,
            globals,
            url_policy,
            container,
        }
    }

    /// The current request
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn globals(&self) -> &RequestGlobals {
        &self.globals
    }

    pub fn url_policy(&self) -> &UrlPolicy {
        &self.url_policy
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Point the request scope at a rebuilt container
    pub(crate) fn set_container(&mut self, container: Arc<Container>) {
        self.container = container;
    }

    /// Internal path of the current request
    pub fn request_path(&self) -> String {
        self.globals.request_path(&self.request)
    }
}

/// Turns a request into a response. Supplied by the application and
/// registered as the `http_kernel` service.
#[async_trait]
pub trait HttpKernel: Send + Sync {
    async fn handle(&self, context: &RequestContext) -> Result<Response>;

    /// Post-response hook, if this kernel has one
    fn terminable(&self) -> Option<&dyn Terminable> {
        None
    }
}

/// Work to run after the response has been sent
#[async_trait]
pub trait Terminable: Send + Sync {
    async fn terminate(&self, request: &Request, response: &Response) -> Result<()>;
}

/// Container-storable handle around an [`HttpKernel`]
#[derive(Clone)]
pub struct HttpKernelHandle(pub Arc<dyn HttpKernel>);

impl HttpKernelHandle {
    pub fn new(kernel: Arc<dyn HttpKernel>) -> Self {
        Self(kernel)
    }

    pub fn kernel(&self) -> &Arc<dyn HttpKernel> {
        &self.0
    }
}

impl fmt::Debug for HttpKernelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HttpKernelHandle")
    }
}
