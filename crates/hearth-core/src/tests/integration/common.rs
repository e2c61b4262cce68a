#![cfg(test)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tempfile::{TempDir, tempdir};

use crate::container::{Argument, ContainerBuilder, ServiceDefinition, ServiceInstance};
use crate::extension::{ProviderCatalog, ServiceProvider};
use crate::http::{HttpKernel, Request, RequestContext, Response, Terminable};
use crate::kernel::error::Result;
use crate::kernel::{BootContext, Kernel, KernelOptions};

pub const SITE: &str = "sites/default";

// ===== MOCK SERVICES =====

/// Built by the `greeting.message` factory
#[derive(Debug)]
pub struct Greeting(pub String);

/// Built by the `visit.counter` factory; tagged `persist` in the module file
#[derive(Debug, Default)]
pub struct VisitCounter(pub AtomicUsize);

impl VisitCounter {
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

// ===== MOCK PROVIDERS =====

/// Provider shipped by the `greeting` module. Counts its registrations so
/// tests can tell a rebuilt container from a cached one.
pub struct GreetingServiceProvider {
    pub name: &'static str,
    pub registrations: Arc<AtomicUsize>,
}

impl ServiceProvider for GreetingServiceProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn register(&self, container: &mut ContainerBuilder) -> Result<()> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        container.set_parameter("greeting.provider", json!(self.name));
        Ok(())
    }
}

/// Site-specific provider replacing the `greeting` service
pub struct SiteOverridesProvider;

impl ServiceProvider for SiteOverridesProvider {
    fn name(&self) -> &str {
        "SiteOverrides"
    }

    fn register(&self, container: &mut ContainerBuilder) -> Result<()> {
        container.register(
            "greeting",
            ServiceDefinition::new("greeting.message")
                .with_argument(Argument::Value(json!("Howdy")))
                .with_origin(self.name()),
        );
        Ok(())
    }
}

// ===== MOCK HTTP KERNEL =====

/// Answers `path=<internal path>`, 404 for `missing`, and records every
/// terminate call as `(uri, status)`
#[derive(Default)]
pub struct RecordingHttpKernel {
    pub handled: AtomicUsize,
    pub terminated: Mutex<Vec<(String, u16)>>,
}

impl RecordingHttpKernel {
    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> Vec<(String, u16)> {
        self.terminated.lock().expect("terminate log lock").clone()
    }
}

#[async_trait]
impl HttpKernel for RecordingHttpKernel {
    async fn handle(&self, context: &RequestContext) -> Result<Response> {
        self.handled.fetch_add(1, Ordering::SeqCst);
        let path = context.request_path();
        if path == "missing" {
            return Ok(Response::new(404, "Not found"));
        }
        Ok(Response::ok(format!("path={}", path)).with_header("Content-Type", "text/plain"))
    }

    fn terminable(&self) -> Option<&dyn Terminable> {
        Some(self)
    }
}

#[async_trait]
impl Terminable for RecordingHttpKernel {
    async fn terminate(&self, request: &Request, response: &Response) -> Result<()> {
        self.terminated
            .lock()
            .expect("terminate log lock")
            .push((request.uri().to_string(), response.status()));
        Ok(())
    }
}

// ===== SITE FIXTURE =====

const GREETING_SERVICES: &str = r#"
parameters:
  greeting.text: Hello
services:
  greeting:
    factory: greeting.message
    arguments: ['%greeting.text%']
  visit_counter:
    factory: visit.counter
    tags: [persist]
"#;

/// An application root on disk: `system` and `greeting` modules, a default
/// site with a database and an active config directory enabling both.
pub struct SiteFixture {
    dir: TempDir,
    pub http_kernel: Arc<RecordingHttpKernel>,
    pub registrations: Arc<AtomicUsize>,
}

impl SiteFixture {
    pub fn new() -> Self {
        let fixture = Self {
            dir: tempdir().expect("Failed to create temp directory"),
            http_kernel: Arc::new(RecordingHttpKernel::default()),
            registrations: Arc::new(AtomicUsize::new(0)),
        };
        fixture.write("core/modules/system/system.info.yml", "name: System\ntype: module\n");
        fixture.write(
            "modules/greeting/greeting.info.yml",
            "name: Greeting\ntype: module\ncore_version_requirement: '^1'\n",
        );
        fixture.write("modules/greeting/greeting.services.yml", GREETING_SERVICES);
        fixture.enable_modules(&[("system", 0), ("greeting", 0)]);
        fixture.write_settings("", true);
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        fs::write(path, contents).expect("Failed to write fixture file");
    }

    /// Rewrite `settings.toml`; `extra` is appended to the `[settings]` table
    pub fn write_settings(&self, extra: &str, with_database: bool) {
        let mut toml = format!("[settings]\nhash_salt = \"fixture-salt\"\n{}\n\n", extra);
        toml.push_str("[config_directories]\nactive = \"sites/default/files/config\"\n");
        if with_database {
            toml.push_str("\n[databases.default.default]\ndriver = \"sqlite\"\ndatabase = \"sites/default/files/db.sqlite\"\n");
        }
        self.write("sites/default/settings.toml", &toml);
    }

    /// Write `core.extension` with the given module weights
    pub fn enable_modules(&self, modules: &[(&str, i64)]) {
        let mut yaml = String::from("module:\n");
        for (name, weight) in modules {
            yaml.push_str(&format!("  {}: {}\n", name, weight));
        }
        self.write("sites/default/files/config/core.extension.yml", &yaml);
    }

    /// Provider classes and factories the fixture's modules need
    pub fn catalog(&self) -> ProviderCatalog {
        let mut catalog = ProviderCatalog::new();
        let registrations = self.registrations.clone();
        catalog
            .register_module("greeting", move || {
                Arc::new(GreetingServiceProvider {
                    name: "GreetingServiceProvider",
                    registrations: registrations.clone(),
                })
            })
            .register_class("SiteOverrides", || Arc::new(SiteOverridesProvider))
            .register_factory("greeting.message", |args| {
                Ok(Arc::new(Greeting(args.value(0)?)) as ServiceInstance)
            })
            .register_factory("visit.counter", |_args| Ok(Arc::new(VisitCounter::default()) as ServiceInstance));
        catalog
    }

    pub fn options(&self) -> KernelOptions {
        KernelOptions::new("prod", self.http_kernel.clone()).with_catalog(self.catalog())
    }

    /// A fresh process context over the fixture root
    pub fn context(&self) -> Arc<BootContext> {
        BootContext::for_tests(self.root())
    }

    /// Command line style kernel for the default site
    pub fn kernel(&self, options: KernelOptions) -> Kernel {
        Kernel::for_site(self.context(), SITE, options).expect("Failed to create kernel")
    }
}

pub fn request(uri: &str) -> Request {
    Request::get(uri).with_host("example.com")
}
