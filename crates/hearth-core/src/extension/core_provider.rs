use std::sync::Arc;

use crate::container::{Argument, ContainerBuilder, FactoryRegistry, ServiceDefinition, ServiceInstance};
use crate::extension::provider::ServiceProvider;
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::page_cache;
use crate::session::SessionHelper;
use crate::site::Settings;

/// Factory building the `session.helper` service from `@settings`
pub const SESSION_HELPER_FACTORY: &str = "session.helper";

/// Services every container has, registered ahead of module providers
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreServiceProvider;

impl CoreServiceProvider {
    pub const NAME: &'static str = "CoreServiceProvider";

    /// Factories the core definitions refer to
    pub fn register_factories(factories: &mut FactoryRegistry) {
        factories.register(SESSION_HELPER_FACTORY, |args| {
            let settings: Arc<Settings> = args.service(0)?;
            Ok(Arc::new(SessionHelper::new(&settings)) as ServiceInstance)
        });
        page_cache::register_factories(factories);
    }
}

impl ServiceProvider for CoreServiceProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn register(&self, container: &mut ContainerBuilder) -> Result<()> {
        for id in [
            constants::SERVICE_CONTAINER,
            constants::SERVICE_KERNEL,
            constants::SERVICE_CLASS_LOADER,
            constants::SERVICE_SETTINGS,
            constants::SERVICE_CONFIG_STORAGE,
            constants::SERVICE_HTTP_KERNEL,
        ] {
            container.register(id, ServiceDefinition::synthetic().with_origin(Self::NAME));
        }
        container.register(
            "session.helper",
            ServiceDefinition::new(SESSION_HELPER_FACTORY)
                .with_argument(Argument::Service(constants::SERVICE_SETTINGS.to_string()))
                .with_origin(Self::NAME),
        );
        container.register(
            constants::SERVICE_PAGE_CACHE,
            ServiceDefinition::new(page_cache::FILE_PAGE_CACHE_FACTORY)
                .with_argument(Argument::Parameter(constants::PARAM_APP_ROOT.to_string()))
                .with_argument(Argument::Parameter(constants::PARAM_SITE_PATH.to_string()))
                .with_origin(Self::NAME),
        );
        Ok(())
    }
}
