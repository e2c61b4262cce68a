
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::container::factory::{FactoryRegistry, ServiceInstance};

/// Value built by the `greeter` test factory
#[derive(Debug)]
pub(crate) struct Greeter {
    pub greeting: String,
}

/// Value built by the `counter` test factory; wraps the greeter it depends on
#[derive(Debug)]
pub(crate) struct Counter {
    pub greeter: Arc<Greeter>,
}

/// Factories used across the container tests. `greeter` counts its
/// invocations in `built`.
pub(crate) fn test_factories(built: Arc<AtomicUsize>) -> Arc<FactoryRegistry> {
    let mut factories = FactoryRegistry::new();
    factories.register("greeter", move |args| {
        built.fetch_add(1, Ordering::SeqCst);
        let greeting: String = args.value(0)?;
        Ok(Arc::new(Greeter { greeting }) as ServiceInstance)
    });
    factories.register("counter", |args| {
        let greeter = args.service::<Greeter>(0)?;
        Ok(Arc::new(Counter { greeter }) as ServiceInstance)
    });
    Arc::new(factories)
}
