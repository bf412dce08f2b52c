//! Minimal dynamically loaded module: publishes a greeter service while the
//! module is active and takes it down again on stop.

use std::sync::Arc;

use ferrule_core::module_system::{ActivatorError, ModuleActivator, ModuleContext};
use ferrule_core::service_registry::{ServiceProperties, ServiceRegistration};

/// Interface identity the greeter is published under.
pub const GREETER_INTERFACE: &str = "example.greeter";

/// The service implementation. Consumers downcast to this type after looking
/// up `example.greeter`.
pub struct Greeter {
    greeting: String,
}

impl Greeter {
    pub fn greet(&self, who: &str) -> String {
        format!("{}, {}!", self.greeting, who)
    }
}

#[derive(Default)]
struct HelloServiceActivator {
    registration: Option<ServiceRegistration>,
}

impl ModuleActivator for HelloServiceActivator {
    fn load(&mut self, context: &ModuleContext) -> Result<(), ActivatorError> {
        let greeter = Arc::new(Greeter {
            greeting: "Hello".to_string(),
        });
        let registration = context.register_service(
            GREETER_INTERFACE,
            greeter,
            ServiceProperties::new().with("lang", "en"),
        );
        log::info!(
            "{} published '{}' as service #{}",
            context.symbolic_name(),
            GREETER_INTERFACE,
            registration.id()
        );
        self.registration = Some(registration);
        Ok(())
    }

    fn unload(&mut self, context: &ModuleContext) -> Result<(), ActivatorError> {
        if let Some(registration) = self.registration.take() {
            // The registry would clean this up after unload as well; doing it
            // here keeps the Unregistering event ahead of the module's Stopped
            // event.
            registration
                .unregister()
                .map_err(|err| ActivatorError::new(err.to_string()))?;
        }
        log::info!("{} unloaded", context.symbolic_name());
        Ok(())
    }
}

ferrule_core::export_activator!(HelloServiceActivator::default());
