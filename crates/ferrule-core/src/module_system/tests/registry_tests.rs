use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use semver::Version;

use crate::event::dispatcher::EventDispatcher;
use crate::event::types::ModuleEventKind;
use crate::module_system::context::ModuleContext;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::manifest::ModuleManifest;
use crate::module_system::module::ModuleState;
use crate::module_system::registry::ModuleRegistry;
use crate::module_system::traits::{ActivatorError, ModuleActivator};
use crate::service_registry::{ServiceProperties, ServiceRegistry};

fn new_registry() -> (ModuleRegistry, ServiceRegistry, Arc<EventDispatcher>) {
    let dispatcher = Arc::new(EventDispatcher::new());
    let services = ServiceRegistry::new(Arc::clone(&dispatcher));
    let modules = ModuleRegistry::new(services.clone(), Arc::clone(&dispatcher));
    (modules, services, dispatcher)
}

fn manifest(name: &str) -> ModuleManifest {
    ModuleManifest::new(name, Version::new(1, 0, 0))
}

/// Activator that appends "load:<name>"/"unload:<name>" to a shared log and
/// optionally registers a service or fails on demand.
struct RecordingActivator {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    register_interface: Option<&'static str>,
    fail_load: bool,
    fail_unload: bool,
}

impl ModuleActivator for RecordingActivator {
    fn load(&mut self, context: &ModuleContext) -> Result<(), ActivatorError> {
        if self.fail_load {
            return Err(ActivatorError::new("load refused"));
        }
        if let Some(interface) = self.register_interface {
            context.register_service(interface, Arc::new(self.name.clone()), ServiceProperties::new());
        }
        self.log.lock().unwrap().push(format!("load:{}", self.name));
        Ok(())
    }

    fn unload(&mut self, _context: &ModuleContext) -> Result<(), ActivatorError> {
        self.log.lock().unwrap().push(format!("unload:{}", self.name));
        if self.fail_unload {
            return Err(ActivatorError::new("unload refused"));
        }
        Ok(())
    }
}

fn install_recording(
    registry: &ModuleRegistry,
    manifest: ModuleManifest,
    log: &Arc<Mutex<Vec<String>>>,
) {
    install_recording_with(registry, manifest, log, None, false, false);
}

fn install_recording_with(
    registry: &ModuleRegistry,
    manifest: ModuleManifest,
    log: &Arc<Mutex<Vec<String>>>,
    register_interface: Option<&'static str>,
    fail_load: bool,
    fail_unload: bool,
) {
    let name = manifest.symbolic_name().to_string();
    let log = Arc::clone(log);
    registry
        .install_with_activator(
            manifest,
            Box::new(move || {
                Box::new(RecordingActivator {
                    name: name.clone(),
                    log: Arc::clone(&log),
                    register_interface,
                    fail_load,
                    fail_unload,
                })
            }),
        )
        .unwrap();
}

#[test]
fn duplicate_symbolic_name_is_rejected() {
    let (registry, _services, _dispatcher) = new_registry();
    registry.install(manifest("org.app.core")).unwrap();
    assert!(matches!(
        registry.install(manifest("org.app.core")),
        Err(ModuleSystemError::DuplicateSymbolicName(name)) if name == "org.app.core"
    ));
    assert_eq!(registry.module_count(), 1);
}

#[test]
fn install_resolve_start_walks_the_state_machine() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);

    let module = registry.get_module("org.app.core").unwrap();
    assert_eq!(module.state(), ModuleState::Installed);

    registry.resolve("org.app.core").unwrap();
    assert_eq!(module.state(), ModuleState::Resolved);

    registry.start("org.app.core").unwrap();
    assert_eq!(module.state(), ModuleState::Active);
    assert_eq!(*log.lock().unwrap(), vec!["load:org.app.core"]);

    // Starting again is a no-op: the activator is not re-created.
    registry.start("org.app.core").unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn start_pulls_up_dependencies_in_order() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.ui").require("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.tool").require("org.app.ui"), &log);

    registry.start("org.app.tool").unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["load:org.app.core", "load:org.app.ui", "load:org.app.tool"]
    );
    for name in ["org.app.core", "org.app.ui", "org.app.tool"] {
        assert_eq!(registry.get_module(name).unwrap().state(), ModuleState::Active);
    }
}

#[test]
fn stop_refuses_while_dependents_are_active() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.ui").require("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.tool").require("org.app.ui"), &log);
    registry.start("org.app.tool").unwrap();

    match registry.stop("org.app.core", false) {
        Err(ModuleSystemError::DependentModulesActive { module, dependents }) => {
            assert_eq!(module, "org.app.core");
            assert_eq!(dependents, ["org.app.tool", "org.app.ui"]);
        }
        other => panic!("expected dependent refusal, got {:?}", other),
    }
    // Nothing changed.
    assert_eq!(
        registry.get_module("org.app.tool").unwrap().state(),
        ModuleState::Active
    );
    assert!(!log.lock().unwrap().iter().any(|entry| entry.starts_with("unload")));
}

#[test]
fn forced_stop_cascades_dependents_first() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.ui").require("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.tool").require("org.app.ui"), &log);
    registry.start("org.app.tool").unwrap();
    log.lock().unwrap().clear();

    registry.stop("org.app.core", true).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["unload:org.app.tool", "unload:org.app.ui", "unload:org.app.core"]
    );
    for name in ["org.app.core", "org.app.ui", "org.app.tool"] {
        assert_eq!(
            registry.get_module(name).unwrap().state(),
            ModuleState::Resolved
        );
    }
}

#[test]
fn stopped_module_can_start_again_with_a_fresh_activator() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);

    registry.start("org.app.core").unwrap();
    registry.stop("org.app.core", false).unwrap();
    registry.start("org.app.core").unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["load:org.app.core", "unload:org.app.core", "load:org.app.core"]
    );
}

#[test]
fn dependency_cycle_fails_start_without_state_change() {
    let (registry, _services, _dispatcher) = new_registry();
    registry
        .install(manifest("org.app.a").require("org.app.b"))
        .unwrap();
    registry
        .install(manifest("org.app.b").require("org.app.a"))
        .unwrap();

    assert!(matches!(
        registry.start("org.app.a"),
        Err(ModuleSystemError::Dependency(_))
    ));
    assert_eq!(
        registry.get_module("org.app.a").unwrap().state(),
        ModuleState::Installed
    );
    assert_eq!(
        registry.get_module("org.app.b").unwrap().state(),
        ModuleState::Installed
    );
}

#[test]
fn missing_dependency_fails_resolution() {
    let (registry, _services, _dispatcher) = new_registry();
    registry
        .install(manifest("org.app.a").require("org.app.ghost"))
        .unwrap();

    assert!(matches!(
        registry.resolve("org.app.a"),
        Err(ModuleSystemError::Dependency(_))
    ));
    assert!(matches!(
        registry.start("org.app.a"),
        Err(ModuleSystemError::Dependency(_))
    ));
}

#[test]
fn unknown_module_is_reported() {
    let (registry, _services, _dispatcher) = new_registry();
    assert!(matches!(
        registry.start("org.app.ghost"),
        Err(ModuleSystemError::ModuleNotFound(name)) if name == "org.app.ghost"
    ));
}

#[test]
fn activator_failure_rolls_back_and_blocks_dependents() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);
    install_recording_with(
        &registry,
        manifest("org.app.broken").require("org.app.core"),
        &log,
        None,
        true,
        false,
    );
    install_recording(
        &registry,
        manifest("org.app.tool").require("org.app.broken"),
        &log,
    );

    match registry.start("org.app.tool") {
        Err(ModuleSystemError::ActivatorFailed { module, .. }) => {
            assert_eq!(module, "org.app.broken");
        }
        other => panic!("expected activator failure, got {:?}", other),
    }

    // The dependency chain stopped at the failure: core is up, the broken
    // module rolled back, the dependent never started.
    assert_eq!(
        registry.get_module("org.app.core").unwrap().state(),
        ModuleState::Active
    );
    assert_eq!(
        registry.get_module("org.app.broken").unwrap().state(),
        ModuleState::Resolved
    );
    assert_eq!(
        registry.get_module("org.app.tool").unwrap().state(),
        ModuleState::Resolved
    );
    assert_eq!(*log.lock().unwrap(), vec!["load:org.app.core"]);
}

#[test]
fn unload_failure_does_not_prevent_the_stop() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording_with(&registry, manifest("org.app.core"), &log, None, false, true);

    registry.start("org.app.core").unwrap();
    registry.stop("org.app.core", false).unwrap();

    assert_eq!(
        registry.get_module("org.app.core").unwrap().state(),
        ModuleState::Resolved
    );
}

#[test]
fn stop_unregisters_the_module_services() {
    let (registry, services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording_with(
        &registry,
        manifest("org.app.core"),
        &log,
        Some("app.greeter"),
        false,
        false,
    );

    registry.start("org.app.core").unwrap();
    let reference = services.get_service_reference("app.greeter", None).unwrap();
    assert!(!reference.is_stale());

    registry.stop("org.app.core", false).unwrap();

    assert!(services.get_service_reference("app.greeter", None).is_none());
    assert!(reference.is_stale());
}

#[test]
fn stopping_a_module_that_is_not_active_is_a_noop() {
    let (registry, _services, _dispatcher) = new_registry();
    registry.install(manifest("org.app.core")).unwrap();
    registry.stop("org.app.core", false).unwrap();
    assert_eq!(
        registry.get_module("org.app.core").unwrap().state(),
        ModuleState::Installed
    );
}

#[test]
fn uninstall_frees_the_symbolic_name() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);
    registry.start("org.app.core").unwrap();

    let handle = registry.get_module("org.app.core").unwrap();
    registry.uninstall("org.app.core", false).unwrap();

    // An outstanding handle observes the terminal state.
    assert_eq!(handle.state(), ModuleState::Uninstalled);
    assert!(registry.get_module("org.app.core").is_none());
    assert_eq!(*log.lock().unwrap(), vec!["load:org.app.core", "unload:org.app.core"]);

    // The name is reusable.
    registry.install(manifest("org.app.core")).unwrap();
    assert_eq!(registry.module_count(), 1);
}

#[test]
fn uninstall_respects_active_dependents() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.ui").require("org.app.core"), &log);
    registry.start("org.app.ui").unwrap();

    assert!(matches!(
        registry.uninstall("org.app.core", false),
        Err(ModuleSystemError::DependentModulesActive { .. })
    ));
    assert_eq!(registry.module_count(), 2);

    registry.uninstall("org.app.core", true).unwrap();
    assert!(registry.get_module("org.app.core").is_none());
    assert_eq!(
        registry.get_module("org.app.ui").unwrap().state(),
        ModuleState::Resolved
    );
}

#[test]
fn stop_all_takes_everything_down_dependents_first() {
    let (registry, _services, _dispatcher) = new_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.ui").require("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.solo"), &log);
    registry.start("org.app.ui").unwrap();
    registry.start("org.app.solo").unwrap();
    log.lock().unwrap().clear();

    registry.stop_all();

    let log = log.lock().unwrap();
    let pos = |entry: &str| log.iter().position(|e| e == entry).unwrap();
    assert_eq!(log.len(), 3);
    assert!(pos("unload:org.app.ui") < pos("unload:org.app.core"));
    for module in registry.modules() {
        assert_eq!(module.state(), ModuleState::Resolved);
    }
}

#[test]
fn lifecycle_events_arrive_in_order_after_each_operation() {
    let (registry, _services, dispatcher) = new_registry();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        dispatcher.add_module_listener(None, move |event| {
            seen.lock()
                .unwrap()
                .push(format!("{}:{}", event.kind().name(), event.module()));
        });
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    install_recording(&registry, manifest("org.app.core"), &log);
    install_recording(&registry, manifest("org.app.ui").require("org.app.core"), &log);
    registry.start("org.app.ui").unwrap();
    registry.stop("org.app.ui", false).unwrap();
    registry.uninstall("org.app.ui", false).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "module.installed:org.app.core",
            "module.installed:org.app.ui",
            "module.resolved:org.app.core",
            "module.started:org.app.core",
            "module.resolved:org.app.ui",
            "module.started:org.app.ui",
            "module.stopped:org.app.ui",
            "module.uninstalled:org.app.ui",
        ]
    );
}

#[test]
fn module_listener_scoped_to_one_module() {
    let (registry, _services, dispatcher) = new_registry();
    let hit = Arc::new(AtomicBool::new(false));
    {
        let hit = Arc::clone(&hit);
        dispatcher.add_module_listener(Some("org.app.ui"), move |event| {
            assert_eq!(event.module(), "org.app.ui");
            if event.kind() == ModuleEventKind::Installed {
                hit.store(true, Ordering::SeqCst);
            }
        });
    }

    registry.install(manifest("org.app.core")).unwrap();
    assert!(!hit.load(Ordering::SeqCst));
    registry.install(manifest("org.app.ui")).unwrap();
    assert!(hit.load(Ordering::SeqCst));
}

#[test]
fn activatorless_module_activates_trivially() {
    let (registry, _services, _dispatcher) = new_registry();
    registry.install(manifest("org.app.data")).unwrap();
    registry.start("org.app.data").unwrap();
    assert_eq!(
        registry.get_module("org.app.data").unwrap().state(),
        ModuleState::Active
    );
}

#[test]
fn context_reports_module_metadata() {
    let (registry, _services, _dispatcher) = new_registry();
    registry.install(manifest("org.app.core")).unwrap();
    let module = registry.get_module("org.app.core").unwrap();
    let context = module.context().clone();

    assert_eq!(context.symbolic_name(), "org.app.core");
    assert_eq!(context.module_version(), Some(Version::new(1, 0, 0)));
    assert_eq!(context.module_state(), ModuleState::Installed);

    registry.start("org.app.core").unwrap();
    assert_eq!(context.module_state(), ModuleState::Active);

    registry.uninstall("org.app.core", false).unwrap();
    drop(module);
    assert_eq!(context.module_state(), ModuleState::Uninstalled);
}
