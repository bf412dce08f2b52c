//! # Ferrule Core Module Registry
//!
//! [`ModuleRegistry`] owns every installed module and drives the lifecycle
//! state machine: install, resolve, start, stop, uninstall. Starting a
//! module resolves and starts its transitive dependencies first; stopping
//! one refuses (or, with `force`, cascades over) active dependents.
//!
//! Lifecycle operations collect their module events while the module table
//! lock is held and dispatch them after it is released, so module listeners
//! never run under the registry's own lock. Events are flushed even when the
//! operation itself fails partway through. Service `Unregistering` events
//! produced by a stop ARE delivered while the module table lock is still
//! held: a service listener must not call back into the module registry, or
//! it will deadlock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::event::dispatcher::EventDispatcher;
use crate::event::types::{ModuleEvent, ModuleEventKind};
use crate::kernel::constants::DEFAULT_ACTIVATOR_SYMBOL;
use crate::module_system::dependency::DependencyGraph;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::loader::LibraryHandle;
use crate::module_system::manifest::ModuleManifest;
use crate::module_system::module::{Module, ModuleState};
use crate::module_system::traits::ActivatorFactory;
use crate::service_registry::ServiceRegistry;

struct RegistryShared {
    modules: Mutex<HashMap<String, Module>>,
    services: ServiceRegistry,
    dispatcher: Arc<EventDispatcher>,
}

/// Owner of all installed modules and their lifecycle transitions.
///
/// `ModuleRegistry` is a cheap clonable handle; every clone sees the same
/// module table. All operations are synchronous: when a call returns, the
/// state transitions and their events have fully happened.
#[derive(Clone)]
pub struct ModuleRegistry {
    shared: Arc<RegistryShared>,
}

impl ModuleRegistry {
    pub fn new(services: ServiceRegistry, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                modules: Mutex::new(HashMap::new()),
                services,
                dispatcher,
            }),
        }
    }

    /// Install a module without an activator. Such a module participates in
    /// dependency resolution and can be started, but activates trivially.
    pub fn install(&self, manifest: ModuleManifest) -> Result<Module, ModuleSystemError> {
        self.install_inner(manifest, None, None)
    }

    /// Install a statically linked module whose activator is produced by
    /// `factory` at each start.
    pub fn install_with_activator(
        &self,
        manifest: ModuleManifest,
        factory: ActivatorFactory,
    ) -> Result<Module, ModuleSystemError> {
        self.install_inner(manifest, Some(factory), None)
    }

    /// Install a dynamically loaded module. The activator entry point is
    /// resolved from `library` now (using the manifest's `ActivatorClass`
    /// header when present), so a bad symbol fails the install rather than
    /// a later start.
    pub fn install_from_library(
        &self,
        manifest: ModuleManifest,
        library: LibraryHandle,
    ) -> Result<Module, ModuleSystemError> {
        let symbol = manifest
            .activator_symbol()
            .unwrap_or(DEFAULT_ACTIVATOR_SYMBOL);
        let factory = library.activator_factory(symbol)?;
        self.install_inner(manifest, Some(factory), Some(library))
    }

    fn install_inner(
        &self,
        manifest: ModuleManifest,
        factory: Option<ActivatorFactory>,
        library: Option<LibraryHandle>,
    ) -> Result<Module, ModuleSystemError> {
        let symbolic_name = manifest.symbolic_name().to_string();
        let module = {
            let mut modules = self.shared.modules.lock().unwrap();
            if modules.contains_key(&symbolic_name) {
                return Err(ModuleSystemError::DuplicateSymbolicName(symbolic_name));
            }
            let module = Module::new(
                manifest,
                self.shared.services.clone(),
                Arc::clone(&self.shared.dispatcher),
                factory,
                library,
            );
            modules.insert(symbolic_name.clone(), module.clone());
            module
        };
        log::info!(
            "Installed module '{}' v{}",
            symbolic_name,
            module.version()
        );
        self.flush(vec![ModuleEvent::new(
            ModuleEventKind::Installed,
            &symbolic_name,
        )]);
        Ok(module)
    }

    /// Resolve a module: verify its transitive dependency closure is
    /// installed and acyclic, and move every `Installed` module in that
    /// closure to `Resolved`. Idempotent for already resolved modules.
    pub fn resolve(&self, name: &str) -> Result<(), ModuleSystemError> {
        let mut events = Vec::new();
        let result = self.resolve_locked(name, &mut events);
        self.flush(events);
        result
    }

    fn resolve_locked(
        &self,
        name: &str,
        events: &mut Vec<ModuleEvent>,
    ) -> Result<(), ModuleSystemError> {
        let modules = self.shared.modules.lock().unwrap();
        let target = modules
            .get(name)
            .ok_or_else(|| ModuleSystemError::ModuleNotFound(name.to_string()))?;
        if target.state() != ModuleState::Installed {
            return Ok(());
        }
        let order = Self::full_graph(&modules).resolution_order(name)?;
        for step in &order {
            let module = &modules[step];
            if module.state() == ModuleState::Installed {
                module.set_state(ModuleState::Resolved);
                events.push(ModuleEvent::new(ModuleEventKind::Resolved, step));
            }
        }
        Ok(())
    }

    /// Start a module, resolving and starting its transitive dependencies
    /// first, dependencies strictly before dependents. Starting an already
    /// active module is a no-op. If any activator in the chain fails, that
    /// module rolls back to `Resolved` and no dependent of it is started;
    /// modules already started stay active.
    pub fn start(&self, name: &str) -> Result<(), ModuleSystemError> {
        let mut events = Vec::new();
        let result = self.start_locked(name, &mut events);
        self.flush(events);
        result
    }

    fn start_locked(
        &self,
        name: &str,
        events: &mut Vec<ModuleEvent>,
    ) -> Result<(), ModuleSystemError> {
        let modules = self.shared.modules.lock().unwrap();
        let target = modules
            .get(name)
            .ok_or_else(|| ModuleSystemError::ModuleNotFound(name.to_string()))?;
        if target.state() == ModuleState::Active {
            return Ok(());
        }
        let order = Self::full_graph(&modules).resolution_order(name)?;
        for step in &order {
            let module = &modules[step];
            match module.state() {
                ModuleState::Active => continue,
                ModuleState::Installed => {
                    module.set_state(ModuleState::Resolved);
                    events.push(ModuleEvent::new(ModuleEventKind::Resolved, step));
                }
                ModuleState::Resolved => {}
                actual => {
                    return Err(ModuleSystemError::InvalidState {
                        module: step.clone(),
                        expected: ModuleState::Resolved,
                        actual,
                    });
                }
            }
            Self::start_one(module, events)?;
        }
        Ok(())
    }

    fn start_one(module: &Module, events: &mut Vec<ModuleEvent>) -> Result<(), ModuleSystemError> {
        let name = module.symbolic_name().to_string();
        module.set_state(ModuleState::Starting);
        log::info!("Starting module '{}'", name);
        if let Some(mut activator) = module.create_activator() {
            if let Err(source) = activator.load(module.context()) {
                module.set_state(ModuleState::Resolved);
                log::error!("Activator for module '{}' failed to load: {}", name, source);
                return Err(ModuleSystemError::ActivatorFailed {
                    module: name,
                    source,
                });
            }
            module.store_activator(activator);
        }
        module.set_state(ModuleState::Active);
        events.push(ModuleEvent::new(ModuleEventKind::Started, &name));
        Ok(())
    }

    /// Stop an active module.
    ///
    /// With `force == false`, the call fails with `DependentModulesActive`
    /// if any active module transitively requires this one, and nothing
    /// changes. With `force == true`, active dependents are stopped first,
    /// dependents strictly before the modules they require. Stopping a
    /// module that is not active is a no-op.
    pub fn stop(&self, name: &str, force: bool) -> Result<(), ModuleSystemError> {
        let mut events = Vec::new();
        let result = self.stop_locked(name, force, &mut events);
        self.flush(events);
        result
    }

    fn stop_locked(
        &self,
        name: &str,
        force: bool,
        events: &mut Vec<ModuleEvent>,
    ) -> Result<(), ModuleSystemError> {
        let modules = self.shared.modules.lock().unwrap();
        let target = modules
            .get(name)
            .ok_or_else(|| ModuleSystemError::ModuleNotFound(name.to_string()))?;
        if target.state() != ModuleState::Active {
            return Ok(());
        }
        let graph = Self::active_graph(&modules);
        let dependents = graph.transitive_dependents(name);
        if !dependents.is_empty() && !force {
            return Err(ModuleSystemError::DependentModulesActive {
                module: name.to_string(),
                dependents,
            });
        }
        for step in graph.shutdown_order(name)? {
            let module = &modules[&step];
            if module.state() == ModuleState::Active {
                self.stop_one(module, events);
            }
        }
        Ok(())
    }

    fn stop_one(&self, module: &Module, events: &mut Vec<ModuleEvent>) {
        let name = module.symbolic_name().to_string();
        module.set_state(ModuleState::Stopping);
        log::info!("Stopping module '{}'", name);
        if let Some(mut activator) = module.take_activator() {
            // Unload failures never prevent the stop from completing.
            if let Err(err) = activator.unload(module.context()) {
                log::warn!("Activator for module '{}' failed to unload: {}", name, err);
            }
        }
        self.shared.services.unregister_all_for_module(&name);
        module.set_state(ModuleState::Resolved);
        events.push(ModuleEvent::new(ModuleEventKind::Stopped, &name));
    }

    /// Uninstall a module, stopping it first if active (the same dependent
    /// rules as [`stop`](Self::stop) apply). Outstanding `Module` handles
    /// observe the `Uninstalled` state; the symbolic name becomes available
    /// for a fresh install.
    pub fn uninstall(&self, name: &str, force: bool) -> Result<(), ModuleSystemError> {
        let mut events = Vec::new();
        let result = self.uninstall_locked(name, force, &mut events);
        self.flush(events);
        result
    }

    fn uninstall_locked(
        &self,
        name: &str,
        force: bool,
        events: &mut Vec<ModuleEvent>,
    ) -> Result<(), ModuleSystemError> {
        let mut modules = self.shared.modules.lock().unwrap();
        let target = modules
            .get(name)
            .ok_or_else(|| ModuleSystemError::ModuleNotFound(name.to_string()))?
            .clone();

        if target.state() == ModuleState::Active {
            let graph = Self::active_graph(&modules);
            let dependents = graph.transitive_dependents(name);
            if !dependents.is_empty() && !force {
                return Err(ModuleSystemError::DependentModulesActive {
                    module: name.to_string(),
                    dependents,
                });
            }
            for step in graph.shutdown_order(name)? {
                let module = &modules[&step];
                if module.state() == ModuleState::Active {
                    self.stop_one(module, events);
                }
            }
        }

        modules.remove(name);
        target.set_state(ModuleState::Uninstalled);
        // Dropping the handle unloads a dynamically loaded library once the
        // last activator produced from it is gone.
        drop(target.take_library());
        log::info!("Uninstalled module '{}'", name);
        events.push(ModuleEvent::new(ModuleEventKind::Uninstalled, name));
        Ok(())
    }

    /// Stop every active module, dependents before dependencies. Used at
    /// runtime shutdown; failures are logged, never propagated.
    pub fn stop_all(&self) {
        let mut events = Vec::new();
        {
            let modules = self.shared.modules.lock().unwrap();
            let graph = Self::active_graph(&modules);
            let order = match graph.total_order() {
                Ok(mut order) => {
                    order.reverse();
                    order
                }
                Err(err) => {
                    // Active modules were started acyclically, so this is
                    // unreachable in practice; stop in name order regardless.
                    log::error!("Dependency order unavailable during shutdown: {}", err);
                    let mut names: Vec<String> = modules
                        .values()
                        .filter(|module| module.state() == ModuleState::Active)
                        .map(|module| module.symbolic_name().to_string())
                        .collect();
                    names.sort();
                    names
                }
            };
            for step in order {
                let module = &modules[&step];
                if module.state() == ModuleState::Active {
                    self.stop_one(module, &mut events);
                }
            }
        }
        self.flush(events);
    }

    pub fn get_module(&self, name: &str) -> Option<Module> {
        self.shared.modules.lock().unwrap().get(name).cloned()
    }

    /// Snapshot of all installed modules, sorted by symbolic name.
    pub fn modules(&self) -> Vec<Module> {
        let modules = self.shared.modules.lock().unwrap();
        let mut snapshot: Vec<Module> = modules.values().cloned().collect();
        snapshot.sort_by(|a, b| a.symbolic_name().cmp(b.symbolic_name()));
        snapshot
    }

    pub fn module_count(&self) -> usize {
        self.shared.modules.lock().unwrap().len()
    }

    /// Graph over every installed module with its full requirement list.
    fn full_graph(modules: &HashMap<String, Module>) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for module in modules.values() {
            graph.insert(module.symbolic_name(), module.manifest().requires());
        }
        graph
    }

    /// Graph restricted to active modules. Requirements on modules that are
    /// not active are dropped so the stop path never trips over modules that
    /// were merely installed.
    fn active_graph(modules: &HashMap<String, Module>) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for module in modules.values() {
            if module.state() != ModuleState::Active {
                continue;
            }
            let requires: Vec<String> = module
                .manifest()
                .requires()
                .iter()
                .filter(|req| {
                    modules
                        .get(*req)
                        .is_some_and(|dep| dep.state() == ModuleState::Active)
                })
                .cloned()
                .collect();
            graph.insert(module.symbolic_name(), &requires);
        }
        graph
    }

    fn flush(&self, events: Vec<ModuleEvent>) {
        for event in events {
            self.shared.dispatcher.dispatch_module_event(&event);
        }
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_count())
            .finish_non_exhaustive()
    }
}
