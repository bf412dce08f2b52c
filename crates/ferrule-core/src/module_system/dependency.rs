use std::collections::{HashMap, HashSet};

use thiserror::Error;

/// Error that can occur when resolving the module dependency graph
#[derive(Debug, Error)]
pub enum DependencyError {
    /// A required module is not installed
    #[error("Required module not installed: '{requirement}' (required by '{module}')")]
    MissingDependency { module: String, requirement: String },

    /// Dependency cycle detected, reported with the symbolic-name chain
    #[error("Circular module dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
}

/// Directed dependency graph over installed modules, edges pointing from a
/// module to the modules it requires.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a module and its declared requirements. Requirements that are
    /// not themselves inserted count as missing during traversal.
    pub fn insert(&mut self, module: &str, requires: &[String]) {
        self.edges.insert(module.to_string(), requires.to_vec());
    }

    pub fn contains(&self, module: &str) -> bool {
        self.edges.contains_key(module)
    }

    /// Topological order of the transitive closure of `target`, dependencies
    /// strictly before dependents (leaves first, `target` last).
    pub fn resolution_order(&self, target: &str) -> Result<Vec<String>, DependencyError> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut path = Vec::new();
        self.visit(target, &mut path, &mut done, &mut order)?;
        Ok(order)
    }

    /// Topological order over every inserted module (global leaves-first
    /// order, used for whole-runtime shutdown).
    pub fn total_order(&self) -> Result<Vec<String>, DependencyError> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        // Sorted roots keep the order deterministic across runs.
        let mut roots: Vec<&String> = self.edges.keys().collect();
        roots.sort();
        for root in roots {
            let mut path = Vec::new();
            self.visit(root, &mut path, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        module: &str,
        path: &mut Vec<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), DependencyError> {
        if done.contains(module) {
            return Ok(());
        }
        if let Some(position) = path.iter().position(|entry| entry == module) {
            let mut chain: Vec<String> = path[position..].to_vec();
            chain.push(module.to_string());
            return Err(DependencyError::CyclicDependency(chain));
        }
        path.push(module.to_string());
        let requires = self
            .edges
            .get(module)
            .ok_or_else(|| DependencyError::MissingDependency {
                module: path
                    .get(path.len().saturating_sub(2))
                    .cloned()
                    .unwrap_or_else(|| module.to_string()),
                requirement: module.to_string(),
            })?;
        for requirement in requires.clone() {
            self.visit(&requirement, path, done, order)?;
        }
        path.pop();
        done.insert(module.to_string());
        order.push(module.to_string());
        Ok(())
    }

    /// Modules that directly require `module`
    pub fn direct_dependents(&self, module: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .edges
            .iter()
            .filter(|(_, requires)| requires.iter().any(|req| req == module))
            .map(|(name, _)| name.clone())
            .collect();
        dependents.sort();
        dependents
    }

    /// Every module that transitively requires `module` (excluding the
    /// module itself).
    pub fn transitive_dependents(&self, module: &str) -> Vec<String> {
        let mut dependents = HashSet::new();
        let mut frontier = vec![module.to_string()];
        while let Some(current) = frontier.pop() {
            for dependent in self.direct_dependents(&current) {
                if dependents.insert(dependent.clone()) {
                    frontier.push(dependent);
                }
            }
        }
        let mut result: Vec<String> = dependents.into_iter().collect();
        result.sort();
        result
    }

    /// Stop order for `module` and its transitive dependents: dependents
    /// strictly before the modules they require, `module` last.
    pub fn shutdown_order(&self, module: &str) -> Result<Vec<String>, DependencyError> {
        let mut closure: HashSet<String> = self
            .transitive_dependents(module)
            .into_iter()
            .collect();
        closure.insert(module.to_string());

        // Forward topological order restricted to the closure, then
        // reversed: dependencies-first becomes dependents-first.
        let restricted = self.restrict(&closure);
        let mut order = restricted.total_order()?;
        order.reverse();
        Ok(order)
    }

    fn restrict(&self, keep: &HashSet<String>) -> DependencyGraph {
        let mut restricted = DependencyGraph::new();
        for (module, requires) in &self.edges {
            if !keep.contains(module) {
                continue;
            }
            let kept: Vec<String> = requires
                .iter()
                .filter(|req| keep.contains(*req))
                .cloned()
                .collect();
            restricted.insert(module, &kept);
        }
        restricted
    }
}
