use crate::module_system::dependency::{DependencyError, DependencyGraph};

fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for (module, requires) in edges {
        let requires: Vec<String> = requires.iter().map(|s| s.to_string()).collect();
        graph.insert(module, &requires);
    }
    graph
}

#[test]
fn linear_chain_resolves_leaves_first() {
    let graph = graph(&[("tool", &["ui"]), ("ui", &["core"]), ("core", &[])]);
    let order = graph.resolution_order("tool").unwrap();
    assert_eq!(order, ["core", "ui", "tool"]);
}

#[test]
fn diamond_orders_dependencies_before_dependents() {
    let graph = graph(&[
        ("app", &["left", "right"]),
        ("left", &["base"]),
        ("right", &["base"]),
        ("base", &[]),
    ]);
    let order = graph.resolution_order("app").unwrap();
    assert_eq!(order.len(), 4);
    let pos = |name: &str| order.iter().position(|m| m == name).unwrap();
    assert!(pos("base") < pos("left"));
    assert!(pos("base") < pos("right"));
    assert!(pos("left") < pos("app"));
    assert!(pos("right") < pos("app"));
}

#[test]
fn resolution_is_scoped_to_the_target_closure() {
    let graph = graph(&[("a", &["b"]), ("b", &[]), ("unrelated", &[])]);
    let order = graph.resolution_order("a").unwrap();
    assert_eq!(order, ["b", "a"]);
}

#[test]
fn cycle_is_reported_with_its_chain() {
    let graph = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
    match graph.resolution_order("a") {
        Err(DependencyError::CyclicDependency(chain)) => {
            assert_eq!(chain, ["a", "b", "c", "a"]);
        }
        other => panic!("expected cycle error, got {:?}", other),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let graph = graph(&[("a", &["a"])]);
    assert!(matches!(
        graph.resolution_order("a"),
        Err(DependencyError::CyclicDependency(_))
    ));
}

#[test]
fn missing_requirement_names_the_requirer() {
    let graph = graph(&[("a", &["ghost"])]);
    match graph.resolution_order("a") {
        Err(DependencyError::MissingDependency {
            module,
            requirement,
        }) => {
            assert_eq!(module, "a");
            assert_eq!(requirement, "ghost");
        }
        other => panic!("expected missing dependency, got {:?}", other),
    }
}

#[test]
fn total_order_is_deterministic() {
    let edges: &[(&str, &[&str])] = &[("b", &["a"]), ("a", &[]), ("c", &["a"])];
    let first = graph(edges).total_order().unwrap();
    let second = graph(edges).total_order().unwrap();
    assert_eq!(first, second);
    let pos = |order: &[String], name: &str| order.iter().position(|m| m == name).unwrap();
    assert!(pos(&first, "a") < pos(&first, "b"));
    assert!(pos(&first, "a") < pos(&first, "c"));
}

#[test]
fn dependents_are_computed_transitively() {
    let graph = graph(&[
        ("tool", &["ui"]),
        ("ui", &["core"]),
        ("core", &[]),
        ("viewer", &["core"]),
    ]);
    assert_eq!(graph.direct_dependents("core"), ["ui", "viewer"]);
    assert_eq!(graph.transitive_dependents("core"), ["tool", "ui", "viewer"]);
    assert!(graph.transitive_dependents("tool").is_empty());
}

#[test]
fn shutdown_order_puts_dependents_first() {
    let graph = graph(&[
        ("tool", &["ui"]),
        ("ui", &["core"]),
        ("core", &[]),
        ("unrelated", &[]),
    ]);
    let order = graph.shutdown_order("core").unwrap();
    assert_eq!(order, ["tool", "ui", "core"]);
}
