//! Dependency graph for step execution ordering.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::error::{BootstrapError, Result};
use crate::steps::Step;

/// Represents the dependency relationships between steps.
///
/// Steps keep the order they were added in; that order breaks ties
/// whenever several steps are ready at once.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Step names in input order.
    steps: Vec<String>,
    /// Map of step name to its input position.
    positions: HashMap<String, usize>,
    /// Map of step name to its direct dependencies, in declared order.
    dependencies: HashMap<String, Vec<String>>,
    /// Map of step name to steps that depend on it, in input order.
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create a new dependency graph builder.
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder::new()
    }

    /// Build the graph for a set of steps.
    pub fn from_steps<C: Send>(steps: &[Box<dyn Step<C>>]) -> Result<Self> {
        steps
            .iter()
            .fold(Self::builder(), |builder, step| {
                builder.add_step(step.name(), step.dependencies().iter().cloned())
            })
            .build()
    }

    /// Get the direct dependencies of a step.
    pub fn dependencies_of(&self, step: &str) -> Option<&[String]> {
        self.dependencies.get(step).map(Vec::as_slice)
    }

    /// Get steps that depend on the given step.
    pub fn dependents_of(&self, step: &str) -> Option<&[String]> {
        self.dependents.get(step).map(Vec::as_slice)
    }

    /// Check if a step exists in the graph.
    pub fn contains(&self, step: &str) -> bool {
        self.positions.contains_key(step)
    }

    /// Get all step names in input order.
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Get the number of steps in the graph.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns steps in topological order (dependencies before dependents).
    ///
    /// Among steps that are ready at the same time, the one added first
    /// runs first. Returns an error if a cycle is detected.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        // Count incoming edges for each node
        let mut in_degree: Vec<usize> = self
            .steps
            .iter()
            .map(|step| self.dependencies.get(step).map_or(0, Vec::len))
            .collect();

        // Ready set keyed by input position
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(index, _)| index)
            .collect();

        let mut result = Vec::with_capacity(self.steps.len());

        while let Some(index) = ready.pop_first() {
            let step = &self.steps[index];
            result.push(step.clone());

            // Reduce in-degree for all dependents
            if let Some(dependents) = self.dependents.get(step) {
                for dependent in dependents {
                    let position = self.positions[dependent];
                    in_degree[position] -= 1;
                    if in_degree[position] == 0 {
                        ready.insert(position);
                    }
                }
            }
        }

        // If we haven't processed all nodes, there's a cycle
        if result.len() != self.steps.len() {
            let cycle = self.find_cycle().unwrap_or_else(|| {
                self.steps
                    .iter()
                    .zip(&in_degree)
                    .filter(|(_, &degree)| degree > 0)
                    .map(|(step, _)| step.clone())
                    .collect()
            });

            return Err(BootstrapError::CircularDependency {
                cycle: cycle.join(" -> "),
            });
        }

        Ok(result)
    }

    /// Find a cycle in the graph, returning the path if one exists.
    ///
    /// The path starts and ends with the same step.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Visiting,
            Visited,
        }

        let mut state: HashMap<&str, State> = self
            .steps
            .iter()
            .map(|s| (s.as_str(), State::Unvisited))
            .collect();

        let mut path: Vec<String> = Vec::new();

        fn dfs<'a>(
            node: &'a str,
            graph: &'a DependencyGraph,
            state: &mut HashMap<&'a str, State>,
            path: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            state.insert(node, State::Visiting);
            path.push(node.to_string());

            if let Some(deps) = graph.dependencies.get(node) {
                for dep in deps {
                    match state.get(dep.as_str()) {
                        Some(State::Visiting) => {
                            // Found cycle - build the cycle path
                            let start = path.iter().position(|s| s == dep).unwrap_or(0);
                            let mut cycle: Vec<String> = path[start..].to_vec();
                            cycle.push(dep.clone());
                            return Some(cycle);
                        }
                        Some(State::Unvisited) => {
                            if let Some(cycle) = dfs(dep, graph, state, path) {
                                return Some(cycle);
                            }
                        }
                        Some(State::Visited) | None => {}
                    }
                }
            }

            path.pop();
            state.insert(node, State::Visited);
            None
        }

        for step in &self.steps {
            if state.get(step.as_str()) == Some(&State::Unvisited) {
                if let Some(cycle) = dfs(step, self, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// Get all transitive dependents of a step, in input order.
    ///
    /// Returns steps that depend on the given step, directly or indirectly.
    pub fn transitive_dependents(&self, step: &str) -> Vec<String> {
        let mut found = HashSet::new();
        let mut to_visit = vec![step];

        while let Some(current) = to_visit.pop() {
            if let Some(dependents) = self.dependents.get(current) {
                for dep in dependents {
                    if found.insert(dep.as_str()) {
                        to_visit.push(dep);
                    }
                }
            }
        }

        self.steps
            .iter()
            .filter(|s| found.contains(s.as_str()))
            .cloned()
            .collect()
    }
}

/// Builder for constructing a DependencyGraph.
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    steps: Vec<(String, Vec<String>)>,
}

impl DependencyGraphBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step with its dependencies.
    pub fn add_step<I, S>(mut self, name: impl Into<String>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps
            .push((name.into(), depends_on.into_iter().map(Into::into).collect()));
        self
    }

    /// Build the dependency graph.
    ///
    /// Returns an error if a name is used twice or any dependency
    /// references a non-existent step.
    pub fn build(self) -> Result<DependencyGraph> {
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(self.steps.len());
        for (index, (name, _)) in self.steps.iter().enumerate() {
            if positions.insert(name.clone(), index).is_some() {
                return Err(BootstrapError::DuplicateStep { name: name.clone() });
            }
        }

        // Validate all dependencies exist
        for (name, deps) in &self.steps {
            if let Some(missing) = deps.iter().find(|dep| !positions.contains_key(*dep)) {
                return Err(BootstrapError::UnknownDependency {
                    step: name.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

        for (name, deps) in self.steps {
            // Repeated dependency names count once
            let mut seen = HashSet::new();
            let deps: Vec<String> = deps.into_iter().filter(|d| seen.insert(d.clone())).collect();

            for dep in &deps {
                dependents.entry(dep.clone()).or_default().push(name.clone());
            }
            dependencies.insert(name.clone(), deps);
            steps.push(name);
        }

        Ok(DependencyGraph {
            steps,
            positions,
            dependencies,
            dependents,
        })
    }
}

/// Resolve the execution order of `steps`.
///
/// Returns references to the same steps, every dependency placed before its
/// dependents and input order preserved among independent steps. Fails
/// before anything runs on duplicate names, unknown dependencies or cycles.
pub fn resolve_order<C: Send>(steps: &[Box<dyn Step<C>>]) -> Result<Vec<&dyn Step<C>>> {
    DependencyGraph::from_steps(steps)?.order_steps(steps)
}

impl DependencyGraph {
    /// Arrange `steps`, the set this graph was built from, in execution order.
    pub fn order_steps<'a, C: Send>(
        &self,
        steps: &'a [Box<dyn Step<C>>],
    ) -> Result<Vec<&'a dyn Step<C>>> {
        let order = self.topological_order()?;
        debug!(order = ?order, "Resolved execution order");

        let by_name: HashMap<&str, &dyn Step<C>> = steps
            .iter()
            .map(|step| (step.name(), step.as_ref()))
            .collect();

        Ok(order
            .iter()
            .filter_map(|name| by_name.get(name.as_str()).copied())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::FnStep;

    fn step(name: &str, deps: &[&str]) -> Box<dyn Step<()>> {
        Box::new(FnStep::from_fn(name, |_: &mut ()| Ok(())).depends_on(deps.iter().copied()))
    }

    fn names(order: &[&dyn Step<()>]) -> Vec<String> {
        order.iter().map(|s| s.name().to_string()).collect()
    }

    #[test]
    fn builder_creates_empty_graph() {
        let graph = DependencyGraph::builder().build().unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn builder_adds_step_with_dependencies() {
        let graph = DependencyGraph::builder()
            .add_step("step1", Vec::<String>::new())
            .add_step("step2", ["step1"])
            .build()
            .unwrap();

        assert!(graph.contains("step1"));
        assert!(graph.contains("step2"));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.dependencies_of("step2").unwrap(), ["step1"]);
    }

    #[test]
    fn builder_tracks_dependents() {
        let graph = DependencyGraph::builder()
            .add_step("step1", Vec::<String>::new())
            .add_step("step2", ["step1"])
            .add_step("step3", ["step1"])
            .build()
            .unwrap();

        assert_eq!(graph.dependents_of("step1").unwrap(), ["step2", "step3"]);
    }

    #[test]
    fn builder_rejects_unknown_dependency() {
        let err = DependencyGraph::builder()
            .add_step("step1", ["nonexistent"])
            .build()
            .unwrap_err();

        match err {
            BootstrapError::UnknownDependency { step, dependency } => {
                assert_eq!(step, "step1");
                assert_eq!(dependency, "nonexistent");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn builder_rejects_duplicate_names() {
        let err = DependencyGraph::builder()
            .add_step("a", Vec::<String>::new())
            .add_step("a", Vec::<String>::new())
            .build()
            .unwrap_err();

        assert!(matches!(err, BootstrapError::DuplicateStep { name } if name == "a"));
    }

    #[test]
    fn repeated_dependency_counts_once() {
        let graph = DependencyGraph::builder()
            .add_step("a", Vec::<String>::new())
            .add_step("b", ["a", "a"])
            .build()
            .unwrap();

        assert_eq!(graph.dependencies_of("b").unwrap(), ["a"]);
        assert_eq!(graph.topological_order().unwrap(), ["a", "b"]);
    }

    #[test]
    fn topo_sort_empty_graph() {
        let graph = DependencyGraph::builder().build().unwrap();
        assert!(graph.topological_order().unwrap().is_empty());
    }

    #[test]
    fn topo_sort_linear_chain() {
        let graph = DependencyGraph::builder()
            .add_step("third", ["second"])
            .add_step("second", ["first"])
            .add_step("first", Vec::<String>::new())
            .build()
            .unwrap();

        assert_eq!(
            graph.topological_order().unwrap(),
            ["first", "second", "third"]
        );
    }

    #[test]
    fn topo_sort_diamond_dependency() {
        let graph = DependencyGraph::builder()
            .add_step("a", Vec::<String>::new())
            .add_step("b", ["a"])
            .add_step("c", ["a"])
            .add_step("d", ["b", "c"])
            .build()
            .unwrap();

        assert_eq!(graph.topological_order().unwrap(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn root_after_dependencies_in_input_order() {
        let graph = DependencyGraph::builder()
            .add_step("Step_Root", ["A", "B", "C"])
            .add_step("A", Vec::<String>::new())
            .add_step("B", Vec::<String>::new())
            .add_step("C", Vec::<String>::new())
            .build()
            .unwrap();

        assert_eq!(
            graph.topological_order().unwrap(),
            ["A", "B", "C", "Step_Root"]
        );
    }

    #[test]
    fn independent_steps_keep_input_order() {
        let graph = DependencyGraph::builder()
            .add_step("zeta", Vec::<String>::new())
            .add_step("alpha", Vec::<String>::new())
            .add_step("mid", ["zeta"])
            .add_step("beta", Vec::<String>::new())
            .build()
            .unwrap();

        // "mid" becomes ready after "zeta" and precedes the later "beta".
        assert_eq!(
            graph.topological_order().unwrap(),
            ["zeta", "alpha", "mid", "beta"]
        );
    }

    #[test]
    fn late_ready_step_waits_for_earlier_ready_ones() {
        let graph = DependencyGraph::builder()
            .add_step("x", Vec::<String>::new())
            .add_step("y", Vec::<String>::new())
            .add_step("z", ["y"])
            .add_step("w", Vec::<String>::new())
            .build()
            .unwrap();

        assert_eq!(graph.topological_order().unwrap(), ["x", "y", "z", "w"]);
    }

    #[test]
    fn topo_sort_detects_simple_cycle() {
        let graph = DependencyGraph::builder()
            .add_step("a", ["b"])
            .add_step("b", ["a"])
            .build()
            .unwrap();

        let err = graph.topological_order().unwrap_err();
        match err {
            BootstrapError::CircularDependency { cycle } => {
                assert!(cycle.contains('a'));
                assert!(cycle.contains('b'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_cycle_returns_none() {
        let graph = DependencyGraph::builder()
            .add_step("a", Vec::<String>::new())
            .add_step("b", ["a"])
            .build()
            .unwrap();

        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn simple_cycle_returns_path() {
        let graph = DependencyGraph::builder()
            .add_step("a", ["b"])
            .add_step("b", ["a"])
            .build()
            .unwrap();

        let path = graph.find_cycle().unwrap();
        assert_eq!(path, ["a", "b", "a"]);
    }

    #[test]
    fn longer_cycle_returns_full_path() {
        let graph = DependencyGraph::builder()
            .add_step("a", ["c"])
            .add_step("b", ["a"])
            .add_step("c", ["b"])
            .build()
            .unwrap();

        let path = graph.find_cycle().unwrap();
        assert!(path.contains(&"a".to_string()));
        assert!(path.contains(&"b".to_string()));
        assert!(path.contains(&"c".to_string()));
        assert_eq!(path.first(), path.last());
    }

    #[test]
    fn self_cycle_detected() {
        let graph = DependencyGraph::builder()
            .add_step("a", ["a"])
            .build()
            .unwrap();

        assert_eq!(graph.find_cycle().unwrap(), ["a", "a"]);
        assert!(graph.topological_order().is_err());
    }

    #[test]
    fn cycle_behind_valid_prefix_is_reported() {
        let graph = DependencyGraph::builder()
            .add_step("setup", Vec::<String>::new())
            .add_step("x", ["setup", "y"])
            .add_step("y", ["x"])
            .build()
            .unwrap();

        let err = graph.topological_order().unwrap_err();
        assert!(err.to_string().contains("x -> y -> x"));
    }

    #[test]
    fn transitive_dependents_in_input_order() {
        let graph = DependencyGraph::builder()
            .add_step("a", Vec::<String>::new())
            .add_step("c", ["b"])
            .add_step("b", ["a"])
            .add_step("d", Vec::<String>::new())
            .build()
            .unwrap();

        assert_eq!(graph.transitive_dependents("a"), ["c", "b"]);
        assert!(graph.transitive_dependents("d").is_empty());
    }

    #[test]
    fn resolve_order_permutes_steps() {
        let steps = vec![
            step("Step_Root", &["A", "B", "C"]),
            step("A", &[]),
            step("B", &[]),
            step("C", &[]),
        ];

        let order = resolve_order(&steps).unwrap();
        assert_eq!(names(&order), ["A", "B", "C", "Step_Root"]);
    }

    #[test]
    fn resolve_order_empty_input() {
        let steps: Vec<Box<dyn Step<()>>> = Vec::new();
        assert!(resolve_order(&steps).unwrap().is_empty());
    }

    #[test]
    fn resolve_order_rejects_unknown_dependency() {
        let steps = vec![step("seed", &["schema"])];
        let Err(err) = resolve_order(&steps) else {
            panic!("unknown dependency was accepted");
        };
        assert!(err.is_configuration_error());
        assert_eq!(err.failed_step(), Some("seed"));
    }

    #[test]
    fn resolve_order_rejects_cycle() {
        let steps = vec![step("a", &["b"]), step("b", &["a"])];
        let Err(err) = resolve_order(&steps) else {
            panic!("cycle was accepted");
        };
        assert!(matches!(err, BootstrapError::CircularDependency { .. }));
    }

    #[test]
    fn one_graph_orders_steps_and_finds_dependents() {
        let steps = vec![
            step("serve", &["migrate"]),
            step("migrate", &["connect"]),
            step("connect", &[]),
        ];

        let graph = DependencyGraph::from_steps(&steps).unwrap();
        let order = graph.order_steps(&steps).unwrap();

        assert_eq!(names(&order), ["connect", "migrate", "serve"]);
        assert_eq!(graph.transitive_dependents("connect"), ["serve", "migrate"]);
    }
}
