// src/recipe/graph.rs

//! Recipe dependency graph for build ordering
//!
//! Directed graph between recipes in one directory, used to decide which
//! library must be cooked before which. Ordering is deterministic: ties are
//! broken by name.
//!
//! # Example
//!
//! ```ignore
//! use pantry::recipe::graph::RecipeGraph;
//!
//! let mut graph = RecipeGraph::new();
//! graph.add_recipe("libstrophe", &["expat", "openssl"]);
//! graph.add_recipe("openssl", &["zlib"]);
//!
//! let order = graph.topological_sort().unwrap();
//! // order: ["expat", "zlib", "openssl", "libstrophe"]
//! ```

use crate::error::{Error, Result};
use crate::recipe::format::Recipe;
use crate::recipe::requires::DependencyEdge;
use crate::version::PackageRef;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A directed graph representing recipe dependencies
#[derive(Debug, Default, Clone)]
pub struct RecipeGraph {
    /// Recipe name to the recipes it depends on
    edges: BTreeMap<String, BTreeSet<String>>,
    /// Recipe name to the recipes that depend on it
    reverse_edges: BTreeMap<String, BTreeSet<String>>,
}

impl RecipeGraph {
    /// Create a new empty recipe graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from every declared requirement of each recipe
    ///
    /// Conditional requirements are included regardless of options, so the
    /// order holds for any configuration.
    pub fn from_recipes<'a>(recipes: impl IntoIterator<Item = &'a Recipe>) -> Self {
        let mut graph = Self::new();
        for recipe in recipes {
            graph.add_from_recipe(recipe);
        }
        graph
    }

    /// Add a recipe with its dependencies
    ///
    /// If the recipe already exists, this merges the dependencies.
    pub fn add_recipe(&mut self, name: &str, dependencies: &[&str]) {
        self.edges.entry(name.to_string()).or_default();
        self.reverse_edges.entry(name.to_string()).or_default();

        for dep in dependencies {
            self.edges.entry(dep.to_string()).or_default();
            self.reverse_edges
                .entry(dep.to_string())
                .or_default()
                .insert(name.to_string());
            self.edges
                .entry(name.to_string())
                .or_default()
                .insert(dep.to_string());
        }
    }

    /// Add a recipe using all of its `requires` and `tool_requires`
    pub fn add_from_recipe(&mut self, recipe: &Recipe) {
        let names: Vec<String> = recipe
            .requires
            .iter()
            .chain(&recipe.tool_requires)
            .filter_map(|decl| PackageRef::parse(&decl.reference).ok())
            .map(|r| r.name)
            .collect();
        let deps: Vec<&str> = names.iter().map(String::as_str).collect();
        self.add_recipe(&recipe.package.name, &deps);
    }

    /// Add a recipe using the edges declared for one configuration
    pub fn add_from_edges(&mut self, name: &str, edges: &[DependencyEdge]) {
        let deps: Vec<&str> = edges.iter().map(|e| e.name.as_str()).collect();
        self.add_recipe(name, &deps);
    }

    /// Get the number of recipes in the graph
    pub fn recipe_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if a recipe exists in the graph
    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Get the direct dependencies of a recipe
    pub fn dependencies(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(name)
    }

    /// Get the recipes that directly depend on this recipe
    pub fn dependents(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.reverse_edges.get(name)
    }

    /// Perform topological sort using Kahn's algorithm
    ///
    /// Returns the recipes in build order (dependencies before dependents).
    /// Among recipes that are ready at the same time, names sort first.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        // In-degree here is the number of unbuilt prerequisites
        let mut in_degrees: BTreeMap<&str, usize> = self
            .edges
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();

        let mut ready: BTreeSet<&str> = in_degrees
            .iter()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut result = Vec::with_capacity(self.edges.len());

        while let Some(node) = ready.pop_first() {
            result.push(node.to_string());

            if let Some(dependents) = self.reverse_edges.get(node) {
                for dependent in dependents {
                    if let Some(deg) = in_degrees.get_mut(dependent.as_str()) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            ready.insert(dependent.as_str());
                        }
                    }
                }
            }
        }

        if result.len() != self.edges.len() {
            let cycles = self.find_cycles();
            let described: Vec<String> = cycles
                .iter()
                .map(|cycle| {
                    let mut names = cycle.clone();
                    if let Some(first) = cycle.first() {
                        names.push(first.clone());
                    }
                    names.join(" -> ")
                })
                .collect();
            return Err(Error::invalid(format!(
                "circular dependency: {}",
                described.join("; ")
            )));
        }

        Ok(result)
    }

    /// Find all cycles in the graph
    ///
    /// Returns a list of cycles, where each cycle is a list of recipe names.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut visited = BTreeSet::new();
        let mut rec_stack = BTreeSet::new();
        let mut path = Vec::new();

        for start in self.edges.keys() {
            if !visited.contains(start) {
                self.find_cycles_dfs(start, &mut visited, &mut rec_stack, &mut path, &mut cycles);
            }
        }

        cycles
    }

    fn find_cycles_dfs(
        &self,
        node: &str,
        visited: &mut BTreeSet<String>,
        rec_stack: &mut BTreeSet<String>,
        path: &mut Vec<String>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if !visited.contains(dep) {
                    self.find_cycles_dfs(dep, visited, rec_stack, path, cycles);
                } else if rec_stack.contains(dep)
                    && let Some(cycle_start) = path.iter().position(|x| x == dep)
                {
                    cycles.push(path[cycle_start..].to_vec());
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
    }

    /// Get all recipes that a given recipe transitively depends on
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        Self::walk(&self.edges, name)
    }

    /// Get all recipes that transitively depend on a given recipe
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<String> {
        Self::walk(&self.reverse_edges, name)
    }

    fn walk(adjacency: &BTreeMap<String, BTreeSet<String>>, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&String> = adjacency
            .get(name)
            .map(|direct| direct.iter().collect())
            .unwrap_or_default();

        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone())
                && let Some(indirect) = adjacency.get(next)
            {
                queue.extend(indirect.iter().filter(|n| !seen.contains(*n)));
            }
        }

        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parser::parse_recipe;

    #[test]
    fn test_empty_graph() {
        let graph = RecipeGraph::new();
        assert_eq!(graph.recipe_count(), 0);
        assert!(graph.topological_sort().unwrap().is_empty());
    }

    #[test]
    fn test_linear_dependencies() {
        let mut graph = RecipeGraph::new();
        graph.add_recipe("libxml2", &["zlib"]);
        graph.add_recipe("zlib", &[]);
        graph.add_recipe("xmlsec", &["libxml2"]);

        assert_eq!(
            graph.topological_sort().unwrap(),
            vec!["zlib", "libxml2", "xmlsec"]
        );
    }

    #[test]
    fn test_order_is_deterministic() {
        let mut graph = RecipeGraph::new();
        graph.add_recipe("libstrophe", &["openssl", "expat"]);
        graph.add_recipe("openssl", &["zlib"]);

        assert_eq!(
            graph.topological_sort().unwrap(),
            vec!["expat", "zlib", "openssl", "libstrophe"]
        );
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = RecipeGraph::new();
        graph.add_recipe("a", &["b"]);
        graph.add_recipe("b", &["c"]);
        graph.add_recipe("c", &["a"]);

        let cycles = graph.find_cycles();
        assert_eq!(cycles, vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]);

        let err = graph.topological_sort().unwrap_err();
        assert!(err.to_string().contains("a -> b -> c -> a"));
    }

    #[test]
    fn test_transitive_dependencies() {
        let mut graph = RecipeGraph::new();
        graph.add_recipe("app", &["libstrophe"]);
        graph.add_recipe("libstrophe", &["openssl", "expat"]);
        graph.add_recipe("openssl", &["zlib"]);

        let deps = graph.transitive_dependencies("app");
        assert_eq!(deps.len(), 4);
        assert!(deps.contains("zlib"));

        let dependents = graph.transitive_dependents("zlib");
        assert_eq!(
            dependents.into_iter().collect::<Vec<_>>(),
            vec!["app", "libstrophe", "openssl"]
        );
    }

    #[test]
    fn test_add_recipe_merges_deps() {
        let mut graph = RecipeGraph::new();
        graph.add_recipe("zeromq", &["libsodium"]);
        graph.add_recipe("zeromq", &["norm"]);
        assert_eq!(graph.dependencies("zeromq").unwrap().len(), 2);
        assert!(graph.dependents("norm").unwrap().contains("zeromq"));
    }

    #[test]
    fn test_from_recipes_includes_conditional_and_tool_requires() {
        let zeromq = parse_recipe(
            r#"
[package]
name = "zeromq"
version = "4.3.5"

[options]
with_norm = { values = [true, false], default = false }

[[requires]]
ref = "norm/1.5.9"
when = { option = "with_norm" }

[[tool_requires]]
ref = "cmake/3.28.1"
"#,
        )
        .unwrap();
        let norm = parse_recipe("[package]\nname = \"norm\"\nversion = \"1.5.9\"\n").unwrap();

        let graph = RecipeGraph::from_recipes([&zeromq, &norm]);
        assert_eq!(
            graph.topological_sort().unwrap(),
            vec!["cmake", "norm", "zeromq"]
        );
    }
}
