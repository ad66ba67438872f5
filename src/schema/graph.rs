// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Step dependency graph
//!
//! [`check`] runs the whole-DAG rules over every parsed step, including ones
//! that failed their own validation: names must be unique, every dependency
//! must name a step, and the dependency relation must be acyclic.
//! [`DependencyGraph`] answers ordering questions about a DAG that passed.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};

use super::executor::ExecutorKind;
use super::step::{Step, StepDraft};
use super::FieldPath;
use crate::errors::{ValidationErrors, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Check names, references and cycles across all steps
pub(crate) fn check(steps_path: &FieldPath, drafts: &[StepDraft], errors: &mut ValidationErrors) {
    let mut first_seen: HashMap<&str, &StepDraft> = HashMap::new();
    let mut duplicates: Vec<String> = Vec::new();
    for draft in drafts {
        let Some(name) = draft.name.as_deref() else {
            continue;
        };
        match first_seen.entry(name) {
            Entry::Vacant(entry) => {
                entry.insert(draft);
            }
            Entry::Occupied(_) if !duplicates.iter().any(|d| d == name) => duplicates.push(name.to_string()),
            Entry::Occupied(_) => {}
        }
    }
    // Map-form keys are unique already, so only the sequence form can repeat
    if !duplicates.is_empty() {
        errors.push(steps_path.clone(), Violation::DuplicateStepName { names: duplicates });
    }

    let mut edges: BTreeMap<&str, BTreeSet<&str>> = first_seen.keys().map(|name| (*name, BTreeSet::new())).collect();
    for draft in drafts {
        for (dependency, path) in &draft.depends {
            if !first_seen.contains_key(dependency.as_str()) {
                errors.push(
                    path.clone(),
                    Violation::UnknownDependency {
                        step: draft.name.clone().unwrap_or_else(|| draft.path.to_string()),
                        dependency: dependency.clone(),
                    },
                );
                continue;
            }
            if let Some(targets) = draft.name.as_deref().and_then(|name| edges.get_mut(name)) {
                targets.insert(dependency.as_str());
            }
        }
    }

    let edge_count: usize = edges.values().map(BTreeSet::len).sum();
    tracing::debug!(steps = edges.len(), edges = edge_count, "checking step graph for cycles");

    for cycle in find_cycles(&edges) {
        let path = first_seen
            .get(cycle[0].as_str())
            .map(|draft| draft.path.key("depends"))
            .unwrap_or_else(|| steps_path.clone());
        errors.push(path, Violation::CyclicDependency { cycle });
    }
}

/// Every distinct cycle, each rotated to start at its smallest name
///
/// Iterative depth-first search over step → dependency edges with
/// white/grey/black marking. Roots and neighbours are visited in sorted
/// order so the output does not depend on declaration order.
fn find_cycles(edges: &BTreeMap<&str, BTreeSet<&str>>) -> Vec<Vec<String>> {
    let mut colour: HashMap<&str, Colour> = edges.keys().map(|name| (*name, Colour::White)).collect();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    for (&root, root_edges) in edges {
        if colour.get(root) != Some(&Colour::White) {
            continue;
        }
        colour.insert(root, Colour::Grey);
        let mut stack = vec![(root, root_edges.iter())];

        while let Some((node, neighbours)) = stack.last_mut() {
            let node = *node;
            let Some(&next) = neighbours.next() else {
                colour.insert(node, Colour::Black);
                stack.pop();
                continue;
            };

            match colour.get(next).copied().unwrap_or(Colour::Black) {
                Colour::White => {
                    colour.insert(next, Colour::Grey);
                    if let Some(next_edges) = edges.get(next) {
                        stack.push((next, next_edges.iter()));
                    }
                }
                Colour::Grey => {
                    let Some(start) = stack.iter().position(|(name, _)| *name == next) else {
                        continue;
                    };
                    let mut cycle: Vec<String> = stack[start..].iter().map(|(name, _)| name.to_string()).collect();
                    let smallest = cycle.iter().enumerate().min_by_key(|(_, name)| *name).map_or(0, |(i, _)| i);
                    cycle.rotate_left(smallest);
                    if !cycles.contains(&cycle) {
                        cycles.push(cycle);
                    }
                }
                Colour::Black => {}
            }
        }
    }

    cycles
}

/// Dependency graph of a validated DAG
///
/// Edges point from a dependency to the step that waits for it.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    names: Vec<String>,
    kinds: Vec<ExecutorKind>,
}

impl DependencyGraph {
    pub(crate) fn new(steps: &[Step]) -> Self {
        let mut graph = DiGraph::with_capacity(steps.len(), 0);
        let mut name_to_index = HashMap::with_capacity(steps.len());

        for (idx, step) in steps.iter().enumerate() {
            let node = graph.add_node(idx);
            name_to_index.insert(step.name().to_string(), node);
        }

        for step in steps {
            let step_node = name_to_index[step.name()];
            for dep in step.depends() {
                if let Some(&dep_node) = name_to_index.get(dep) {
                    graph.add_edge(dep_node, step_node, ());
                }
            }
        }

        Self {
            graph,
            name_to_index,
            names: steps.iter().map(|s| s.name().to_string()).collect(),
            kinds: steps.iter().map(|s| s.executor().kind()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn name(&self, node: NodeIndex) -> &str {
        &self.names[self.graph[node]]
    }

    /// Step names in the order they would run
    ///
    /// Topological; among steps that are ready at the same time, the one
    /// declared first comes first.
    pub fn execution_order(&self) -> Vec<&str> {
        let mut waiting: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, petgraph::Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = waiting
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(self.names[idx].as_str());
            for next in self.graph.neighbors_directed(NodeIndex::new(idx), petgraph::Direction::Outgoing) {
                let next = next.index();
                waiting[next] -= 1;
                if waiting[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        order
    }

    /// Steps that must finish before `step`, in declaration order
    pub fn dependencies(&self, step: &str) -> Option<Vec<&str>> {
        self.neighbours(step, petgraph::Direction::Incoming)
    }

    /// Steps that wait for `step`, in declaration order
    pub fn dependents(&self, step: &str) -> Option<Vec<&str>> {
        self.neighbours(step, petgraph::Direction::Outgoing)
    }

    fn neighbours(&self, step: &str, direction: petgraph::Direction) -> Option<Vec<&str>> {
        let node = self.name_to_index.get(step)?;
        let mut nodes: Vec<NodeIndex> = self.graph.neighbors_directed(*node, direction).collect();
        nodes.sort();
        Some(nodes.into_iter().map(|n| self.name(n)).collect())
    }

    /// Whether step `a` waits, directly or transitively, for step `b`
    pub fn depends_on(&self, a: &str, b: &str) -> bool {
        let (Some(node_a), Some(node_b)) = (self.name_to_index.get(a), self.name_to_index.get(b)) else {
            return false;
        };
        node_a != node_b && petgraph::algo::has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Mermaid flowchart; node ids are positional so any step name is safe
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        for (i, name) in self.names.iter().enumerate() {
            out.push_str(&format!("    s{}[\"{}\"]\n", i, name));
        }
        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    s{} --> s{}\n",
                self.graph[edge.source()],
                self.graph[edge.target()]
            ));
        }
        out
    }

    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph dag {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                self.name(edge.source()),
                self.name(edge.target())
            ));
        }

        for node in self.graph.node_indices() {
            if self.graph.neighbors_undirected(node).next().is_none() {
                out.push_str(&format!("    \"{}\";\n", self.name(node)));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Numbered execution order with executor type and dependencies
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, name) in self.execution_order().into_iter().enumerate() {
            let idx = self.graph[self.name_to_index[name]];
            out.push_str(&format!("{}. {} ({})", i + 1, name, self.kinds[idx]));

            let deps = self.dependencies(name).unwrap_or_default();
            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn make_drafts(steps: Vec<(&str, Vec<&str>)>) -> Vec<StepDraft> {
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (name, deps))| {
                let path = FieldPath::root().key("steps").index(i);
                StepDraft {
                    name: Some(name.to_string()),
                    depends: deps
                        .into_iter()
                        .enumerate()
                        .map(|(j, d)| (d.to_string(), path.key("depends").index(j)))
                        .collect(),
                    step: None,
                    path,
                }
            })
            .collect()
    }

    fn run(steps: Vec<(&str, Vec<&str>)>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check(&FieldPath::root().key("steps"), &make_drafts(steps), &mut errors);
        errors
    }

    fn cycles(errors: &ValidationErrors) -> Vec<Vec<String>> {
        errors
            .iter()
            .filter_map(|e| match e.violation() {
                Violation::CyclicDependency { cycle } => Some(cycle.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_valid_graph_has_no_errors() {
        let errors = run(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["a", "b"])]);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_forward_references_are_legal() {
        let errors = run(vec![("report", vec!["load"]), ("load", vec![])]);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_every_duplicate_is_listed() {
        let errors = run(vec![
            ("a", vec![]),
            ("b", vec![]),
            ("a", vec![]),
            ("c", vec![]),
            ("b", vec![]),
            ("a", vec![]),
        ]);
        assert_eq!(errors.kinds(), vec![ErrorKind::DuplicateStepName]);
        match errors.iter().next().unwrap().violation() {
            Violation::DuplicateStepName { names } => assert_eq!(names, &vec!["a", "b"]),
            other => panic!("unexpected violation {:?}", other),
        }
    }

    #[test]
    fn test_unknown_dependency_names_step_and_reference() {
        let errors = run(vec![("a", vec![]), ("b", vec!["a", "missing"])]);
        assert_eq!(errors.kinds(), vec![ErrorKind::UnknownDependency]);
        let error = errors.iter().next().unwrap();
        assert_eq!(error.path().to_string(), "steps[1].depends[1]");
        assert_eq!(error.message(), "step 'b' depends on unknown step 'missing'");
    }

    #[test]
    fn test_three_step_cycle() {
        let errors = run(vec![("A", vec!["C"]), ("B", vec!["A"]), ("C", vec!["B"])]);
        assert_eq!(errors.kinds(), vec![ErrorKind::CyclicDependency]);
        assert_eq!(cycles(&errors), vec![vec!["A", "C", "B"]]);
        assert_eq!(errors.render(), "steps[0].depends: cyclic dependency: A → C → B → A");
    }

    #[test]
    fn test_cycle_report_ignores_declaration_order() {
        let forward = run(vec![("A", vec!["C"]), ("B", vec!["A"]), ("C", vec!["B"])]);
        let shuffled = run(vec![("C", vec!["B"]), ("B", vec!["A"]), ("A", vec!["C"])]);
        assert_eq!(cycles(&forward), cycles(&shuffled));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let errors = run(vec![("a", vec!["a"])]);
        assert_eq!(cycles(&errors), vec![vec!["a"]]);
    }

    #[test]
    fn test_separate_cycles_are_each_reported() {
        let errors = run(vec![
            ("x", vec!["y"]),
            ("y", vec!["x"]),
            ("m", vec!["n"]),
            ("n", vec!["m"]),
            ("ok", vec!["x"]),
        ]);
        assert_eq!(cycles(&errors), vec![vec!["m", "n"], vec!["x", "y"]]);
    }

    #[test]
    fn test_unnamed_drafts_are_skipped() {
        let mut drafts = make_drafts(vec![("a", vec![])]);
        drafts.push(StepDraft {
            name: None,
            depends: vec![("a".into(), FieldPath::root().key("steps").index(1).key("depends"))],
            step: None,
            path: FieldPath::root().key("steps").index(1),
        });
        let mut errors = ValidationErrors::new();
        check(&FieldPath::root().key("steps"), &drafts, &mut errors);
        assert!(errors.is_empty());
    }
}
