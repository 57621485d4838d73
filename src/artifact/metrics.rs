//! Metrics engine: runs once on the frozen dependency graph.
//!
//! Bottom-up over the tree: sizes, strongly connected components among the
//! symbol parts of each scope (same-scope edges only), and dependency
//! balance. Folder and file values are sums over their parts; cycle
//! detection happens only between sibling symbols.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::debug;

use super::tree::ArtifactTree;
use super::types::{ArtifactId, ArtifactKind, EdgeScope};
use crate::error::{Error, Result};

/// Compute metrics for every artifact. Metrics are write-once: a second
/// call on the same tree fails with [`Error::MetricsAlreadyComputed`].
pub fn compute_metrics(tree: &mut ArtifactTree) -> Result<()> {
    if tree.metrics_computed {
        return Err(Error::MetricsAlreadyComputed);
    }

    let mut order = Vec::with_capacity(tree.len());
    tree.walk(tree.root(), &mut |_, id| order.push(id));

    let mut cycles = 0;
    for id in order {
        cycles += assign_components(tree, id);
        compute_own_metrics(tree, id);
    }

    tree.metrics_computed = true;
    debug!(artifacts = tree.len(), cycles, "metrics computed");
    Ok(())
}

/// Number the strongly connected components among the symbol parts of
/// `scope`. Returns how many multi-member components were found.
///
/// Components are numbered along a topological order of the condensed
/// graph, dependents before their dependencies; components that are not
/// ordered by any edge keep the order of their earliest part.
fn assign_components(tree: &mut ArtifactTree, scope: ArtifactId) -> usize {
    let symbols: Vec<ArtifactId> = tree
        .parts(scope)
        .iter()
        .copied()
        .filter(|&id| tree.get(id).is_symbol())
        .collect();
    if symbols.is_empty() {
        return 0;
    }

    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(symbols.len(), 0);
    let mut node_of: HashMap<ArtifactId, NodeIndex> = HashMap::with_capacity(symbols.len());
    for (position, &id) in symbols.iter().enumerate() {
        node_of.insert(id, graph.add_node(position));
    }
    for &id in &symbols {
        for target in tree.get(id).dependencies.outgoing(EdgeScope::Scope) {
            if let Some(&to) = node_of.get(target) {
                graph.add_edge(node_of[&id], to, ());
            }
        }
    }

    let components = tarjan_scc(&graph);
    let mut component_of: HashMap<NodeIndex, usize> = HashMap::with_capacity(symbols.len());
    for (c, members) in components.iter().enumerate() {
        for &node in members {
            component_of.insert(node, c);
        }
    }

    // Kahn's algorithm over the condensation, smallest part position first.
    let first_position: Vec<usize> = components
        .iter()
        .map(|members| members.iter().map(|&n| graph[n]).min().unwrap_or(usize::MAX))
        .collect();
    let mut successors: Vec<HashSet<usize>> = vec![HashSet::new(); components.len()];
    let mut in_degree = vec![0usize; components.len()];
    for edge in graph.raw_edges() {
        let (from, to) = (component_of[&edge.source()], component_of[&edge.target()]);
        if from != to && successors[from].insert(to) {
            in_degree[to] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<(usize, usize)>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(c, _)| Reverse((first_position[c], c)))
        .collect();
    let mut number_of = vec![0usize; components.len()];
    let mut next_number = 0;
    while let Some(Reverse((_, c))) = ready.pop() {
        number_of[c] = next_number;
        next_number += 1;
        for &succ in &successors[c] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.push(Reverse((first_position[succ], succ)));
            }
        }
    }

    for &id in &symbols {
        let component = component_of[&node_of[&id]];
        tree.get_mut(id).metrics.component_number = Some(number_of[component]);
    }

    components.iter().filter(|members| members.len() > 1).count()
}

fn compute_own_metrics(tree: &mut ArtifactTree, id: ArtifactId) {
    let parts = tree.parts(id).to_vec();

    let parts_loc: usize = parts.iter().map(|&p| tree.get(p).metrics.lines_of_code()).sum();

    let mut component_sizes: HashMap<usize, usize> = HashMap::new();
    for &p in &parts {
        if let Some(c) = tree.get(p).metrics.component_number {
            *component_sizes.entry(c).or_default() += 1;
        }
    }
    // a part inside a cycle counts whole; otherwise only its own cycles count
    let cycle_loc: usize = parts
        .iter()
        .map(|&p| &tree.get(p).metrics)
        .map(|m| {
            let in_cycle = m
                .component_number
                .is_some_and(|c| component_sizes.get(&c).copied().unwrap_or(0) > 1);
            if in_cycle {
                m.lines_of_code()
            } else {
                m.lines_of_code_of_parts_in_cycles.unwrap_or(0)
            }
        })
        .sum();

    let artifact = tree.get(id);
    let (incoming_scope, diff_scope, diff_external) = match artifact.kind {
        ArtifactKind::Symbol(_) => {
            let deps = &artifact.dependencies;
            (
                deps.incoming_scope.len(),
                deps.outgoing_scope.len() as i64 - deps.incoming_scope.len() as i64,
                deps.outgoing_external.len() as i64 - deps.incoming_external.len() as i64,
            )
        }
        ArtifactKind::Folder | ArtifactKind::File { .. } => parts.iter().fold(
            (0usize, 0i64, 0i64),
            |(incoming, scope, external), &p| {
                let m = &tree.get(p).metrics;
                (
                    incoming + m.incoming_dependencies_in_scope.unwrap_or(0),
                    scope + m.dependency_difference_scope.unwrap_or(0),
                    external + m.dependency_difference_external.unwrap_or(0),
                )
            },
        ),
    };
    let lines_of_code = artifact.intrinsic_lines.unwrap_or(parts_loc);

    let metrics = &mut tree.get_mut(id).metrics;
    metrics.lines_of_code = Some(lines_of_code);
    metrics.lines_of_code_of_parts = Some(parts_loc);
    metrics.lines_of_code_of_parts_in_cycles = Some(cycle_loc);
    metrics.incoming_dependencies_in_scope = Some(incoming_scope);
    metrics.dependency_difference_scope = Some(diff_scope);
    metrics.dependency_difference_external = Some(diff_external);
}
