//! Deterministic display order of every artifact's parts.

use std::cmp::Ordering;

use super::tree::ArtifactTree;
use super::types::{ArtifactId, Metrics};

/// Sort the parts of every artifact, children before parents.
///
/// The sort is stable, so artifacts that compare equal keep their
/// extraction order, and sorting an already sorted tree changes nothing.
pub fn sort_tree(tree: &mut ArtifactTree) {
    let mut order = Vec::with_capacity(tree.len());
    tree.walk(tree.root(), &mut |_, id| order.push(id));

    for id in order {
        let mut parts = tree.parts(id).to_vec();
        if parts.len() < 2 {
            continue;
        }
        parts.sort_by(|&a, &b| compare_parts(tree, a, b));
        tree.get_mut(id).parts = parts;
    }
}

fn compare_parts(tree: &ArtifactTree, a: ArtifactId, b: ArtifactId) -> Ordering {
    compare_artifacts(&tree.get(a).metrics, &tree.get(b).metrics)
}

/// Strict-priority comparison of two sibling artifacts:
///
/// 1. component number, ascending
/// 2. incoming same-scope dependencies, ascending
/// 3. same-scope dependency difference, descending
/// 4. external dependency difference, descending
/// 5. lines of code, descending
///
/// A criterion is skipped when either side has no value for it.
pub fn compare_artifacts(a: &Metrics, b: &Metrics) -> Ordering {
    ascending(a.component_number, b.component_number)
        .then_with(|| {
            ascending(
                a.incoming_dependencies_in_scope,
                b.incoming_dependencies_in_scope,
            )
        })
        .then_with(|| {
            descending(
                a.dependency_difference_scope,
                b.dependency_difference_scope,
            )
        })
        .then_with(|| {
            descending(
                a.dependency_difference_external,
                b.dependency_difference_external,
            )
        })
        .then_with(|| descending(a.lines_of_code, b.lines_of_code))
}

fn ascending<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => Ordering::Equal,
    }
}

fn descending<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    ascending(b, a)
}
