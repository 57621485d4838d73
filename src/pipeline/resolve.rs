//! Dependency resolver: turns reference lookups into dependency edges.
//!
//! Every non-namespace symbol asks the server where it is referenced. Each
//! reported location is mapped to the deepest symbol containing it, which
//! then depends on the queried symbol. Queries run as a task group with a
//! bounded number in flight; edges are only written to the tree after the
//! whole group has finished, so a cancelled or failed pass leaves the tree
//! untouched.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::artifact::{ArtifactId, ArtifactKind, ArtifactTree, EdgeScope};
use crate::error::{Error, Result};
use crate::lsp::{LanguageServer, Location, LspError, Position};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Reference queries issued.
    pub queried: usize,
    /// Namespace-like symbols that were not queried.
    pub skipped: usize,
    /// Queries the server answered with an error.
    pub failed: usize,
    pub scope_edges: usize,
    pub external_edges: usize,
    /// Locations outside any known symbol, or along containment.
    pub dropped: usize,
}

struct ReferenceQuery {
    symbol: ArtifactId,
    uri: String,
    position: Position,
}

/// Query references for every symbol and record the resulting edges.
///
/// A query the server rejects costs that symbol its incoming edges and
/// nothing else. A transport failure stops all outstanding queries and
/// fails the pass; so does cancellation of `cancel`.
pub async fn resolve_dependencies(
    tree: &mut ArtifactTree,
    server: Arc<dyn LanguageServer>,
    max_concurrent_requests: usize,
    cancel: &CancellationToken,
) -> Result<ResolveReport> {
    let mut report = ResolveReport::default();
    let mut queries = Vec::new();
    for id in tree.symbols_post_order() {
        let Some(data) = tree.get(id).symbol() else {
            continue;
        };
        if data.kind.is_namespace() {
            report.skipped += 1;
            continue;
        }
        let ArtifactKind::File { uri, .. } = &tree.get(data.file).kind else {
            continue;
        };
        queries.push(ReferenceQuery {
            symbol: id,
            uri: uri.clone(),
            position: data.selection_range.start,
        });
    }
    report.queried = queries.len();

    let references = query_all(&queries, server, max_concurrent_requests, cancel).await?;

    for (query, locations) in queries.iter().zip(references) {
        let Some(locations) = locations else {
            report.failed += 1;
            continue;
        };
        for location in &locations {
            match record_reference(tree, query.symbol, location) {
                Some(EdgeScope::Scope) => report.scope_edges += 1,
                Some(EdgeScope::External) => report.external_edges += 1,
                None => report.dropped += 1,
            }
        }
    }

    Ok(report)
}

/// Run every query; index `i` of the result belongs to `queries[i]`, with
/// `None` for a query the server rejected.
async fn query_all(
    queries: &[ReferenceQuery],
    server: Arc<dyn LanguageServer>,
    max_concurrent_requests: usize,
    parent: &CancellationToken,
) -> Result<Vec<Option<Vec<Location>>>> {
    let cancel = parent.child_token();
    let semaphore = Arc::new(Semaphore::new(max_concurrent_requests.max(1)));
    let mut tasks = JoinSet::new();

    for (index, query) in queries.iter().enumerate() {
        let server = Arc::clone(&server);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let uri = query.uri.clone();
        let position = query.position;
        tasks.spawn(async move {
            let permit = tokio::select! {
                _ = cancel.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                return (index, Err(LspError::Cancelled));
            };
            if cancel.is_cancelled() {
                return (index, Err(LspError::Cancelled));
            }
            (index, server.references(&uri, position, &cancel).await)
        });
    }

    let mut results: Vec<Option<Vec<Location>>> = vec![None; queries.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = match joined {
            Ok(done) => done,
            Err(e) => {
                warn!(error = %e, "reference task did not complete");
                continue;
            }
        };
        match outcome {
            Ok(locations) => results[index] = Some(locations),
            Err(LspError::Cancelled) => {}
            Err(e @ LspError::Transport(_)) => {
                cancel.cancel();
                tasks.abort_all();
                return Err(e.into());
            }
            Err(e) => {
                warn!(
                    uri = %queries[index].uri,
                    position = ?queries[index].position,
                    error = %e,
                    "reference query failed, symbol keeps no incoming edges"
                );
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    debug!(queries = queries.len(), "all reference queries answered");
    Ok(results)
}

/// Map one reference location to an edge into `declaring`.
fn record_reference(
    tree: &mut ArtifactTree,
    declaring: ArtifactId,
    location: &Location,
) -> Option<EdgeScope> {
    let Some(file) = tree.file_for_uri(&location.uri) else {
        trace!(uri = %location.uri, "reference outside the analyzed tree");
        return None;
    };
    let Some(referencing) = tree.find_symbol_containing(file, &location.range) else {
        trace!(uri = %location.uri, range = %location.range, "reference outside any symbol");
        return None;
    };
    tree.add_dependency(referencing, declaring)
}
