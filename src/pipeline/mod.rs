//! Analysis pipeline.
//!
//! load → handshake → extract → resolve → metrics → sort. The phases run
//! strictly in sequence; only extraction and resolution wait on the
//! language server, and every wait observes the cancellation token.

pub mod extract;
pub mod loader;
pub mod resolve;

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::artifact::{compute_metrics, sort_tree, ArtifactTree};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::lsp::LanguageServer;

pub use extract::{extract_symbols, ExtractOptions, ExtractReport};
pub use loader::{load_folder, CodeFile, CodeFolder, LoadOptions, ScanStats};
pub use resolve::{resolve_dependencies, ResolveReport};

impl LoadOptions {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            root: config.project.root.clone(),
            extensions: config.normalized_extensions(),
            excluded_folders: config.project.excluded_folders.clone(),
            respect_gitignore: config.project.respect_gitignore,
            skip_hidden: config.project.skip_hidden,
        }
    }
}

impl ExtractOptions {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            language_id: config.lsp.language_id.clone(),
            max_concurrent_requests: config.lsp.max_concurrent_requests,
            open_documents: config.lsp.open_documents,
        }
    }
}

/// Load the folder tree on the blocking pool.
pub async fn load(options: LoadOptions) -> Result<CodeFolder> {
    tokio::task::spawn_blocking(move || load_folder(&options))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

/// Run one complete analysis against an already running server.
///
/// Returns the finished, sorted tree. Any error leaves nothing behind; the
/// caller decides what to keep from earlier runs.
pub async fn run_analysis(
    config: &AnalysisConfig,
    server: Arc<dyn LanguageServer>,
    cancel: &CancellationToken,
) -> Result<ArtifactTree> {
    let total_start = Instant::now();

    let load_start = Instant::now();
    let folder = load(LoadOptions::from_config(config)).await?;
    let root = folder.path.clone();
    let mut tree = ArtifactTree::from_folder(folder);
    info!(
        "Load: {} files in {} folders in {} ms",
        tree.stats().files,
        tree.stats().folders,
        load_start.elapsed().as_millis()
    );
    ensure_running(cancel)?;

    server
        .initialize(&root, std::process::id(), cancel)
        .await?;

    let extract_start = Instant::now();
    let extracted =
        extract_symbols(&mut tree, server.as_ref(), &ExtractOptions::from_config(config), cancel)
            .await?;
    info!(
        "Extract: {} symbols from {} files ({} failed) in {} ms",
        extracted.symbols,
        extracted.files,
        extracted.failed_files,
        extract_start.elapsed().as_millis()
    );
    ensure_running(cancel)?;

    let resolve_start = Instant::now();
    let resolved = resolve_dependencies(
        &mut tree,
        server,
        config.lsp.max_concurrent_requests,
        cancel,
    )
    .await?;
    info!(
        "Resolve: {} queries, {} scope and {} external edges ({} failed, {} dropped) in {} ms",
        resolved.queried,
        resolved.scope_edges,
        resolved.external_edges,
        resolved.failed,
        resolved.dropped,
        resolve_start.elapsed().as_millis()
    );
    ensure_running(cancel)?;

    let metrics_start = Instant::now();
    compute_metrics(&mut tree)?;
    sort_tree(&mut tree);
    info!(
        "Metrics and sort: {} artifacts in {} ms",
        tree.len(),
        metrics_start.elapsed().as_millis()
    );

    info!(
        "Analysis finished in {} ms",
        total_start.elapsed().as_millis()
    );
    Ok(tree)
}

fn ensure_running(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeServer;
    use super::*;
    use crate::artifact::fixtures::*;
    use crate::artifact::EdgeScope;
    use crate::lsp::{Location, LspError, SymbolKind};

    const A: &str = "file:///app/a.swift";
    const B: &str = "file:///app/b.swift";

    fn at(uri: &str, line: u32) -> Location {
        Location {
            uri: uri.to_string(),
            range: line_range(line),
        }
    }

    fn two_files() -> ArtifactTree {
        ArtifactTree::from_folder(folder(
            "app",
            vec![],
            vec![file("a.swift", 40), file("b.swift", 40)],
        ))
    }

    fn find(tree: &ArtifactTree, name: &str) -> crate::artifact::ArtifactId {
        tree.iter()
            .find(|a| a.name == name)
            .map(|a| a.id)
            .unwrap_or_else(|| panic!("no artifact named {}", name))
    }

    #[tokio::test]
    async fn test_extract_builds_nested_symbols_in_file_order() {
        let mut tree = two_files();
        let server = FakeServer::default()
            .outline(
                A,
                vec![symbol("Parser", 0, 20).with_children(vec![symbol("parse", 2, 8)])],
            )
            .outline(B, vec![symbol("main", 0, 3)]);

        let report = extract_symbols(
            &mut tree,
            &server,
            &ExtractOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.symbols, 3);
        assert_eq!(*server.opened.lock(), vec![A.to_string(), B.to_string()]);
        let parser = find(&tree, "Parser");
        let parse = find(&tree, "parse");
        assert_eq!(tree.scope_of(parse), Some(parser));
        assert_eq!(tree.scope_of(parser), Some(tree.files()[0]));
    }

    #[tokio::test]
    async fn test_extract_skips_file_on_server_error() {
        let mut tree = two_files();
        let server = FakeServer::default()
            .failing_outline(
                A,
                LspError::Response {
                    code: -32603,
                    message: "index not ready".to_string(),
                },
            )
            .outline(B, vec![symbol("main", 0, 3)]);
        let options = ExtractOptions {
            open_documents: false,
            ..ExtractOptions::default()
        };

        let report = extract_symbols(&mut tree, &server, &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed_files, 1);
        assert_eq!(report.symbols, 1);
        assert!(tree.parts(tree.files()[0]).is_empty());
        assert!(server.opened.lock().is_empty());
    }

    #[tokio::test]
    async fn test_extract_transport_failure_is_fatal() {
        let mut tree = two_files();
        let server =
            FakeServer::default().failing_outline(B, LspError::Transport("broken pipe".into()));

        let result = extract_symbols(
            &mut tree,
            &server,
            &ExtractOptions::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    async fn extracted(server: &FakeServer) -> ArtifactTree {
        let mut tree = two_files();
        extract_symbols(
            &mut tree,
            server,
            &ExtractOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        tree
    }

    #[tokio::test]
    async fn test_resolve_classifies_scope_and_external_edges() {
        // a.swift: f (0-5), g (10-15); b.swift: h (0-5)
        // g is referenced from f (line 3) and from h (line 2)
        let server = FakeServer::default()
            .outline(A, vec![symbol("f", 0, 5), symbol("g", 10, 15)])
            .outline(B, vec![symbol("h", 0, 5)])
            .refs(A, 10, vec![at(A, 3), at(B, 2), at(B, 30)]);
        let mut tree = extracted(&server).await;
        let server = Arc::new(server);

        let report = resolve_dependencies(&mut tree, server.clone(), 2, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.queried, 3);
        assert_eq!(report.scope_edges, 1);
        assert_eq!(report.external_edges, 1);
        assert_eq!(report.dropped, 1);
        let (f, g, h) = (find(&tree, "f"), find(&tree, "g"), find(&tree, "h"));
        assert!(tree.get(f).dependencies.outgoing(EdgeScope::Scope).contains(&g));
        assert!(tree.get(g).dependencies.incoming(EdgeScope::External).contains(&h));
        assert!(tree.get(h).dependencies.outgoing(EdgeScope::External).contains(&g));
    }

    #[tokio::test]
    async fn test_resolve_queries_children_first_and_skips_namespaces() {
        let server = FakeServer::default().outline(
            A,
            vec![
                symbol_of_kind("Core", SymbolKind::Namespace, 0, 30)
                    .with_children(vec![symbol("Parser", 1, 20)
                        .with_children(vec![symbol("parse", 2, 8)])]),
            ],
        );
        let mut tree = extracted(&server).await;
        let server = Arc::new(server);

        let report = resolve_dependencies(&mut tree, server.clone(), 1, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        let lines: Vec<u32> = server.queried.lock().iter().map(|(_, p)| p.line).collect();
        assert_eq!(lines, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_resolve_drops_references_along_containment() {
        // parse (inside Parser) references Parser, Parser references parse
        let server = FakeServer::default()
            .outline(
                A,
                vec![symbol("Parser", 0, 20).with_children(vec![symbol("parse", 2, 8)])],
            )
            .refs(A, 0, vec![at(A, 4)])
            .refs(A, 2, vec![at(A, 15)]);
        let mut tree = extracted(&server).await;

        let report = resolve_dependencies(
            &mut tree,
            Arc::new(server),
            4,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.scope_edges + report.external_edges, 0);
        assert_eq!(report.dropped, 2);
        assert!(tree.get(find(&tree, "Parser")).dependencies.is_empty());
        assert!(tree.get(find(&tree, "parse")).dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_failed_query_is_a_warning() {
        let server = FakeServer::default()
            .outline(A, vec![symbol("f", 0, 5), symbol("g", 10, 15)])
            .failing_refs(
                A,
                0,
                LspError::Decode {
                    method: "textDocument/references".into(),
                    reason: "bad shape".into(),
                },
            )
            .refs(A, 10, vec![at(A, 3)]);
        let mut tree = extracted(&server).await;

        let report = resolve_dependencies(
            &mut tree,
            Arc::new(server),
            4,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.scope_edges, 1);
    }

    #[tokio::test]
    async fn test_resolve_transport_failure_leaves_tree_untouched() {
        let server = FakeServer::default()
            .outline(A, vec![symbol("f", 0, 5), symbol("g", 10, 15)])
            .refs(A, 0, vec![at(A, 12)])
            .failing_refs(A, 10, LspError::Transport("server exited".into()));
        let mut tree = extracted(&server).await;
        let cancel = CancellationToken::new();

        let result = resolve_dependencies(&mut tree, Arc::new(server), 4, &cancel).await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(tree.stats().scope_edges, 0);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_resolve_cancelled_before_start() {
        let server = FakeServer::default()
            .outline(A, vec![symbol("f", 0, 5)])
            .refs(A, 0, vec![at(A, 30)]);
        let mut tree = extracted(&server).await;
        let server = Arc::new(server);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = resolve_dependencies(&mut tree, server.clone(), 4, &cancel).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(server.queried.lock().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_cancelled_mid_pass_discards_answers() {
        // every symbol is referenced by the other two
        let cancel = CancellationToken::new();
        let server = FakeServer::default()
            .outline(
                A,
                vec![symbol("f", 0, 5), symbol("g", 10, 15), symbol("k", 20, 25)],
            )
            .refs(A, 0, vec![at(A, 12), at(A, 22)])
            .refs(A, 10, vec![at(A, 2), at(A, 22)])
            .refs(A, 20, vec![at(A, 2), at(A, 12)])
            .cancelling(&cancel);
        let mut tree = extracted(&server).await;
        let server = Arc::new(server);

        let result = resolve_dependencies(&mut tree, server.clone(), 1, &cancel).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        // the first answer arrived, nothing was queried after it
        assert_eq!(server.queried.lock().len(), 1);
        let stats = tree.stats();
        assert_eq!(stats.scope_edges + stats.external_edges, 0);
    }
}
