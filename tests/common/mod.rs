//! Shared test helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use archlens::lsp::uri::path_to_uri;
use archlens::lsp::{DocumentSymbol, Location, Position, Range, SymbolKind};
use archlens::{AnalysisConfig, ArtifactId, ArtifactTree, EdgeScope, LanguageServer, LspError};

// ---------------------------------------------------------------------------
// Project folders on disk
// ---------------------------------------------------------------------------

pub struct Workspace {
    _dir: TempDir,
    pub root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        // the loader reports canonical paths, so uris must be built from them
        let root = dir.path().canonicalize().unwrap();
        Self { _dir: dir, root }
    }

    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
        self
    }

    pub fn uri(&self, relative: &str) -> String {
        path_to_uri(&self.root.join(relative))
    }

    pub fn config(&self) -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.project.root = self.root.clone();
        config.lsp.max_concurrent_requests = 3;
        config
    }
}

/// `count` numbered lines of source text.
pub fn lines(count: usize) -> String {
    (1..=count)
        .map(|i| format!("// line {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Language server data
// ---------------------------------------------------------------------------

/// A symbol covering lines `start..=end`; its name starts on `start`.
pub fn sym(name: &str, start: u32, end: u32) -> DocumentSymbol {
    DocumentSymbol {
        name: name.to_string(),
        detail: None,
        kind: SymbolKind::Struct,
        range: Range::new(Position::new(start, 0), Position::new(end, 1)),
        selection_range: Range::new(
            Position::new(start, 7),
            Position::new(start, 7 + name.len() as u32),
        ),
        children: None,
    }
}

pub fn sym_with(name: &str, start: u32, end: u32, children: Vec<DocumentSymbol>) -> DocumentSymbol {
    DocumentSymbol {
        children: Some(children),
        ..sym(name, start, end)
    }
}

/// A reference somewhere inside `line`.
pub fn loc(uri: &str, line: u32) -> Location {
    Location {
        uri: uri.to_string(),
        range: Range::new(Position::new(line, 3), Position::new(line, 9)),
    }
}

// ---------------------------------------------------------------------------
// Scripted language server
// ---------------------------------------------------------------------------

/// Answers from fixed tables. References are keyed by the uri and line of
/// the queried symbol's name.
#[derive(Default)]
pub struct ScriptedServer {
    outlines: HashMap<String, Result<Vec<DocumentSymbol>, LspError>>,
    references: HashMap<(String, u32), Result<Vec<Location>, LspError>>,
    pub initializations: AtomicUsize,
    pub reference_queries: AtomicUsize,
    pub opened: Mutex<Vec<String>>,
    cancel_on_reference: Option<CancellationToken>,
}

impl ScriptedServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outline(mut self, uri: &str, symbols: Vec<DocumentSymbol>) -> Self {
        self.outlines.insert(uri.to_string(), Ok(symbols));
        self
    }

    pub fn outline_error(mut self, uri: &str, error: LspError) -> Self {
        self.outlines.insert(uri.to_string(), Err(error));
        self
    }

    pub fn references(mut self, uri: &str, line: u32, locations: Vec<Location>) -> Self {
        self.references
            .insert((uri.to_string(), line), Ok(locations));
        self
    }

    pub fn references_error(mut self, uri: &str, line: u32, error: LspError) -> Self {
        self.references.insert((uri.to_string(), line), Err(error));
        self
    }

    /// Cancel `cancel` from inside the first reference query.
    pub fn cancelling(mut self, cancel: &CancellationToken) -> Self {
        self.cancel_on_reference = Some(cancel.clone());
        self
    }
}

pub fn server_error() -> LspError {
    LspError::Response {
        code: -32603,
        message: "internal error".to_string(),
    }
}

pub fn connection_lost() -> LspError {
    LspError::Transport("language server closed the connection".to_string())
}

#[async_trait]
impl LanguageServer for ScriptedServer {
    async fn initialize(
        &self,
        _root: &Path,
        _process_id: u32,
        _cancel: &CancellationToken,
    ) -> Result<(), LspError> {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn did_open(&self, uri: &str, _language_id: &str, _text: &str) -> Result<(), LspError> {
        self.opened.lock().push(uri.to_string());
        Ok(())
    }

    async fn document_symbols(
        &self,
        uri: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<DocumentSymbol>, LspError> {
        self.outlines.get(uri).cloned().unwrap_or(Ok(Vec::new()))
    }

    async fn references(
        &self,
        uri: &str,
        position: Position,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Location>, LspError> {
        self.reference_queries.fetch_add(1, Ordering::SeqCst);
        if let Some(cancel) = &self.cancel_on_reference {
            cancel.cancel();
        }
        self.references
            .get(&(uri.to_string(), position.line))
            .cloned()
            .unwrap_or(Ok(Vec::new()))
    }

    async fn shutdown(&self) -> Result<(), LspError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tree inspection
// ---------------------------------------------------------------------------

pub fn find(tree: &ArtifactTree, name: &str) -> ArtifactId {
    tree.iter()
        .find(|a| a.name == name)
        .map(|a| a.id)
        .unwrap_or_else(|| panic!("no artifact named {}", name))
}

pub fn part_names(tree: &ArtifactTree, id: ArtifactId) -> Vec<String> {
    tree.parts(id)
        .iter()
        .map(|&p| tree.get(p).name.clone())
        .collect()
}

/// Every edge as `"from -> to (scope)"`, by artifact name, sorted.
pub fn edges(tree: &ArtifactTree) -> Vec<String> {
    let mut edges = Vec::new();
    for artifact in tree.iter() {
        for scope in [EdgeScope::Scope, EdgeScope::External] {
            for &target in artifact.dependencies.outgoing(scope) {
                edges.push(format!(
                    "{} -> {} ({})",
                    artifact.name,
                    tree.get(target).name,
                    scope
                ));
            }
        }
    }
    edges.sort();
    edges
}
