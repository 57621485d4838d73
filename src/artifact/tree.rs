//! The artifact arena.
//!
//! Owns every folder, file and symbol artifact of one analysis run. Scope
//! back-references and dependency edges are ids into the arena, so the
//! tree has exactly one owner and no reference cycles.

use std::collections::HashMap;
use std::path::PathBuf;

use super::types::*;
use crate::lsp::uri::{path_to_uri, uri_to_path};
use crate::lsp::{DocumentSymbol, Range};
use crate::pipeline::loader::CodeFolder;

/// Folder → file → symbol containment tree plus dependency edges.
#[derive(Debug, Clone)]
pub struct ArtifactTree {
    nodes: Vec<Artifact>,
    root: ArtifactId,
    /// File path → file artifact, for mapping reference locations.
    files: HashMap<PathBuf, ArtifactId>,
    pub(crate) metrics_computed: bool,
}

/// Counts over a finished tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub folders: usize,
    pub files: usize,
    pub symbols: usize,
    pub scope_edges: usize,
    pub external_edges: usize,
}

impl ArtifactTree {
    /// Create folder and file artifacts mirroring a loaded folder tree.
    pub fn from_folder(folder: CodeFolder) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: ArtifactId::from_index(0),
            files: HashMap::new(),
            metrics_computed: false,
        };
        tree.root = tree.add_folder(folder, None);
        tree
    }

    fn add_folder(&mut self, folder: CodeFolder, scope: Option<ArtifactId>) -> ArtifactId {
        let id = self.push(folder.name, ArtifactKind::Folder, None, scope, None);
        for sub in folder.subfolders {
            self.add_folder(sub, Some(id));
        }
        for file in folder.files {
            let lines = file.line_count();
            let uri = path_to_uri(&file.path);
            let file_id = self.push(
                file.name,
                ArtifactKind::File {
                    path: file.path.clone(),
                    uri,
                },
                Some(file.code),
                Some(id),
                Some(lines),
            );
            self.files.insert(file.path, file_id);
        }
        id
    }

    fn push(
        &mut self,
        name: String,
        kind: ArtifactKind,
        code: Option<String>,
        scope: Option<ArtifactId>,
        intrinsic_lines: Option<usize>,
    ) -> ArtifactId {
        let id = ArtifactId::from_index(self.nodes.len());
        self.nodes
            .push(Artifact::new(id, name, kind, code, scope, intrinsic_lines));
        if let Some(scope) = scope {
            self.nodes[scope.index()].parts.push(id);
        }
        id
    }

    /// Add a symbol (and, recursively, its children) under `scope`.
    ///
    /// Nesting becomes containment; it never produces dependency edges.
    pub fn add_symbol(
        &mut self,
        scope: ArtifactId,
        file: ArtifactId,
        symbol: &DocumentSymbol,
    ) -> ArtifactId {
        let code = self
            .nodes
            .get(file.index())
            .and_then(|f| f.code.as_deref())
            .map(|text| snippet(text, &symbol.range));

        let data = SymbolData {
            kind: symbol.kind,
            range: symbol.range,
            selection_range: symbol.selection_range,
            file,
        };
        let id = self.push(
            symbol.name.clone(),
            ArtifactKind::Symbol(data),
            code,
            Some(scope),
            Some(symbol.range.line_count()),
        );

        for child in symbol.children.iter().flatten() {
            self.add_symbol(id, file, child);
        }
        id
    }

    // ─── Access ─────────────────────────────────────────────────

    pub fn root(&self) -> ArtifactId {
        self.root
    }

    /// Look up an artifact. Panics on ids from another tree.
    pub fn get(&self, id: ArtifactId) -> &Artifact {
        &self.nodes[id.index()]
    }

    pub fn try_get(&self, id: ArtifactId) -> Option<&Artifact> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: ArtifactId) -> &mut Artifact {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.nodes.iter()
    }

    pub fn parts(&self, id: ArtifactId) -> &[ArtifactId] {
        &self.get(id).parts
    }

    pub fn scope_of(&self, id: ArtifactId) -> Option<ArtifactId> {
        self.get(id).scope
    }

    pub fn metrics_computed(&self) -> bool {
        self.metrics_computed
    }

    /// True if `container` is `other` or one of its ancestors.
    pub fn contains(&self, container: ArtifactId, other: ArtifactId) -> bool {
        let mut current = Some(other);
        while let Some(id) = current {
            if id == container {
                return true;
            }
            current = self.scope_of(id);
        }
        false
    }

    /// File artifacts in tree order.
    pub fn files(&self) -> Vec<ArtifactId> {
        let mut files = Vec::new();
        self.walk(self.root, &mut |tree, id| {
            if matches!(tree.get(id).kind, ArtifactKind::File { .. }) {
                files.push(id);
            }
        });
        files
    }

    /// Map a document uri reported by the server to a file artifact.
    pub fn file_for_uri(&self, uri: &str) -> Option<ArtifactId> {
        let path = uri_to_path(uri)?;
        self.files.get(&path).copied()
    }

    /// All symbols, depth-first with children before their parent.
    pub fn symbols_post_order(&self) -> Vec<ArtifactId> {
        let mut symbols = Vec::new();
        self.walk(self.root, &mut |tree, id| {
            if tree.get(id).is_symbol() {
                symbols.push(id);
            }
        });
        symbols
    }

    /// Post-order traversal: parts are visited before the artifact itself.
    pub(crate) fn walk<F>(&self, id: ArtifactId, visit: &mut F)
    where
        F: FnMut(&ArtifactTree, ArtifactId),
    {
        for &part in &self.get(id).parts {
            self.walk(part, visit);
        }
        visit(self, id);
    }

    /// Deepest symbol in `file` whose declaration range contains `range`.
    pub fn find_symbol_containing(&self, file: ArtifactId, range: &Range) -> Option<ArtifactId> {
        self.parts(file)
            .iter()
            .find_map(|&symbol| self.find_in_symbol(symbol, range))
    }

    fn find_in_symbol(&self, id: ArtifactId, range: &Range) -> Option<ArtifactId> {
        let artifact = self.get(id);
        let data = artifact.symbol()?;
        artifact
            .parts
            .iter()
            .find_map(|&child| self.find_in_symbol(child, range))
            .or_else(|| data.range.contains(range).then_some(id))
    }

    // ─── Dependencies ───────────────────────────────────────────

    /// Record that `referencing` depends on `declaring`.
    ///
    /// Returns the edge classification, or `None` when the pair cannot carry
    /// an edge: non-symbols, the same artifact, or one containing the other.
    /// Inserting an existing edge changes nothing.
    pub fn add_dependency(
        &mut self,
        referencing: ArtifactId,
        declaring: ArtifactId,
    ) -> Option<EdgeScope> {
        if !self.get(referencing).is_symbol() || !self.get(declaring).is_symbol() {
            return None;
        }
        if self.contains(referencing, declaring) || self.contains(declaring, referencing) {
            return None;
        }

        let scope = if self.scope_of(referencing) == self.scope_of(declaring) {
            EdgeScope::Scope
        } else {
            EdgeScope::External
        };

        self.get_mut(declaring)
            .dependencies
            .incoming_mut(scope)
            .insert(referencing);
        self.get_mut(referencing)
            .dependencies
            .outgoing_mut(scope)
            .insert(declaring);
        Some(scope)
    }

    /// Number of distinct edges of one classification.
    pub fn edge_count(&self, scope: EdgeScope) -> usize {
        self.nodes
            .iter()
            .map(|a| a.dependencies.outgoing(scope).len())
            .sum()
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        for artifact in &self.nodes {
            match artifact.kind {
                ArtifactKind::Folder => stats.folders += 1,
                ArtifactKind::File { .. } => stats.files += 1,
                ArtifactKind::Symbol(_) => stats.symbols += 1,
            }
        }
        stats.scope_edges = self.edge_count(EdgeScope::Scope);
        stats.external_edges = self.edge_count(EdgeScope::External);
        stats
    }
}

/// The source lines covered by `range`.
fn snippet(text: &str, range: &Range) -> String {
    text.lines()
        .skip(range.start.line as usize)
        .take(range.line_count())
        .collect::<Vec<_>>()
        .join("\n")
}
