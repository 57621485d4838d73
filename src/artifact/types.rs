//! Core types for the artifact tree.
//!
//! Artifacts live in an arena owned by [`super::ArtifactTree`]; every
//! reference between them (scope, parts, dependencies) is an [`ArtifactId`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::lsp::{Range, SymbolKind};

/// Arena index of an artifact; the node key of the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactId(u32);

impl ArtifactId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an artifact represents.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactKind {
    Folder,
    File { path: PathBuf, uri: String },
    Symbol(SymbolData),
}

/// Language-server facts about a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolData {
    pub kind: SymbolKind,
    /// Full declaration range.
    pub range: Range,
    /// Range of the symbol's name; reference queries are issued here.
    pub selection_range: Range,
    /// The file the symbol is declared in.
    pub file: ArtifactId,
}

impl ArtifactKind {
    /// Human-readable kind label.
    pub fn name(&self) -> String {
        match self {
            ArtifactKind::Folder => "Folder".to_string(),
            ArtifactKind::File { .. } => "File".to_string(),
            ArtifactKind::Symbol(data) => data.kind.to_string(),
        }
    }

    pub fn as_symbol(&self) -> Option<&SymbolData> {
        match self {
            ArtifactKind::Symbol(data) => Some(data),
            _ => None,
        }
    }
}

/// Classification of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeScope {
    /// Both endpoints share the same immediate scope (siblings).
    Scope,
    /// Endpoints live in different scopes.
    External,
}

impl fmt::Display for EdgeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeScope::Scope => write!(f, "scope"),
            EdgeScope::External => write!(f, "external"),
        }
    }
}

/// Dependency edges of one artifact, bucketed by direction and scope.
///
/// An outgoing edge points at an artifact this one depends on (references);
/// an incoming edge comes from an artifact that depends on this one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub incoming_scope: BTreeSet<ArtifactId>,
    pub outgoing_scope: BTreeSet<ArtifactId>,
    pub incoming_external: BTreeSet<ArtifactId>,
    pub outgoing_external: BTreeSet<ArtifactId>,
}

impl Dependencies {
    pub fn incoming(&self, scope: EdgeScope) -> &BTreeSet<ArtifactId> {
        match scope {
            EdgeScope::Scope => &self.incoming_scope,
            EdgeScope::External => &self.incoming_external,
        }
    }

    pub fn outgoing(&self, scope: EdgeScope) -> &BTreeSet<ArtifactId> {
        match scope {
            EdgeScope::Scope => &self.outgoing_scope,
            EdgeScope::External => &self.outgoing_external,
        }
    }

    pub(crate) fn incoming_mut(&mut self, scope: EdgeScope) -> &mut BTreeSet<ArtifactId> {
        match scope {
            EdgeScope::Scope => &mut self.incoming_scope,
            EdgeScope::External => &mut self.incoming_external,
        }
    }

    pub(crate) fn outgoing_mut(&mut self, scope: EdgeScope) -> &mut BTreeSet<ArtifactId> {
        match scope {
            EdgeScope::Scope => &mut self.outgoing_scope,
            EdgeScope::External => &mut self.outgoing_external,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.incoming_scope.is_empty()
            && self.outgoing_scope.is_empty()
            && self.incoming_external.is_empty()
            && self.outgoing_external.is_empty()
    }
}

/// Graph metrics of an artifact. `None` means "not computed" or "not
/// applicable" (component numbers exist only for symbols).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Intrinsic size; for folders the sum of their parts.
    pub lines_of_code: Option<usize>,
    pub lines_of_code_of_parts: Option<usize>,
    /// Size of the parts that sit in a multi-member cycle.
    pub lines_of_code_of_parts_in_cycles: Option<usize>,
    /// Strongly connected component within the scope; equal numbers mean
    /// a shared cycle.
    pub component_number: Option<usize>,
    /// Distinct artifacts with a same-scope edge into this one.
    pub incoming_dependencies_in_scope: Option<usize>,
    /// Outgoing minus incoming same-scope edges.
    pub dependency_difference_scope: Option<i64>,
    /// Outgoing minus incoming external edges.
    pub dependency_difference_external: Option<i64>,
}

impl Metrics {
    pub fn lines_of_code(&self) -> usize {
        self.lines_of_code.unwrap_or(0)
    }
}

/// One node of the artifact tree.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: ArtifactId,
    /// Random per-run identity, independent of arena position.
    pub uid: Uuid,
    pub name: String,
    pub kind: ArtifactKind,
    pub code: Option<String>,
    /// Nearest enclosing artifact; `None` only for the root folder.
    pub scope: Option<ArtifactId>,
    /// Contained artifacts, in display order once sorted.
    pub parts: Vec<ArtifactId>,
    pub metrics: Metrics,
    pub dependencies: Dependencies,
    /// Intrinsic line count recorded at creation (folders have none).
    pub(crate) intrinsic_lines: Option<usize>,
}

impl Artifact {
    pub(crate) fn new(
        id: ArtifactId,
        name: String,
        kind: ArtifactKind,
        code: Option<String>,
        scope: Option<ArtifactId>,
        intrinsic_lines: Option<usize>,
    ) -> Self {
        Self {
            id,
            uid: Uuid::new_v4(),
            name,
            kind,
            code,
            scope,
            parts: Vec::new(),
            metrics: Metrics::default(),
            dependencies: Dependencies::default(),
            intrinsic_lines,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self.kind, ArtifactKind::Symbol(_))
    }

    pub fn symbol(&self) -> Option<&SymbolData> {
        self.kind.as_symbol()
    }

    pub fn kind_name(&self) -> String {
        self.kind.name()
    }
}
