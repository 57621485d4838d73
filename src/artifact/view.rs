//! Read-only views over a finished tree.

use serde::Serialize;
use uuid::Uuid;

use super::tree::ArtifactTree;
use super::types::{Artifact, ArtifactId, ArtifactKind, EdgeScope, Metrics};
use crate::lsp::Range;

/// Borrowed handle to one artifact that can navigate the tree.
#[derive(Clone, Copy)]
pub struct ArtifactRef<'a> {
    tree: &'a ArtifactTree,
    id: ArtifactId,
}

impl<'a> ArtifactRef<'a> {
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn artifact(&self) -> &'a Artifact {
        self.tree.get(self.id)
    }

    pub fn name(&self) -> &'a str {
        &self.artifact().name
    }

    pub fn kind(&self) -> &'a ArtifactKind {
        &self.artifact().kind
    }

    pub fn code(&self) -> Option<&'a str> {
        self.artifact().code.as_deref()
    }

    pub fn metrics(&self) -> &'a Metrics {
        &self.artifact().metrics
    }

    pub fn scope(&self) -> Option<ArtifactRef<'a>> {
        self.tree.scope_of(self.id).map(|id| self.tree.view(id))
    }

    pub fn parts(&self) -> impl Iterator<Item = ArtifactRef<'a>> + 'a {
        let tree = self.tree;
        tree.parts(self.id).iter().map(move |&id| tree.view(id))
    }

    /// Artifacts this one depends on.
    pub fn dependencies(&self, scope: EdgeScope) -> impl Iterator<Item = ArtifactRef<'a>> + 'a {
        let tree = self.tree;
        self.artifact()
            .dependencies
            .outgoing(scope)
            .iter()
            .map(move |&id| tree.view(id))
    }

    /// Artifacts that depend on this one.
    pub fn dependents(&self, scope: EdgeScope) -> impl Iterator<Item = ArtifactRef<'a>> + 'a {
        let tree = self.tree;
        self.artifact()
            .dependencies
            .incoming(scope)
            .iter()
            .map(move |&id| tree.view(id))
    }
}

impl std::fmt::Debug for ArtifactRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

impl ArtifactTree {
    pub fn view(&self, id: ArtifactId) -> ArtifactRef<'_> {
        ArtifactRef { tree: self, id }
    }

    pub fn root_view(&self) -> ArtifactRef<'_> {
        self.view(self.root())
    }
}

/// Owned, serializable copy of a subtree. Edges are given as `uid`s.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSnapshot {
    pub uid: Uuid,
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on_in_scope: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on_external: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ArtifactSnapshot>,
}

impl ArtifactSnapshot {
    /// Snapshot `artifact` and everything below it, at most `depth` levels
    /// deep (`None` for the whole subtree).
    pub fn capture(artifact: ArtifactRef<'_>, depth: Option<usize>) -> Self {
        let uids = |scope: EdgeScope| -> Vec<Uuid> {
            artifact
                .dependencies(scope)
                .map(|dep| dep.artifact().uid)
                .collect()
        };
        let parts = match depth {
            Some(0) => Vec::new(),
            _ => artifact
                .parts()
                .map(|part| Self::capture(part, depth.map(|d| d - 1)))
                .collect(),
        };
        Self {
            uid: artifact.artifact().uid,
            name: artifact.name().to_string(),
            kind: artifact.kind().name(),
            range: artifact.kind().as_symbol().map(|data| data.range),
            metrics: artifact.metrics().clone(),
            depends_on_in_scope: uids(EdgeScope::Scope),
            depends_on_external: uids(EdgeScope::External),
            parts,
        }
    }
}
