//! Artifact tree: the data model the pipeline produces.
//!
//! Folders, files and symbols in one arena, connected by containment
//! (`parts`/`scope`) and by dependency edges, annotated with metrics and
//! sorted for display.

pub mod metrics;
pub mod sort;
pub mod tree;
pub mod types;
pub mod view;

pub use metrics::compute_metrics;
pub use sort::{compare_artifacts, sort_tree};
pub use tree::{ArtifactTree, TreeStats};
pub use types::{
    Artifact, ArtifactId, ArtifactKind, Dependencies, EdgeScope, Metrics, SymbolData,
};
pub use view::{ArtifactRef, ArtifactSnapshot};

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders for hand-made trees in unit tests.

    use std::path::{Path, PathBuf};

    use crate::lsp::{DocumentSymbol, Position, Range, SymbolKind};
    use crate::pipeline::loader::{CodeFile, CodeFolder};

    pub fn file(name: &str, lines: usize) -> CodeFile {
        CodeFile {
            name: name.to_string(),
            path: PathBuf::from(name),
            code: (1..=lines)
                .map(|i| format!("line {}", i))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// A folder rooted at `/<name>`; children are re-rooted beneath it.
    pub fn folder(name: &str, subfolders: Vec<CodeFolder>, files: Vec<CodeFile>) -> CodeFolder {
        let mut folder = CodeFolder {
            name: name.to_string(),
            path: PathBuf::from("/"),
            subfolders,
            files,
        };
        rebase(&mut folder, Path::new("/"));
        folder
    }

    fn rebase(folder: &mut CodeFolder, parent: &Path) {
        folder.path = parent.join(&folder.name);
        let path = folder.path.clone();
        for sub in &mut folder.subfolders {
            rebase(sub, &path);
        }
        for file in &mut folder.files {
            file.path = path.join(&file.name);
        }
    }

    /// A function symbol spanning whole lines `start..=end`.
    pub fn symbol(name: &str, start: u32, end: u32) -> DocumentSymbol {
        symbol_of_kind(name, SymbolKind::Function, start, end)
    }

    pub fn symbol_of_kind(name: &str, kind: SymbolKind, start: u32, end: u32) -> DocumentSymbol {
        DocumentSymbol {
            name: name.to_string(),
            detail: None,
            kind,
            range: Range::new(Position::new(start, 0), Position::new(end, 1)),
            selection_range: Range::new(
                Position::new(start, 4),
                Position::new(start, 4 + name.len() as u32),
            ),
            children: None,
        }
    }

    pub trait WithChildren {
        fn with_children(self, children: Vec<DocumentSymbol>) -> Self;
    }

    impl WithChildren for DocumentSymbol {
        fn with_children(mut self, children: Vec<DocumentSymbol>) -> Self {
            self.children = Some(children);
            self
        }
    }

    /// A short range in the middle of one line.
    pub fn line_range(line: u32) -> Range {
        Range::new(Position::new(line, 2), Position::new(line, 6))
    }
}
