//! Tree loader: walks a directory into an immutable folder/file tree.
//!
//! Only files with an accepted extension are kept, folders on the exclusion
//! list are never entered, and folders that end up without any matching
//! file are dropped. Children are sorted by name so that loading an
//! unchanged directory twice yields the same tree.

use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Inputs of a load. The root is always passed explicitly.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub root: PathBuf,
    /// Accepted extensions, without leading dot.
    pub extensions: Vec<String>,
    /// Folder names never entered (exact match).
    pub excluded_folders: Vec<String>,
    pub respect_gitignore: bool,
    pub skip_hidden: bool,
}

impl LoadOptions {
    pub fn new<P: Into<PathBuf>>(root: P, extensions: &[&str]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            excluded_folders: Vec::new(),
            respect_gitignore: false,
            skip_hidden: true,
        }
    }

    pub fn excluding(mut self, folders: &[&str]) -> Self {
        self.excluded_folders = folders.iter().map(|f| f.to_string()).collect();
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|accepted| accepted == ext))
    }
}

/// A source file read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFile {
    pub name: String,
    pub path: PathBuf,
    pub code: String,
}

impl CodeFile {
    pub fn line_count(&self) -> usize {
        self.code.lines().count()
    }
}

/// A folder holding at least one matching file somewhere below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFolder {
    pub name: String,
    pub path: PathBuf,
    pub subfolders: Vec<CodeFolder>,
    pub files: Vec<CodeFile>,
}

impl CodeFolder {
    pub fn file_count(&self) -> usize {
        self.files.len() + self.subfolders.iter().map(|f| f.file_count()).sum::<usize>()
    }

    pub fn folder_count(&self) -> usize {
        1 + self.subfolders.iter().map(|f| f.folder_count()).sum::<usize>()
    }

    pub fn line_count(&self) -> usize {
        self.files.iter().map(|f| f.line_count()).sum::<usize>()
            + self.subfolders.iter().map(|f| f.line_count()).sum::<usize>()
    }
}

/// Walk `options.root` and build the folder tree.
///
/// Fails with [`Error::Input`] if the root is missing, is not a directory,
/// cannot be read, or contains no matching file.
pub fn load_folder(options: &LoadOptions) -> Result<CodeFolder> {
    let root = fs::canonicalize(&options.root).map_err(|e| {
        Error::Input(format!(
            "project folder {} is not accessible: {}",
            options.root.display(),
            e
        ))
    })?;
    if !root.is_dir() {
        return Err(Error::Input(format!(
            "project path {} is not a folder",
            root.display()
        )));
    }
    fs::read_dir(&root).map_err(|e| {
        Error::Input(format!("cannot read project folder {}: {}", root.display(), e))
    })?;

    let excluded = options.excluded_folders.clone();
    let walker = WalkBuilder::new(&root)
        .standard_filters(false)
        .hidden(options.skip_hidden)
        .git_ignore(options.respect_gitignore)
        .git_exclude(options.respect_gitignore)
        .parents(options.respect_gitignore)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !(is_dir
                && entry.depth() > 0
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| excluded.iter().any(|x| x == name)))
        })
        .build();

    let mut builder = FolderBuilder::default();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) || !options.accepts(entry.path()) {
            continue;
        }

        let path = entry.into_path();
        let code = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        let relative = path.strip_prefix(&root).unwrap_or(&path).to_path_buf();
        builder.insert(&relative, path, code);
    }

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string());
    let folder = builder.finish(name, root.clone());

    if folder.file_count() == 0 {
        return Err(Error::Input(format!(
            "project folder {} contains no files with extensions {:?}",
            root.display(),
            options.extensions
        )));
    }

    debug!(
        root = %root.display(),
        files = folder.file_count(),
        folders = folder.folder_count(),
        "loaded folder tree"
    );
    Ok(folder)
}

/// Collects files by relative path; folders only come into existence
/// when a file lands in them.
#[derive(Default)]
struct FolderBuilder {
    subfolders: BTreeMap<String, FolderBuilder>,
    files: BTreeMap<String, CodeFile>,
}

impl FolderBuilder {
    fn insert(&mut self, relative: &Path, path: PathBuf, code: String) {
        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        let Some((file_name, folders)) = components.split_last() else {
            return;
        };

        let mut current = self;
        for folder in folders {
            current = current.subfolders.entry(folder.clone()).or_default();
        }
        current.files.insert(
            file_name.clone(),
            CodeFile {
                name: file_name.clone(),
                path,
                code,
            },
        );
    }

    fn finish(self, name: String, path: PathBuf) -> CodeFolder {
        let subfolders = self
            .subfolders
            .into_iter()
            .map(|(sub_name, sub)| {
                let sub_path = path.join(&sub_name);
                sub.finish(sub_name, sub_path)
            })
            .collect();
        CodeFolder {
            name,
            path,
            subfolders,
            files: self.files.into_values().collect(),
        }
    }
}

/// Counts of what a load would produce, without touching a language server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub folders: usize,
    pub files: usize,
    pub lines: usize,
}

impl ScanStats {
    pub fn of(folder: &CodeFolder) -> Self {
        Self {
            folders: folder.folder_count(),
            files: folder.file_count(),
            lines: folder.line_count(),
        }
    }
}

impl std::fmt::Display for ScanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Found {} source files in {} folders ({} lines)",
            self.files, self.folders, self.lines
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn shape(folder: &CodeFolder) -> Vec<String> {
        let mut out = Vec::new();
        fn walk(folder: &CodeFolder, prefix: &str, out: &mut Vec<String>) {
            for sub in &folder.subfolders {
                let p = format!("{}{}/", prefix, sub.name);
                out.push(p.clone());
                walk(sub, &p, out);
            }
            for file in &folder.files {
                out.push(format!("{}{}", prefix, file.name));
            }
        }
        walk(folder, "", &mut out);
        out
    }

    #[test]
    fn test_filters_extensions_and_excluded_folders() {
        let dir = tempdir().unwrap();
        write(dir.path(), "Sources/App/main.swift", "print(1)\n");
        write(dir.path(), "Sources/App/notes.md", "# notes\n");
        write(dir.path(), "Sources/Lib/util.swift", "func f() {}\n");
        write(dir.path(), ".build/debug/gen.swift", "let x = 1\n");
        write(dir.path(), "Docs/readme.txt", "hello\n");

        let options = LoadOptions::new(dir.path(), &["swift"]).excluding(&[".build"]);
        let folder = load_folder(&options).unwrap();

        assert_eq!(
            shape(&folder),
            vec![
                "Sources/",
                "Sources/App/",
                "Sources/App/main.swift",
                "Sources/Lib/",
                "Sources/Lib/util.swift",
            ]
        );
        assert_eq!(folder.file_count(), 2);
    }

    #[test]
    fn test_exclusion_is_exact_and_case_sensitive() {
        let dir = tempdir().unwrap();
        write(dir.path(), "Build/a.swift", "a\n");
        write(dir.path(), "build/b.swift", "b\n");
        write(dir.path(), "builds/c.swift", "c\n");

        let options = LoadOptions::new(dir.path(), &[".swift"]).excluding(&["build"]);
        let folder = load_folder(&options).unwrap();

        let names: Vec<&str> = folder.subfolders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Build", "builds"]);
    }

    #[test]
    fn test_children_sorted_subfolders_first() {
        let dir = tempdir().unwrap();
        write(dir.path(), "zeta.swift", "z\n");
        write(dir.path(), "alpha.swift", "a\n");
        write(dir.path(), "Models/User.swift", "u\n");
        write(dir.path(), "Cache/Store.swift", "s\n");

        let folder = load_folder(&LoadOptions::new(dir.path(), &["swift"])).unwrap();
        assert_eq!(
            shape(&folder),
            vec![
                "Cache/",
                "Cache/Store.swift",
                "Models/",
                "Models/User.swift",
                "alpha.swift",
                "zeta.swift",
            ]
        );
    }

    #[test]
    fn test_reload_is_identical() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a/b/c.swift", "1\n2\n3\n");
        write(dir.path(), "a/d.swift", "x\n");
        write(dir.path(), "e.swift", "y\n");

        let options = LoadOptions::new(dir.path(), &["swift"]);
        let first = load_folder(&options).unwrap();
        let second = load_folder(&options).unwrap();
        assert_eq!(first, second);
        assert_eq!(ScanStats::of(&first).lines, 5);
    }

    #[test]
    fn test_missing_root_is_input_error() {
        let dir = tempdir().unwrap();
        let options = LoadOptions::new(dir.path().join("missing"), &["swift"]);
        assert!(matches!(load_folder(&options), Err(Error::Input(_))));
    }

    #[test]
    fn test_no_matching_files_is_input_error() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.rs", "fn main() {}\n");
        let options = LoadOptions::new(dir.path(), &["swift"]);
        assert!(matches!(load_folder(&options), Err(Error::Input(_))));
    }

    #[test]
    fn test_file_as_root_is_input_error() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.swift", "x\n");
        let options = LoadOptions::new(dir.path().join("main.swift"), &["swift"]);
        assert!(matches!(load_folder(&options), Err(Error::Input(_))));
    }

    #[test]
    fn test_hidden_folders_skipped_by_default() {
        let dir = tempdir().unwrap();
        write(dir.path(), ".swiftpm/gen.swift", "x\n");
        write(dir.path(), "main.swift", "y\n");

        let folder = load_folder(&LoadOptions::new(dir.path(), &["swift"])).unwrap();
        assert_eq!(shape(&folder), vec!["main.swift"]);

        let mut options = LoadOptions::new(dir.path(), &["swift"]);
        options.skip_hidden = false;
        let folder = load_folder(&options).unwrap();
        assert_eq!(folder.file_count(), 2);
    }
}
